//! SSE adapter (§6): `data: {json}\n\n` per progress event, then a single
//! terminal `data: {step:"result", data:...}\n\n` or
//! `data: {step:"error", error:"..."}\n\n` before the stream closes.

use crate::sink::ProgressEvent;
use axum::response::sse::Event;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub enum TerminalOutcome {
    Result(Value),
    Error(String),
}

enum Stage {
    Events,
    Terminal,
    Done,
}

/// Drains a run's progress events, then its terminal outcome, as a single
/// `futures::Stream` axum's `Sse` response can serve directly.
pub struct ProgressEventStream {
    receiver: mpsc::Receiver<ProgressEvent>,
    terminal: oneshot::Receiver<TerminalOutcome>,
    stage: Stage,
}

impl ProgressEventStream {
    pub fn new(receiver: mpsc::Receiver<ProgressEvent>, terminal: oneshot::Receiver<TerminalOutcome>) -> Self {
        Self {
            receiver,
            terminal,
            stage: Stage::Events,
        }
    }
}

impl futures::Stream for ProgressEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.stage {
                Stage::Events => match this.receiver.poll_recv(cx) {
                    Poll::Ready(Some(event)) => return Poll::Ready(Some(Ok(event_to_sse(&event)))),
                    Poll::Ready(None) => {
                        this.stage = Stage::Terminal;
                        continue;
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Stage::Terminal => {
                    let terminal = Pin::new(&mut this.terminal);
                    match terminal.poll(cx) {
                        Poll::Ready(Ok(outcome)) => {
                            this.stage = Stage::Done;
                            return Poll::Ready(Some(Ok(terminal_to_sse(&outcome))));
                        }
                        Poll::Ready(Err(_)) => {
                            this.stage = Stage::Done;
                            return Poll::Ready(None);
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Stage::Done => return Poll::Ready(None),
            }
        }
    }
}

fn event_to_sse(event: &ProgressEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}

fn terminal_to_sse(outcome: &TerminalOutcome) -> Event {
    let body = match outcome {
        TerminalOutcome::Result(data) => json!({ "step": "result", "data": data }),
        TerminalOutcome::Error(message) => json!({ "step": "error", "error": message }),
    };
    Event::default().data(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepId;
    use futures::StreamExt;

    #[tokio::test]
    async fn streams_events_then_terminal_result() {
        let (tx, rx) = mpsc::channel(8);
        let (term_tx, term_rx) = oneshot::channel();

        tx.send(ProgressEvent::new(StepId::ConfigValidated, "validating"))
            .await
            .unwrap();
        drop(tx);
        term_tx.send(TerminalOutcome::Result(json!({ "ok": true }))).unwrap();

        let mut stream = Box::pin(ProgressEventStream::new(rx, term_rx));
        let first = stream.next().await.unwrap().unwrap();
        assert!(format!("{first:?}").contains("config_validated"));

        let second = stream.next().await.unwrap().unwrap();
        assert!(format!("{second:?}").contains("\"step\":\"result\""));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn streams_terminal_error_when_workflow_fails() {
        let (tx, rx) = mpsc::channel::<ProgressEvent>(8);
        let (term_tx, term_rx) = oneshot::channel();
        drop(tx);
        term_tx.send(TerminalOutcome::Error("boom".to_string())).unwrap();

        let mut stream = Box::pin(ProgressEventStream::new(rx, term_rx));
        let only = stream.next().await.unwrap().unwrap();
        assert!(format!("{only:?}").contains("\"step\":\"error\""));
        assert!(stream.next().await.is_none());
    }
}
