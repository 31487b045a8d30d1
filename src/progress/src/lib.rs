//! Ordered, per-workflow progress channel (§4.2). A `ProgressSink` is
//! attached to a workflow at construction and fans out to SSE consumers and
//! to internal logs without letting a slow subscriber stall the run.

pub mod sink;
pub mod sse;
pub mod step;

pub use sink::{
    ChannelProgressSink, ProgressEvent, ProgressSink, RecordingProgressSink,
    DEFAULT_CHANNEL_CAPACITY, SLOW_CONSUMER_TIMEOUT,
};
pub use sse::{ProgressEventStream, TerminalOutcome};
pub use step::StepId;
