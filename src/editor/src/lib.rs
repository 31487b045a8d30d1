//! Conversational edit session executor (C7): action-block grammar,
//! transcript persistence, and per-action dispatch against a site client.

pub mod actions;
pub mod error;
pub mod session;
pub mod store;

pub use actions::{parse_action_blocks, ActionBlock};
pub use error::EditorError;
pub use session::{AppliedChange, EditSessionExecutor, SendMessageResult};
pub use store::{EditMessage, EditSession, Store};
