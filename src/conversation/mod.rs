//! Conversation state rendered by the UI.
//!
//! - [`log`]: the ordered turn log with point mutation of the last turn
//! - [`sources`]: citation records and first-seen deduplication

pub mod log;
pub mod sources;

pub use log::{Attachment, ConversationLog, LogCheckpoint, LogError, Role, Turn, TurnId};
pub use sources::{CitationRecord, dedupe};
