//! Events emitted by the session engine for UI and observability.
//!
//! Delivered over a `tokio::sync::broadcast` channel. Subscribers that fall
//! behind lose the oldest events; the conversation log snapshot and the
//! status watch are always authoritative.

use serde::Serialize;

use crate::classify::ClassifiedError;
use crate::command::Payload;
use crate::conversation::TurnId;
use crate::dispatch::DispatchRequest;
use crate::session::{RejectReason, SessionStatus};

/// What the engine is doing "right now".
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A turn was admitted: the user turn and the empty placeholder exist.
    TurnStarted { user: TurnId, placeholder: TurnId },
    /// The placeholder's text grew.
    TextUpdated { placeholder: TurnId, text: String },
    /// The stream finished and the placeholder holds its final content.
    TurnCompleted { placeholder: TurnId, payload: Payload },
    /// The turn was interrupted; both of its turns were removed.
    TurnCancelled { user: TurnId },
    /// The turn failed; the placeholder was removed, the user turn kept.
    TurnFailed { user: TurnId, error: ClassifiedError },
    /// A command envelope was handed to the dispatcher.
    CommandForwarded {
        placeholder: TurnId,
        request: DispatchRequest,
        /// The envelope's own spoken text, for secondary display.
        spoken_text: String,
    },
    /// Input arrived while busy and is waiting for the running turn to unwind.
    InputQueued { pending: usize },
    /// Input arrived while busy and was not accepted.
    InputRejected { reason: RejectReason },
    /// A queued input was evicted to make room.
    InputDropped { text: String },
    /// Queued inputs were discarded by an explicit stop.
    QueueCleared { dropped: usize },
    /// Phase, busy flag, or pending count changed.
    StatusChanged(SessionStatus),
}

impl EngineEvent {
    /// Short stable name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::TextUpdated { .. } => "text_updated",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnCancelled { .. } => "turn_cancelled",
            Self::TurnFailed { .. } => "turn_failed",
            Self::CommandForwarded { .. } => "command_forwarded",
            Self::InputQueued { .. } => "input_queued",
            Self::InputRejected { .. } => "input_rejected",
            Self::InputDropped { .. } => "input_dropped",
            Self::QueueCleared { .. } => "queue_cleared",
            Self::StatusChanged(_) => "status_changed",
        }
    }

    /// True for the three events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TurnCompleted { .. } | Self::TurnCancelled { .. } | Self::TurnFailed { .. }
        )
    }
}

/// Error notification shape handed to UIs (title, message, hint, details).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorNotice<'a> {
    pub title: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
    pub details: &'a str,
}

impl<'a> From<&'a ClassifiedError> for ErrorNotice<'a> {
    fn from(error: &'a ClassifiedError) -> Self {
        Self {
            title: &error.title,
            message: &error.message,
            hint: error.hint.as_deref(),
            details: &error.details,
        }
    }
}
