//! Session phase and the in-flight turn record.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::queue::PendingInputs;
use crate::conversation::{LogCheckpoint, TurnId};

/// Display state of the session. Speaking and listening belong to other layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Thinking,
    /// The last turn failed; cleared by the next admission.
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Thinking => f.write_str("thinking"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Snapshot published to the UI on every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    /// True from admission until reconciliation; the single-flight gate.
    pub busy: bool,
    /// Inputs waiting for the running turn to unwind.
    pub pending: usize,
}

/// The admitted turn. Its token is the turn's cancel-requested flag.
#[derive(Debug)]
pub(crate) struct ActiveTurn {
    pub(crate) user: TurnId,
    pub(crate) placeholder: TurnId,
    /// Log length before the user turn was appended.
    pub(crate) checkpoint: LogCheckpoint,
    pub(crate) cancel: CancellationToken,
}

impl ActiveTurn {
    pub(crate) fn request_cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(turn_id = %self.user, "cancellation requested");
            self.cancel.cancel();
        }
    }
}

pub(crate) struct SessionState {
    pub(crate) phase: Phase,
    pub(crate) active: Option<ActiveTurn>,
    pub(crate) pending: PendingInputs,
}

impl SessionState {
    pub(crate) fn new(pending: PendingInputs) -> Self {
        Self {
            phase: Phase::Idle,
            active: None,
            pending,
        }
    }

    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            busy: self.active.is_some(),
            pending: self.pending.len(),
        }
    }
}
