//! Span names and field values for structured tracing.
//!
//! ```text
//! colloquy.session.turn
//!   └─> colloquy.provider.open
//! ```
//!
//! Every turn span records [`FIELD_TURN_ID`] (the user turn) and, once
//! known, [`FIELD_OUTCOME`] as one of the `OUTCOME_*` values below.

/// Root span for one admitted turn, from admission to reconciliation.
pub const SPAN_SESSION_TURN: &str = "colloquy.session.turn";

/// Opening the backend stream (child of the turn span).
pub const SPAN_PROVIDER_OPEN: &str = "colloquy.provider.open";

/// Session identifier field (UUID, stable for the process lifetime).
pub const FIELD_SESSION_ID: &str = "session_id";

/// User turn identifier field (e.g. `turn-3`).
pub const FIELD_TURN_ID: &str = "turn_id";

/// Backend name field (e.g. `router`, `echo`).
pub const FIELD_PROVIDER: &str = "provider";

/// Terminal outcome field, recorded when the turn reconciles.
pub const FIELD_OUTCOME: &str = "outcome";

pub const OUTCOME_COMPLETED: &str = "completed";
pub const OUTCOME_CANCELLED: &str = "cancelled";
pub const OUTCOME_FAILED: &str = "failed";
