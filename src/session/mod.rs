//! Streaming dialogue session.
//!
//! [`SessionController`] admits one turn at a time and reconciles it;
//! the stream consumer and [`ReplyAccumulator`] turn backend chunks into
//! log updates; [`queue`] holds input submitted while a turn is running.

pub mod accumulator;
mod consumer;
pub mod controller;
pub mod queue;
pub mod state;

pub use accumulator::{FinishedReply, ReplyAccumulator, ReplyMode};
pub use controller::{SessionController, SubmitOutcome};
pub use queue::{PendingInput, RejectReason};
pub use state::{Phase, SessionStatus};
