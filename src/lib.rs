//! Colloquy: a streaming dialogue session engine.
//!
//! Sends a user utterance to a generation backend, renders the reply as it
//! streams in, decides whether the finished reply is a structured device
//! command or prose, and keeps a linear conversation log consistent when a
//! turn is interrupted or fails.
//!
//! # Architecture
//!
//! - **Conversation log**: ordered turns; only the last turn is mutable
//! - **Session controller**: single-flight admission, cancellation, rollback
//! - **Stream consumer**: pulls backend chunks into the placeholder turn
//! - **Command classifier**: JSON envelope or prose, never an error
//! - **Source deduplicator**: one citation per URI, first seen wins
//! - **Error classifier**: closed taxonomy of user-facing failures
//!
//! Backends are reached through [`provider::GenerationBackend`], usually via
//! [`provider::ProviderRouter`]; parsed commands leave through
//! [`dispatch::CommandDispatcher`].
//!
//! ```
//! use std::sync::Arc;
//! use colloquy::config::EngineConfig;
//! use colloquy::dispatch::NoopDispatcher;
//! use colloquy::provider::EchoBackend;
//! use colloquy::session::{SessionController, SubmitOutcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> colloquy::Result<()> {
//! let session = SessionController::new(
//!     Arc::new(EchoBackend::new()),
//!     Arc::new(NoopDispatcher),
//!     &EngineConfig::default(),
//! );
//! let outcome = session.submit("hello there", None)?;
//! assert!(matches!(outcome, SubmitOutcome::Started { .. }));
//! session.wait_idle().await;
//! assert_eq!(session.log_snapshot()[1].text(), "hello there");
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod command;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod observability;
pub mod provider;
pub mod runtime;
pub mod session;

pub use classify::{ClassifiedError, ErrorKind, classify_failure};
pub use command::{CommandEnvelope, Directive, Payload};
pub use config::EngineConfig;
pub use conversation::{ConversationLog, Role, Turn, TurnId};
pub use error::{DialogueError, Result};
pub use runtime::EngineEvent;
pub use session::{Phase, SessionController, SessionStatus, SubmitOutcome};
