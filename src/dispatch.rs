//! Command-dispatch boundary.
//!
//! The engine forwards each parsed [`CommandEnvelope`] to a
//! [`CommandDispatcher`] and never looks back: dispatch is fire-and-forget
//! and has no error path into the engine. Dispatchers must accept
//! unrecognized directives silently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::command::{CommandEnvelope, Directive};

/// What a dispatcher receives for one envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub directive: Directive,
    pub target: String,
    pub parameters: Map<String, Value>,
}

impl From<&CommandEnvelope> for DispatchRequest {
    fn from(envelope: &CommandEnvelope) -> Self {
        Self {
            directive: envelope.directive.clone(),
            target: envelope.target.clone(),
            parameters: envelope.parameters.clone(),
        }
    }
}

/// Receiver of classified commands.
pub trait CommandDispatcher: Send + Sync {
    /// Hand off one request. Must not block.
    fn dispatch(&self, request: DispatchRequest);
}

/// Discards every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl CommandDispatcher for NoopDispatcher {
    fn dispatch(&self, _request: DispatchRequest) {}
}

/// Logs every request at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

impl CommandDispatcher for TracingDispatcher {
    fn dispatch(&self, request: DispatchRequest) {
        if request.directive.is_executable() {
            tracing::info!(
                directive = %request.directive,
                target = %request.target,
                parameters = %serde_json::Value::Object(request.parameters),
                "command dispatched"
            );
        } else {
            tracing::info!(
                directive = %request.directive,
                "advisory command with no executable action"
            );
        }
    }
}

/// Forwards requests over an unbounded channel to whoever executes them.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<DispatchRequest>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiver its requests arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DispatchRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CommandDispatcher for ChannelDispatcher {
    fn dispatch(&self, request: DispatchRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!("command executor is gone; dropping dispatched command");
        }
    }
}
