//! Generation backend contract and provider routing.
//!
//! A backend takes the prompt, the prior turns and an optional attachment,
//! and returns a finite [`ChunkStream`]. Failures surface either when the
//! stream is opened or as `Err` items mid-stream.
//!
//! # Submodules
//!
//! - [`router`]: selects one of several registered providers by name
//! - [`echo`]: streams the prompt back word by word
//! - [`scripted`]: replays queued scripts, for tests and demos
//!
//! # Error Codes
//!
//! Every [`BackendError`] carries a stable code (e.g. `AUTH_FAILED`,
//! `RATE_LIMITED`) that is safe to match on programmatically.

pub mod echo;
pub mod router;
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::conversation::{Attachment, CitationRecord, Turn};

pub use echo::EchoBackend;
pub use router::ProviderRouter;
pub use scripted::{LiveScript, ScriptedBackend};

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Authentication failed (invalid/missing API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Usage quota or rate limit hit.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// Transport-level failure.
    pub const NETWORK_FAILED: &str = "NETWORK_FAILED";

    /// Request or stream timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Backend refused to generate content for policy reasons.
    pub const CONTENT_FILTERED: &str = "CONTENT_FILTERED";

    /// Provider-reported failure not covered by other variants.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// Streaming response broke off or was malformed.
    pub const STREAM_FAILED: &str = "STREAM_FAILED";

    /// Failure with no metadata attached.
    pub const UNCATEGORIZED: &str = "UNCATEGORIZED";
}

/// Errors raised by generation backends.
///
/// The variant is the metadata the provider layer attaches; the message is
/// the provider's own diagnostic text and is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Usage quota or rate limit hit.
    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("[{}] {}", error_codes::NETWORK_FAILED, .0)]
    NetworkError(String),

    /// Request or stream timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Backend refused to generate content for policy reasons.
    #[error("[{}] {}", error_codes::CONTENT_FILTERED, .0)]
    ContentFiltered(String),

    /// Provider-reported failure, with the HTTP status when known.
    #[error("[{}] {message}", error_codes::PROVIDER_ERROR)]
    ProviderError {
        /// HTTP status code, if the provider reported one.
        status: Option<u16>,
        /// Provider diagnostic text.
        message: String,
    },

    /// Streaming response broke off or was malformed.
    #[error("[{}] {}", error_codes::STREAM_FAILED, .0)]
    StreamError(String),

    /// Failure with no metadata attached.
    #[error("[{}] {}", error_codes::UNCATEGORIZED, .0)]
    Other(String),
}

impl BackendError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::NetworkError(_) => error_codes::NETWORK_FAILED,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::ContentFiltered(_) => error_codes::CONTENT_FILTERED,
            Self::ProviderError { .. } => error_codes::PROVIDER_ERROR,
            Self::StreamError(_) => error_codes::STREAM_FAILED,
            Self::Other(_) => error_codes::UNCATEGORIZED,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::AuthError(m)
            | Self::RateLimited(m)
            | Self::NetworkError(m)
            | Self::TimeoutError(m)
            | Self::ContentFiltered(m)
            | Self::StreamError(m)
            | Self::Other(m) => m,
            Self::ProviderError { message, .. } => message,
        }
    }

    /// Returns true if a later, user-initiated retry may succeed unchanged.
    ///
    /// The engine never retries on its own; this is advice for the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthError(_) | Self::ContentFiltered(_) => false,
            Self::RateLimited(_)
            | Self::NetworkError(_)
            | Self::TimeoutError(_)
            | Self::StreamError(_) => true,
            Self::ProviderError { status, .. } => match status {
                Some(code) => *code == 429 || *code >= 500,
                None => true,
            },
            Self::Other(_) => false,
        }
    }
}

/// One increment of a streamed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Text to append to the reply, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_delta: Option<String>,
    /// Grounding sources attached to this increment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_sources: Vec<CitationRecord>,
}

impl Chunk {
    /// A chunk carrying only text.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            text_delta: Some(delta.into()),
            grounding_sources: Vec::new(),
        }
    }

    /// A chunk carrying only sources.
    pub fn sources(sources: Vec<CitationRecord>) -> Self {
        Self {
            text_delta: None,
            grounding_sources: sources,
        }
    }

    /// Attach grounding sources.
    pub fn with_sources(mut self, sources: Vec<CitationRecord>) -> Self {
        self.grounding_sources = sources;
        self
    }
}

/// Everything a backend needs to generate one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's utterance for this turn.
    pub prompt: String,
    /// Turns that precede this cycle, oldest first.
    pub history: Vec<Turn>,
    /// Image attached to the utterance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// A boxed, finite stream of reply chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, BackendError>> + Send>>;

/// Trait for generation backends.
///
/// Implementations must produce a finite stream. Dropping the stream is the
/// only cancellation signal a backend receives.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns the provider name (e.g. `"echo"`, `"gemini"`).
    fn name(&self) -> &str;

    /// Start generating a reply.
    async fn open(&self, request: &GenerationRequest) -> Result<ChunkStream, BackendError>;
}
