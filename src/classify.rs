//! Error classifier.
//!
//! Maps a failed turn onto a closed taxonomy the UI can render. Metadata
//! attached by the provider layer (the [`BackendError`] variant and HTTP
//! status) is consulted first; coarse message matching covers failures that
//! arrive without useful metadata. The original diagnostic text is always
//! preserved verbatim in [`ClassifiedError::details`].
//!
//! Cancellation is not an error and never reaches this module.

use serde::{Deserialize, Serialize};

use crate::error::DialogueError;
use crate::provider::BackendError;

/// Closed set of failure kinds shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Configuration-level auth failure; not fixable from the UI.
    InvalidCredentials,
    /// Rate or usage limit; retry later.
    QuotaExceeded,
    /// Transport failure; retry.
    NetworkFailure,
    /// Backend declined for policy reasons; rephrase.
    SafetyRejected,
    /// Any other backend-reported failure.
    BackendError,
    /// Nothing matched; details still carry the original text.
    UnknownError,
    /// Raised locally rather than by the backend.
    ApplicationError,
}

impl ErrorKind {
    /// Stable SCREAMING_SNAKE_CASE code.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::SafetyRejected => "SAFETY_REJECTED",
            Self::BackendError => "BACKEND_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::ApplicationError => "APPLICATION_ERROR",
        }
    }

    /// Whether resubmitting (possibly later or reworded) can succeed.
    pub fn is_user_recoverable(self) -> bool {
        !matches!(self, Self::InvalidCredentials | Self::ApplicationError)
    }

    fn title(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid credentials",
            Self::QuotaExceeded => "Usage limit reached",
            Self::NetworkFailure => "Connection problem",
            Self::SafetyRejected => "Request declined",
            Self::BackendError => "Service error",
            Self::UnknownError => "Something went wrong",
            Self::ApplicationError => "Internal error",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "The assistant could not authenticate with its provider.",
            Self::QuotaExceeded => "The provider is rate limiting requests right now.",
            Self::NetworkFailure => "The provider could not be reached.",
            Self::SafetyRejected => "The provider declined to answer this request.",
            Self::BackendError => "The provider reported an error while answering.",
            Self::UnknownError => "The request failed for an unknown reason.",
            Self::ApplicationError => "The assistant hit an unexpected internal state.",
        }
    }

    fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidCredentials => Some("Check the API key in the configuration."),
            Self::QuotaExceeded => Some("Wait a moment and try again."),
            Self::NetworkFailure => Some("Check your connection and try again."),
            Self::SafetyRejected => Some("Try rephrasing your request."),
            Self::BackendError => Some("Try again."),
            Self::UnknownError | Self::ApplicationError => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A failure ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// The original failure text, unmodified.
    pub details: String,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, details: String) -> Self {
        Self {
            kind,
            title: kind.title().to_owned(),
            message: kind.message().to_owned(),
            hint: kind.hint().map(str::to_owned),
            details,
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Classify a failed turn.
pub fn classify_failure(error: &DialogueError) -> ClassifiedError {
    let kind = match error {
        DialogueError::Backend(backend) => classify_backend(backend),
        _ => ErrorKind::ApplicationError,
    };
    let details = match error {
        DialogueError::Backend(backend) => backend.message().to_owned(),
        other => other.to_string(),
    };
    ClassifiedError::new(kind, details)
}

fn classify_backend(error: &BackendError) -> ErrorKind {
    match error {
        BackendError::AuthError(_) => ErrorKind::InvalidCredentials,
        BackendError::RateLimited(_) => ErrorKind::QuotaExceeded,
        BackendError::NetworkError(_) | BackendError::TimeoutError(_) => ErrorKind::NetworkFailure,
        BackendError::ContentFiltered(_) => ErrorKind::SafetyRejected,
        BackendError::ProviderError { status, message } => match status {
            Some(401 | 403) => ErrorKind::InvalidCredentials,
            Some(429) => ErrorKind::QuotaExceeded,
            _ => kind_from_message(message).unwrap_or(ErrorKind::BackendError),
        },
        BackendError::StreamError(message) => {
            kind_from_message(message).unwrap_or(ErrorKind::BackendError)
        }
        BackendError::Other(message) => {
            kind_from_message(message).unwrap_or(ErrorKind::UnknownError)
        }
    }
}

const CREDENTIAL_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "unauthorized",
    "unauthenticated",
    "invalid credentials",
    "permission denied",
    "forbidden",
];

const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "too many requests",
    "resource exhausted",
    "resource_exhausted",
    "429",
];

const SAFETY_MARKERS: &[&str] = &[
    "safety",
    "content filter",
    "content_filter",
    "blocked",
    "policy",
];

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "fetch failed",
    "failed to fetch",
    "connection",
    "timed out",
    "timeout",
    "dns",
    "offline",
    "unreachable",
];

/// Message heuristics, most specific first.
fn kind_from_message(message: &str) -> Option<ErrorKind> {
    let lower = message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if has(CREDENTIAL_MARKERS) {
        Some(ErrorKind::InvalidCredentials)
    } else if has(QUOTA_MARKERS) {
        Some(ErrorKind::QuotaExceeded)
    } else if has(SAFETY_MARKERS) {
        Some(ErrorKind::SafetyRejected)
    } else if has(NETWORK_MARKERS) {
        Some(ErrorKind::NetworkFailure)
    } else {
        None
    }
}
