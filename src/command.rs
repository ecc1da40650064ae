//! Command classifier.
//!
//! Decides whether a completed reply is a structured device command or plain
//! prose. Detection is a heuristic: a reply whose first non-blank character
//! opens a JSON object or array is *treated as* a command candidate, then
//! strictly parsed. Anything that fails to parse or validate is prose, so
//! [`classify_payload`] never fails.
//!
//! # Envelope format
//!
//! ```json
//! {"kind": "device_control", "directive": "turn_on", "target": "light.kitchen",
//!  "parameters": {"brightness": 80}, "spokenText": "Kitchen lights on.", "language": "en"}
//! ```
//!
//! A reply may also be an array of envelopes. Only the first envelope's
//! `spokenText` is shown as the turn text; later ones are confirmations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Action requested by a command envelope.
///
/// Unknown directive names are kept verbatim as [`Directive::Other`] and are
/// advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Directive {
    OpenUrl,
    WebSearch,
    TurnOn,
    TurnOff,
    Toggle,
    SetValue,
    PlayMedia,
    /// Unrecognized or missing directive; carries no executable action.
    Other(String),
}

impl Directive {
    /// Parse a directive name, case-insensitively, accepting `-` or `_` separators.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "open_url" => Self::OpenUrl,
            "web_search" | "search" => Self::WebSearch,
            "turn_on" => Self::TurnOn,
            "turn_off" => Self::TurnOff,
            "toggle" => Self::Toggle,
            "set_value" | "set" => Self::SetValue,
            "play_media" | "play" => Self::PlayMedia,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenUrl => "open_url",
            Self::WebSearch => "web_search",
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
            Self::SetValue => "set_value",
            Self::PlayMedia => "play_media",
            Self::Other(name) => name,
        }
    }

    /// False for [`Directive::Other`].
    pub fn is_executable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for Directive {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Directive> for String {
    fn from(directive: Directive) -> Self {
        directive.as_str().to_owned()
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, machine-actionable reply element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Envelope family, e.g. `device_control`.
    pub kind: String,
    pub directive: Directive,
    /// Entity or resource the directive applies to. May be empty.
    pub target: String,
    pub parameters: Map<String, Value>,
    /// Text safe to show the user even if the directive is not understood.
    pub spoken_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One or more envelopes parsed from a single reply, in reply order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    envelopes: Vec<CommandEnvelope>,
}

impl CommandReply {
    /// Text that summarizes the whole reply: the first envelope's spoken text.
    pub fn spoken_text(&self) -> &str {
        self.envelopes
            .first()
            .map(|e| e.spoken_text.as_str())
            .unwrap_or_default()
    }

    /// Spoken texts of the second and later envelopes.
    pub fn confirmations(&self) -> impl Iterator<Item = &str> {
        self.envelopes.iter().skip(1).map(|e| e.spoken_text.as_str())
    }

    pub fn envelopes(&self) -> &[CommandEnvelope] {
        &self.envelopes
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Always false for a parsed reply; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

/// Outcome of classifying a completed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Command(CommandReply),
    Prose,
}

impl Payload {
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command(_))
    }
}

/// Why a candidate was not accepted as a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotCommand {
    /// The text is not valid JSON of the expected shape.
    #[error("not a command envelope: {0}")]
    Malformed(String),
    /// The reply was an empty array.
    #[error("command reply contains no envelopes")]
    Empty,
    /// An envelope had no usable `spokenText`.
    #[error("envelope {index} has no spokenText")]
    MissingSpokenText { index: usize },
    /// An envelope had neither `kind` nor `directive`.
    #[error("envelope {index} has neither kind nor directive")]
    MissingDirective { index: usize },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    kind: Option<String>,
    #[serde(alias = "action")]
    directive: Option<String>,
    target: Option<String>,
    #[serde(alias = "params")]
    parameters: Option<Map<String, Value>>,
    #[serde(alias = "spoken_text")]
    spoken_text: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawReply {
    Single(RawEnvelope),
    Batch(Vec<RawEnvelope>),
}

/// Mode heuristic: does the reply start like a JSON object or array?
pub fn looks_like_command(text: &str) -> bool {
    matches!(text.trim_start().chars().next(), Some('{' | '['))
}

/// Strictly parse `text` as a command reply.
///
/// # Errors
/// Returns [`NotCommand`] describing the first problem found.
pub fn parse_command(text: &str) -> Result<CommandReply, NotCommand> {
    let raw: RawReply =
        serde_json::from_str(text.trim()).map_err(|e| NotCommand::Malformed(e.to_string()))?;
    let raw_envelopes = match raw {
        RawReply::Single(envelope) => vec![envelope],
        RawReply::Batch(envelopes) => envelopes,
    };
    if raw_envelopes.is_empty() {
        return Err(NotCommand::Empty);
    }

    let envelopes = raw_envelopes
        .into_iter()
        .enumerate()
        .map(|(index, raw)| validate(index, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CommandReply { envelopes })
}

fn validate(index: usize, raw: RawEnvelope) -> Result<CommandEnvelope, NotCommand> {
    let spoken_text = raw
        .spoken_text
        .filter(|s| !s.trim().is_empty())
        .ok_or(NotCommand::MissingSpokenText { index })?;
    if raw.kind.is_none() && raw.directive.is_none() {
        return Err(NotCommand::MissingDirective { index });
    }
    Ok(CommandEnvelope {
        kind: raw.kind.unwrap_or_default(),
        directive: Directive::parse(raw.directive.as_deref().unwrap_or_default()),
        target: raw.target.unwrap_or_default(),
        parameters: raw.parameters.unwrap_or_default(),
        spoken_text,
        language: raw.language,
    })
}

/// Classify a completed reply, falling back to prose on any parse failure.
pub fn classify_payload(text: &str) -> Payload {
    match parse_command(text) {
        Ok(reply) => Payload::Command(reply),
        Err(reason) => {
            tracing::debug!(%reason, "reply treated as prose");
            Payload::Prose
        }
    }
}
