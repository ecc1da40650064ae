//! The conversation log: an ordered sequence of turns.
//!
//! Turns are appended in time order. Only the most recent turn may be
//! changed in place; everything before it is frozen once appended. Removal
//! also only ever happens from the tail, either one turn at a time
//! ([`ConversationLog::remove_last`]) or back to a [`LogCheckpoint`].
//!
//! # Examples
//!
//! ```
//! use colloquy::conversation::{ConversationLog, Role};
//!
//! let mut log = ConversationLog::new();
//! let checkpoint = log.checkpoint();
//! log.append(Role::User, "hi", None);
//! let reply = log.append(Role::Assistant, "", None);
//! log.set_last_text(reply, "hello").unwrap();
//! assert_eq!(log.last().map(|t| t.text()), Some("hello"));
//!
//! log.rollback_to(checkpoint);
//! assert!(log.is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sources::CitationRecord;

/// Stable identity of a turn within one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(u64);

impl TurnId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Reference to an inlined image. Identity only; rendering happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Opaque identifier understood by the UI and the backend.
    pub id: String,
    /// MIME type of the referenced media (e.g. `image/png`).
    pub mime_type: String,
}

impl Attachment {
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// One message in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    id: TurnId,
    role: Role,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<CitationRecord>>,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Deduplicated citations, set only on completed prose replies.
    pub fn sources(&self) -> Option<&[CitationRecord]> {
        self.sources.as_deref()
    }

    /// Assigned at append time and never changed.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Log length captured before a cycle appends its turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCheckpoint(usize);

impl LogCheckpoint {
    /// Number of turns that existed when the checkpoint was taken.
    pub fn len(self) -> usize {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Violations of the log's tail-only mutation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The addressed turn exists but is no longer the most recent one.
    #[error("{0} is not the most recent turn")]
    NotLast(TurnId),
    /// The log has no turns.
    #[error("conversation log is empty")]
    Empty,
}

/// Ordered, append-mostly sequence of turns.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its identity.
    pub fn append(
        &mut self,
        role: Role,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> TurnId {
        self.next_id += 1;
        let id = TurnId(self.next_id);
        self.turns.push(Turn {
            id,
            role,
            text: text.into(),
            attachment,
            sources: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    /// Owned copy for readers that must not hold the log while rendering.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn checkpoint(&self) -> LogCheckpoint {
        LogCheckpoint(self.turns.len())
    }

    /// Turns that existed when `checkpoint` was taken.
    pub fn history_before(&self, checkpoint: LogCheckpoint) -> Vec<Turn> {
        let end = checkpoint.0.min(self.turns.len());
        self.turns[..end].to_vec()
    }

    /// Replace the text of the most recent turn.
    ///
    /// # Errors
    /// [`LogError::NotLast`] when `id` is not the tail turn, [`LogError::Empty`]
    /// when there is nothing to update.
    pub fn set_last_text(&mut self, id: TurnId, text: impl Into<String>) -> Result<(), LogError> {
        self.last_mut(id)?.text = text.into();
        Ok(())
    }

    /// Replace the sources of the most recent turn.
    ///
    /// # Errors
    /// Same as [`set_last_text`](Self::set_last_text).
    pub fn set_last_sources(
        &mut self,
        id: TurnId,
        sources: Option<Vec<CitationRecord>>,
    ) -> Result<(), LogError> {
        self.last_mut(id)?.sources = sources;
        Ok(())
    }

    /// Remove the most recent turn, which must be `id`.
    ///
    /// # Errors
    /// Same as [`set_last_text`](Self::set_last_text).
    pub fn remove_last(&mut self, id: TurnId) -> Result<Turn, LogError> {
        self.last_mut(id)?;
        self.turns.pop().ok_or(LogError::Empty)
    }

    /// Drop every turn appended after `checkpoint`, returning them oldest first.
    pub fn rollback_to(&mut self, checkpoint: LogCheckpoint) -> Vec<Turn> {
        if checkpoint.0 >= self.turns.len() {
            return Vec::new();
        }
        self.turns.split_off(checkpoint.0)
    }

    fn last_mut(&mut self, id: TurnId) -> Result<&mut Turn, LogError> {
        let last = self.turns.last_mut().ok_or(LogError::Empty)?;
        if last.id != id {
            return Err(LogError::NotLast(id));
        }
        Ok(last)
    }
}
