//! Reply accumulator.
//!
//! The [`ReplyAccumulator`] folds a sequence of [`Chunk`]s into the text the
//! placeholder turn shows while streaming, plus the raw grounding sources.
//! The command/prose mode is decided once, as soon as any non-blank text has
//! arrived, and never revisited. [`finish`](ReplyAccumulator::finish) turns
//! the accumulated state into the placeholder's final content.
//!
//! # Usage
//!
//! ```
//! use colloquy::provider::Chunk;
//! use colloquy::session::ReplyAccumulator;
//!
//! let mut acc = ReplyAccumulator::new();
//! acc.push(Chunk::text("Hel"));
//! acc.push(Chunk::text("lo"));
//!
//! let reply = acc.finish();
//! assert_eq!(reply.text, "Hello");
//! assert!(reply.sources.is_none());
//! ```

use crate::command::{Payload, classify_payload, looks_like_command};
use crate::conversation::{CitationRecord, dedupe};
use crate::provider::Chunk;

/// Which way the reply is headed, judged from its first non-blank text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Starts like JSON; parsed strictly once the stream ends.
    CommandCandidate,
    Prose,
}

/// Final content for the placeholder turn.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedReply {
    /// The envelope's spoken text for commands, otherwise the full prose.
    pub text: String,
    pub payload: Payload,
    /// Deduplicated sources; `None` for commands or when nothing was cited.
    pub sources: Option<Vec<CitationRecord>>,
}

/// Accumulates streamed chunks for one turn.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    text: String,
    sources: Vec<CitationRecord>,
    mode: Option<ReplyMode>,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Returns true when the visible text grew.
    pub fn push(&mut self, chunk: Chunk) -> bool {
        let grew = match chunk.text_delta {
            Some(delta) if !delta.is_empty() => {
                self.text.push_str(&delta);
                true
            }
            _ => false,
        };
        if self.mode.is_none() && !self.text.trim().is_empty() {
            self.mode = Some(if looks_like_command(&self.text) {
                ReplyMode::CommandCandidate
            } else {
                ReplyMode::Prose
            });
        }
        self.sources.extend(chunk.grounding_sources);
        grew
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `None` until non-blank text has arrived.
    pub fn mode(&self) -> Option<ReplyMode> {
        self.mode
    }

    /// Raw sources collected so far, duplicates included.
    pub fn raw_sources(&self) -> &[CitationRecord] {
        &self.sources
    }

    /// Classify the completed reply.
    pub fn finish(self) -> FinishedReply {
        if self.mode == Some(ReplyMode::CommandCandidate)
            && let Payload::Command(reply) = classify_payload(&self.text)
        {
            return FinishedReply {
                text: reply.spoken_text().to_owned(),
                payload: Payload::Command(reply),
                sources: None,
            };
        }

        let sources = dedupe(&self.sources);
        FinishedReply {
            text: self.text,
            payload: Payload::Prose,
            sources: (!sources.is_empty()).then_some(sources),
        }
    }
}
