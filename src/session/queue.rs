//! Bounded queue for input submitted while a turn is running.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{DropPolicy, QueueConfig, QueueMode};
use crate::conversation::Attachment;

/// A submission waiting for the running turn to unwind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

/// Why a submission made while busy was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Queueing is disabled (`max_pending = 0`); retry once idle.
    QueueDisabled,
    /// The queue is full and the drop policy keeps existing input.
    QueueFull,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueDisabled => f.write_str("busy; queueing is disabled"),
            Self::QueueFull => f.write_str("busy; pending queue is full"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnqueueAction {
    Enqueued,
    /// Accepted after evicting another input, which is returned.
    Displaced(PendingInput),
    Rejected(RejectReason),
}

pub(crate) struct PendingInputs {
    mode: QueueMode,
    max_pending: usize,
    drop_policy: DropPolicy,
    pending: VecDeque<PendingInput>,
}

impl PendingInputs {
    pub(crate) fn new(config: &QueueConfig) -> Self {
        Self {
            mode: config.mode,
            max_pending: config.max_pending,
            drop_policy: config.drop_policy,
            pending: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        cleared
    }

    pub(crate) fn enqueue(&mut self, input: PendingInput) -> EnqueueAction {
        if self.max_pending == 0 {
            return EnqueueAction::Rejected(RejectReason::QueueDisabled);
        }

        if self.pending.len() < self.max_pending {
            self.pending.push_back(input);
            return EnqueueAction::Enqueued;
        }

        let evicted = match self.drop_policy {
            DropPolicy::Oldest => self.pending.pop_front(),
            DropPolicy::Newest => self.pending.pop_back(),
            DropPolicy::None => return EnqueueAction::Rejected(RejectReason::QueueFull),
        };
        self.pending.push_back(input);
        match evicted {
            Some(evicted) => EnqueueAction::Displaced(evicted),
            None => EnqueueAction::Enqueued,
        }
    }

    pub(crate) fn dequeue_next(&mut self) -> Option<PendingInput> {
        match self.mode {
            QueueMode::Followup => self.pending.pop_front(),
            QueueMode::Collect => self.dequeue_collected(),
        }
    }

    /// Merge consecutive text-only inputs; an attachment starts a new turn.
    fn dequeue_collected(&mut self) -> Option<PendingInput> {
        let mut merged = self.pending.pop_front()?;
        if merged.attachment.is_some() {
            return Some(merged);
        }
        while let Some(next) = self.pending.front() {
            if next.attachment.is_some() {
                break;
            }
            let Some(next) = self.pending.pop_front() else {
                break;
            };
            append_collected_text(&mut merged.text, &next.text);
        }
        Some(merged)
    }
}

fn append_collected_text(base: &mut String, next: &str) {
    let next = next.trim();
    if next.is_empty() {
        return;
    }
    if !base.trim().is_empty() {
        base.push_str("\n\n");
    } else {
        base.clear();
    }
    base.push_str(next);
}
