//! Scripted provider.
//!
//! Replays pre-queued responses in order, one per [`open`] call, and records
//! every request it receives. A response is either a fixed chunk list, a
//! failure at open time, or a live channel the caller feeds chunk by chunk.
//!
//! [`open`]: GenerationBackend::open

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{BackendError, Chunk, ChunkStream, GenerationBackend, GenerationRequest};

/// Buffer for live scripts; small so senders feel backpressure.
const LIVE_CHANNEL_SIZE: usize = 8;

enum Script {
    Chunks(Vec<Result<Chunk, BackendError>>),
    Live(mpsc::Receiver<Result<Chunk, BackendError>>),
    FailOpen(BackendError),
}

/// Sender half of a live script.
///
/// Dropping it (or calling [`finish`](Self::finish)) ends the stream.
#[derive(Debug)]
pub struct LiveScript {
    tx: mpsc::Sender<Result<Chunk, BackendError>>,
}

impl LiveScript {
    /// Deliver a chunk. Returns false once the consumer stopped listening.
    pub async fn send(&self, chunk: Chunk) -> bool {
        self.tx.send(Ok(chunk)).await.is_ok()
    }

    /// Deliver a mid-stream failure. Returns false once the consumer stopped listening.
    pub async fn fail(&self, error: BackendError) -> bool {
        self.tx.send(Err(error)).await.is_ok()
    }

    /// True once the consumer dropped the stream (e.g. after cancellation).
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the stream normally.
    pub fn finish(self) {}
}

/// Backend that replays queued scripts.
pub struct ScriptedBackend {
    name: String,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response made of fixed items; `Err` items fail mid-stream.
    pub fn push_chunks(&self, items: Vec<Result<Chunk, BackendError>>) {
        self.enqueue(Script::Chunks(items));
    }

    /// Queue a successful text-only response, one chunk per delta.
    pub fn push_text(&self, deltas: &[&str]) {
        self.push_chunks(deltas.iter().map(|d| Ok(Chunk::text(*d))).collect());
    }

    /// Queue a response the caller feeds through the returned handle.
    pub fn push_live(&self) -> LiveScript {
        let (tx, rx) = mpsc::channel(LIVE_CHANNEL_SIZE);
        self.enqueue(Script::Live(rx));
        LiveScript { tx }
    }

    /// Queue a failure returned from `open` itself.
    pub fn push_open_failure(&self, error: BackendError) {
        self.enqueue(Script::FailOpen(error));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn enqueue(&self, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
    }
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBackend")
            .field("name", &self.name)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, request: &GenerationRequest) -> Result<ChunkStream, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match script {
            Some(Script::Chunks(items)) => Ok(Box::pin(futures_util::stream::iter(items))),
            Some(Script::Live(rx)) => Ok(Box::pin(ReceiverStream::new(rx))),
            Some(Script::FailOpen(error)) => Err(error),
            None => Err(BackendError::Other(format!(
                "scripted provider '{}' has no response queued",
                self.name
            ))),
        }
    }
}
