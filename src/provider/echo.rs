//! Echo provider.
//!
//! Streams the prompt back one word per chunk. Useful as an offline default
//! and for exercising the typing effect without network access.

use std::time::Duration;

use async_trait::async_trait;

use super::{BackendError, Chunk, ChunkStream, GenerationBackend, GenerationRequest};

/// Backend that repeats the user's prompt.
#[derive(Debug, Clone, Default)]
pub struct EchoBackend {
    chunk_delay: Duration,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between chunks to mimic a remote model.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

/// Split `text` into word-sized deltas that concatenate back to `text`.
fn word_deltas(text: &str) -> Vec<String> {
    let mut deltas = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() && !current.trim().is_empty() {
            deltas.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        deltas.push(current);
    }
    deltas
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn open(&self, request: &GenerationRequest) -> Result<ChunkStream, BackendError> {
        let deltas = word_deltas(&request.prompt);
        let delay = self.chunk_delay;
        let stream = async_stream::stream! {
            for delta in deltas {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(Chunk::text(delta));
            }
        };
        Ok(Box::pin(stream))
    }
}
