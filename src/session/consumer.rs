//! Stream consumer.
//!
//! Pulls one backend stream to completion for the admitted turn, writing the
//! growing text into the placeholder after every chunk. Cancellation is
//! checked at the top of every iteration and raced against each pull, so no
//! chunk is processed once cancellation has been observed. Opening the
//! stream is cancel-aware too.

use std::sync::{Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::accumulator::ReplyAccumulator;
use crate::command::Payload;
use crate::conversation::{ConversationLog, TurnId};
use crate::dispatch::{CommandDispatcher, DispatchRequest};
use crate::error::DialogueError;
use crate::observability::{FIELD_PROVIDER, SPAN_PROVIDER_OPEN};
use crate::provider::{GenerationBackend, GenerationRequest};
use crate::runtime::EngineEvent;

/// How consumption ended.
#[derive(Debug)]
pub(crate) enum ConsumeOutcome {
    /// The stream was exhausted; the placeholder holds the final content.
    Completed(Payload),
    /// Cancellation was observed before exhaustion.
    Cancelled,
    /// Opening or pulling the stream failed, or the log rejected a write.
    Failed(DialogueError),
}

/// Everything the consumer writes to.
pub(crate) struct StreamConsumer<'a> {
    pub(crate) log: &'a Mutex<ConversationLog>,
    pub(crate) dispatcher: &'a dyn CommandDispatcher,
    pub(crate) events: &'a broadcast::Sender<EngineEvent>,
}

impl StreamConsumer<'_> {
    pub(crate) async fn run(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
        placeholder: TurnId,
        cancel: &CancellationToken,
    ) -> ConsumeOutcome {
        let open_span = tracing::debug_span!(SPAN_PROVIDER_OPEN, { FIELD_PROVIDER } = backend.name());
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return ConsumeOutcome::Cancelled,
            opened = backend.open(request).instrument(open_span) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return ConsumeOutcome::Failed(e.into()),
        };

        let mut acc = ReplyAccumulator::new();
        let mut chunks = 0usize;
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(chunks, "stopped pulling after cancellation");
                return ConsumeOutcome::Cancelled;
            }
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(chunks, "cancelled while awaiting chunk");
                    return ConsumeOutcome::Cancelled;
                }
                next = stream.next() => next,
            };
            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    tracing::debug!(chunks, code = e.code(), "stream failed");
                    return ConsumeOutcome::Failed(e.into());
                }
            };
            chunks += 1;

            if acc.push(chunk) {
                let written = self.lock_log().set_last_text(placeholder, acc.text());
                if let Err(e) = written {
                    return ConsumeOutcome::Failed(e.into());
                }
                self.emit(EngineEvent::TextUpdated {
                    placeholder,
                    text: acc.text().to_owned(),
                });
            }
        }

        let reply = acc.finish();
        {
            let mut log = self.lock_log();
            let written = log
                .set_last_text(placeholder, reply.text.as_str())
                .and_then(|()| log.set_last_sources(placeholder, reply.sources));
            if let Err(e) = written {
                return ConsumeOutcome::Failed(e.into());
            }
        }
        self.emit(EngineEvent::TextUpdated {
            placeholder,
            text: reply.text,
        });

        if let Payload::Command(command) = &reply.payload {
            for envelope in command.envelopes() {
                let request = DispatchRequest::from(envelope);
                self.dispatcher.dispatch(request.clone());
                self.emit(EngineEvent::CommandForwarded {
                    placeholder,
                    request,
                    spoken_text: envelope.spoken_text.clone(),
                });
            }
            tracing::info!(commands = command.len(), "command reply forwarded");
        }

        tracing::debug!(chunks, command = reply.payload.is_command(), "stream exhausted");
        ConsumeOutcome::Completed(reply.payload)
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, ConversationLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
