//! Session controller.
//!
//! Owns the single-flight gate. `submit` either admits a turn (appending the
//! user turn and an empty assistant placeholder, then driving the stream on
//! a spawned task) or, while a turn is running, requests its cancellation
//! and queues the new input. The driving task reconciles the outcome and
//! admits the next queued input under the same lock, so the session never
//! reports idle while input is waiting.
//!
//! Lock order is always state, then log.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::consumer::{ConsumeOutcome, StreamConsumer};
use super::queue::{EnqueueAction, PendingInput, PendingInputs, RejectReason};
use super::state::{ActiveTurn, Phase, SessionState, SessionStatus};
use crate::classify::classify_failure;
use crate::config::EngineConfig;
use crate::conversation::{Attachment, ConversationLog, Role, Turn, TurnId};
use crate::dispatch::CommandDispatcher;
use crate::error::{DialogueError, Result};
use crate::observability::{
    FIELD_OUTCOME, FIELD_PROVIDER, FIELD_SESSION_ID, FIELD_TURN_ID, OUTCOME_CANCELLED,
    OUTCOME_COMPLETED, OUTCOME_FAILED, SPAN_SESSION_TURN,
};
use crate::provider::{GenerationBackend, GenerationRequest};
use crate::runtime::EngineEvent;

/// Result of a [`SessionController::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The session was idle; a turn was admitted.
    Started { user: TurnId, placeholder: TurnId },
    /// A turn was running; it was asked to stop and this input will run next.
    Queued { pending: usize },
    /// A turn was running and the input was not accepted. Retry once idle.
    Rejected(RejectReason),
}

/// Everything needed to drive one admitted turn.
struct TurnLaunch {
    user: TurnId,
    placeholder: TurnId,
    request: GenerationRequest,
    cancel: CancellationToken,
}

struct Shared {
    id: Uuid,
    backend: Arc<dyn GenerationBackend>,
    dispatcher: Arc<dyn CommandDispatcher>,
    state: Mutex<SessionState>,
    log: Mutex<ConversationLog>,
    clear_on_stop: bool,
    events: broadcast::Sender<EngineEvent>,
    status: watch::Sender<SessionStatus>,
}

/// Handle to the one session of the process. Cheap to clone.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        dispatcher: Arc<dyn CommandDispatcher>,
        config: &EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.events.capacity.max(1));
        let (status, _) = watch::channel(SessionStatus::default());
        let shared = Shared {
            id: Uuid::new_v4(),
            backend,
            dispatcher,
            state: Mutex::new(SessionState::new(PendingInputs::new(&config.queue))),
            log: Mutex::new(ConversationLog::new()),
            clear_on_stop: config.queue.clear_on_stop,
            events,
            status,
        };
        tracing::info!(
            session_id = %shared.id,
            provider = shared.backend.name(),
            max_pending = config.queue.max_pending,
            "session created"
        );
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Submit user input.
    ///
    /// Must be called from within a Tokio runtime; the turn is driven on a
    /// spawned task and this call returns immediately.
    ///
    /// # Errors
    /// [`DialogueError::InvalidInput`] when `text` is blank,
    /// [`DialogueError::Runtime`] outside a Tokio runtime.
    pub fn submit(
        &self,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<SubmitOutcome> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DialogueError::InvalidInput("input text is empty".to_owned()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DialogueError::Runtime(e.to_string()))?;
        let input = PendingInput { text, attachment };

        let mut state = self.shared.lock_state();
        let Some(active) = state.active.as_ref() else {
            let launch = self.shared.admit(&mut state, input);
            let outcome = SubmitOutcome::Started {
                user: launch.user,
                placeholder: launch.placeholder,
            };
            self.shared.publish_status(&state);
            drop(state);
            runtime.spawn(Arc::clone(&self.shared).drive(launch));
            return Ok(outcome);
        };

        active.request_cancel();
        let outcome = match state.pending.enqueue(input) {
            EnqueueAction::Enqueued => SubmitOutcome::Queued {
                pending: state.pending.len(),
            },
            EnqueueAction::Displaced(dropped) => {
                tracing::warn!(pending = state.pending.len(), "pending queue full; input dropped");
                self.shared
                    .emit(EngineEvent::InputDropped { text: dropped.text });
                SubmitOutcome::Queued {
                    pending: state.pending.len(),
                }
            }
            EnqueueAction::Rejected(reason) => {
                tracing::info!(%reason, "input rejected while busy");
                self.shared.emit(EngineEvent::InputRejected { reason });
                SubmitOutcome::Rejected(reason)
            }
        };
        if let SubmitOutcome::Queued { pending } = outcome {
            tracing::info!(pending, "input queued behind interrupted turn");
            self.shared.emit(EngineEvent::InputQueued { pending });
        }
        self.shared.publish_status(&state);
        Ok(outcome)
    }

    /// Request cancellation of the running turn without new input.
    ///
    /// Returns false when the session was idle. With `clear_on_stop` set,
    /// queued input is discarded as well.
    pub fn stop(&self) -> bool {
        let mut state = self.shared.lock_state();
        let Some(active) = state.active.as_ref() else {
            return false;
        };
        active.request_cancel();
        if self.shared.clear_on_stop {
            let dropped = state.pending.clear();
            if dropped > 0 {
                tracing::info!(dropped, "pending inputs cleared by stop");
                self.shared.emit(EngineEvent::QueueCleared { dropped });
            }
        }
        self.shared.publish_status(&state);
        true
    }

    pub fn status(&self) -> SessionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Resolves once no turn is running and nothing is queued.
    pub async fn wait_idle(&self) -> SessionStatus {
        let mut rx = self.shared.status.subscribe();
        match rx.wait_for(|status| !status.busy).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Owned copy of the conversation, safe to render from.
    pub fn log_snapshot(&self) -> Vec<Turn> {
        self.shared.lock_log().snapshot()
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.id
    }

    pub fn backend_name(&self) -> &str {
        self.shared.backend.name()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.shared.id)
            .field("backend", &self.shared.backend.name())
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_log(&self) -> MutexGuard<'_, ConversationLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn publish_status(&self, state: &SessionState) {
        let next = state.status();
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            self.emit(EngineEvent::StatusChanged(next));
        }
    }

    /// Append the user turn and placeholder and mark the session busy.
    fn admit(&self, state: &mut SessionState, input: PendingInput) -> TurnLaunch {
        let (user, placeholder, checkpoint, history) = {
            let mut log = self.lock_log();
            let checkpoint = log.checkpoint();
            let user = log.append(Role::User, input.text.as_str(), input.attachment.clone());
            let placeholder = log.append(Role::Assistant, "", None);
            (user, placeholder, checkpoint, log.history_before(checkpoint))
        };
        let cancel = CancellationToken::new();
        state.phase = Phase::Thinking;
        state.active = Some(ActiveTurn {
            user,
            placeholder,
            checkpoint,
            cancel: cancel.clone(),
        });
        tracing::debug!(turn_id = %user, history = history.len(), "turn admitted");
        self.emit(EngineEvent::TurnStarted { user, placeholder });
        TurnLaunch {
            user,
            placeholder,
            request: GenerationRequest {
                prompt: input.text,
                history,
                attachment: input.attachment,
            },
            cancel,
        }
    }

    /// Run admitted turns until the queue drains.
    async fn drive(self: Arc<Self>, first: TurnLaunch) {
        let mut next = Some(first);
        while let Some(launch) = next.take() {
            let span = tracing::info_span!(
                SPAN_SESSION_TURN,
                { FIELD_SESSION_ID } = tracing::field::display(self.id),
                { FIELD_TURN_ID } = tracing::field::display(launch.user),
                { FIELD_PROVIDER } = self.backend.name(),
                { FIELD_OUTCOME } = tracing::field::Empty,
            );
            let consumer = StreamConsumer {
                log: &self.log,
                dispatcher: self.dispatcher.as_ref(),
                events: &self.events,
            };
            let run = consumer.run(
                self.backend.as_ref(),
                &launch.request,
                launch.placeholder,
                &launch.cancel,
            );
            let outcome = match AssertUnwindSafe(run)
                .catch_unwind()
                .instrument(span.clone())
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => ConsumeOutcome::Failed(DialogueError::Runtime(format!(
                    "turn task panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            next = span.in_scope(|| self.reconcile(&launch, outcome, &span));
        }
    }

    /// Apply a terminal outcome and admit the next queued input, atomically.
    fn reconcile(
        &self,
        launch: &TurnLaunch,
        outcome: ConsumeOutcome,
        span: &tracing::Span,
    ) -> Option<TurnLaunch> {
        let mut state = self.lock_state();
        let Some(active) = state.active.take() else {
            tracing::error!("reconcile without an active turn");
            return None;
        };

        match outcome {
            ConsumeOutcome::Completed(payload) => {
                span.record(FIELD_OUTCOME, OUTCOME_COMPLETED);
                state.phase = Phase::Idle;
                tracing::info!(command = payload.is_command(), "turn completed");
                self.emit(EngineEvent::TurnCompleted {
                    placeholder: launch.placeholder,
                    payload,
                });
            }
            ConsumeOutcome::Cancelled => {
                span.record(FIELD_OUTCOME, OUTCOME_CANCELLED);
                let removed = self.lock_log().rollback_to(active.checkpoint);
                state.phase = Phase::Idle;
                tracing::info!(removed = removed.len(), "turn cancelled and rolled back");
                self.emit(EngineEvent::TurnCancelled { user: active.user });
            }
            ConsumeOutcome::Failed(error) => {
                span.record(FIELD_OUTCOME, OUTCOME_FAILED);
                if let Err(e) = self.lock_log().remove_last(active.placeholder) {
                    tracing::error!(error = %e, "failed to remove placeholder after failure");
                }
                state.phase = Phase::Error;
                let classified = classify_failure(&error);
                tracing::warn!(kind = %classified.kind, details = %classified.details, "turn failed");
                self.emit(EngineEvent::TurnFailed {
                    user: active.user,
                    error: classified,
                });
            }
        }

        let next = state
            .pending
            .dequeue_next()
            .map(|input| self.admit(&mut state, input));
        self.publish_status(&state);
        next
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
