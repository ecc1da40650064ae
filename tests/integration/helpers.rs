//! Shared helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use colloquy::config::EngineConfig;
use colloquy::dispatch::{CommandDispatcher, NoopDispatcher};
use colloquy::provider::{Chunk, LiveScript, ScriptedBackend};
use colloquy::runtime::EngineEvent;
use colloquy::session::SessionController;
use tokio::sync::broadcast;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A session over a fresh scripted backend, plus an event receiver that
/// sees everything from the first submission on.
pub(crate) fn scripted_session(
    config: &EngineConfig,
) -> (
    SessionController,
    Arc<ScriptedBackend>,
    broadcast::Receiver<EngineEvent>,
) {
    scripted_session_with(config, Arc::new(NoopDispatcher))
}

pub(crate) fn scripted_session_with(
    config: &EngineConfig,
    dispatcher: Arc<dyn CommandDispatcher>,
) -> (
    SessionController,
    Arc<ScriptedBackend>,
    broadcast::Receiver<EngineEvent>,
) {
    let backend = Arc::new(ScriptedBackend::new("scripted"));
    let session = SessionController::new(backend.clone(), dispatcher, config);
    let events = session.subscribe();
    (session, backend, events)
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

/// Wait for the first event matching `pred`, failing the test on timeout.
pub(crate) async fn wait_for_event(
    rx: &mut broadcast::Receiver<EngineEvent>,
    pred: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event before timeout")
}

/// Wait for the session to go idle, failing the test on timeout.
pub(crate) async fn settle(session: &SessionController) {
    tokio::time::timeout(EVENT_TIMEOUT, session.wait_idle())
        .await
        .expect("session should go idle");
}

/// `(role, text)` pairs of the current log.
pub(crate) fn transcript(session: &SessionController) -> Vec<(colloquy::Role, String)> {
    session
        .log_snapshot()
        .iter()
        .map(|turn| (turn.role(), turn.text().to_owned()))
        .collect()
}

/// Submit `text` against a live script and wait until its first chunk has
/// been written, so the turn is mid-stream rather than still opening.
pub(crate) async fn begin_streaming(
    session: &SessionController,
    backend: &ScriptedBackend,
    events: &mut broadcast::Receiver<EngineEvent>,
    text: &str,
) -> LiveScript {
    let live = backend.push_live();
    session.submit(text, None).expect("idle session admits");
    assert!(live.send(Chunk::text("partial")).await);
    wait_for_event(events, |e| matches!(e, EngineEvent::TextUpdated { .. })).await;
    live
}
