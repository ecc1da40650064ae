//! Submitting while busy: queue-and-retry, rejection, and explicit stop.

use colloquy::Role;
use colloquy::config::{DropPolicy, EngineConfig, QueueMode};
use colloquy::runtime::EngineEvent;
use colloquy::session::{Phase, RejectReason, SubmitOutcome};

use crate::helpers::{begin_streaming, drain_events, scripted_session, settle, transcript};

#[tokio::test]
async fn interrupted_turn_is_rolled_back_and_queued_input_runs() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    let live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["Second answer"]);

    let outcome = session.submit("second", None).unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued { pending: 1 });
    settle(&session).await;

    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "second".to_owned()),
            (Role::Assistant, "Second answer".to_owned())
        ]
    );
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(
        requests[1].history.is_empty(),
        "interrupted utterance must not reach the next request"
    );
    assert!(live.is_abandoned());

    let events = drain_events(&mut events);
    let terminal: Vec<&str> = events
        .iter()
        .filter(|e| e.is_terminal())
        .map(EngineEvent::name)
        .collect();
    assert_eq!(terminal, vec!["turn_cancelled", "turn_completed"]);
}

#[tokio::test]
async fn busy_flag_never_drops_while_input_is_pending() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    let mut status = session.watch_status();
    let live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["ok"]);

    session.submit("second", None).unwrap();
    drop(live);

    let mut seen = Vec::new();
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        seen.push(current);
        if !current.busy {
            break;
        }
    }
    assert!(seen.iter().all(|s| s.busy || s.pending == 0));
    assert_eq!(seen.last().map(|s| s.busy), Some(false));
}

#[tokio::test]
async fn collect_mode_merges_queued_inputs_into_one_turn() {
    let mut config = EngineConfig::default();
    config.queue.mode = QueueMode::Collect;
    let (session, backend, mut events) = scripted_session(&config);
    let _live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["merged reply"]);

    assert_eq!(
        session.submit("turn on the lamp", None).unwrap(),
        SubmitOutcome::Queued { pending: 1 }
    );
    assert_eq!(
        session.submit("and the fan", None).unwrap(),
        SubmitOutcome::Queued { pending: 2 }
    );
    settle(&session).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prompt, "turn on the lamp\n\nand the fan");
    assert_eq!(session.log_snapshot().len(), 2);
}

#[tokio::test]
async fn disabled_queue_rejects_with_signal_and_retry_succeeds() {
    let mut config = EngineConfig::default();
    config.queue.max_pending = 0;
    let (session, backend, mut events) = scripted_session(&config);
    let _live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["retried"]);

    let outcome = session.submit("second", None).unwrap();
    assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::QueueDisabled));
    settle(&session).await;

    // The interrupted turn left nothing behind; the caller retries.
    assert!(session.log_snapshot().is_empty());
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        EngineEvent::InputRejected {
            reason: RejectReason::QueueDisabled
        }
    )));

    assert!(matches!(
        session.submit("second", None).unwrap(),
        SubmitOutcome::Started { .. }
    ));
    settle(&session).await;
    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "second".to_owned()),
            (Role::Assistant, "retried".to_owned())
        ]
    );
}

#[tokio::test]
async fn full_queue_rejects_under_drop_policy_none() {
    let mut config = EngineConfig::default();
    config.queue.max_pending = 1;
    let (session, backend, mut events) = scripted_session(&config);
    let _live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["kept"]);

    assert_eq!(
        session.submit("second", None).unwrap(),
        SubmitOutcome::Queued { pending: 1 }
    );
    assert_eq!(
        session.submit("third", None).unwrap(),
        SubmitOutcome::Rejected(RejectReason::QueueFull)
    );
    settle(&session).await;

    assert_eq!(backend.requests()[1].prompt, "second");
}

#[tokio::test]
async fn displaced_input_is_announced() {
    let mut config = EngineConfig::default();
    config.queue.max_pending = 1;
    config.queue.drop_policy = DropPolicy::Oldest;
    let (session, backend, mut events) = scripted_session(&config);
    let _live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["latest wins"]);

    session.submit("second", None).unwrap();
    session.submit("third", None).unwrap();
    settle(&session).await;

    assert_eq!(backend.requests()[1].prompt, "third");
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        EngineEvent::InputDropped { text } if text == "second"
    )));
}

#[tokio::test]
async fn stop_cancels_and_clears_the_queue() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    let live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["never requested"]);

    session.submit("second", None).unwrap();
    assert!(session.stop());
    settle(&session).await;

    assert!(session.log_snapshot().is_empty());
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(backend.remaining(), 1);
    assert_eq!(session.status().phase, Phase::Idle);
    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, EngineEvent::QueueCleared { dropped: 1 })));
    drop(live);
}

#[tokio::test]
async fn stop_can_keep_the_queue() {
    let mut config = EngineConfig::default();
    config.queue.clear_on_stop = false;
    let (session, backend, mut events) = scripted_session(&config);
    let _live = begin_streaming(&session, &backend, &mut events, "first").await;
    backend.push_text(&["still answered"]);

    session.submit("second", None).unwrap();
    assert!(session.stop());
    settle(&session).await;

    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "second".to_owned()),
            (Role::Assistant, "still answered".to_owned())
        ]
    );
}

#[tokio::test]
async fn completion_before_interruption_is_kept() {
    let (session, backend, _events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["done"]);

    session.submit("first", None).unwrap();
    settle(&session).await;
    assert!(!session.stop());

    assert_eq!(session.log_snapshot().len(), 2);
}

#[tokio::test]
async fn stopping_a_turn_keeps_earlier_history() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["Hello", " there"]);
    session.submit("hi", None).unwrap();
    settle(&session).await;
    drain_events(&mut events);

    let live = begin_streaming(&session, &backend, &mut events, "tell me more").await;
    assert!(session.stop());
    settle(&session).await;

    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "hi".to_owned()),
            (Role::Assistant, "Hello there".to_owned())
        ]
    );
    assert_eq!(session.status().phase, Phase::Idle);
    assert_eq!(backend.requests()[1].history.len(), 2);
    drop(live);
}
