//! Failed turns: the user turn stays, the placeholder goes, the error is classified.

use colloquy::Role;
use colloquy::classify::ErrorKind;
use colloquy::config::EngineConfig;
use colloquy::provider::{BackendError, Chunk};
use colloquy::runtime::EngineEvent;
use colloquy::session::Phase;

use crate::helpers::{scripted_session, settle, transcript, wait_for_event};

#[tokio::test]
async fn mid_stream_failure_keeps_user_turn() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_chunks(vec![
        Ok(Chunk::text("Hel")),
        Ok(Chunk::text("lo")),
        Err(BackendError::Other("You exceeded your current quota".into())),
    ]);

    session.submit("hello?", None).unwrap();
    let failed = wait_for_event(&mut events, |e| matches!(e, EngineEvent::TurnFailed { .. })).await;
    settle(&session).await;

    assert_eq!(transcript(&session), vec![(Role::User, "hello?".to_owned())]);
    assert_eq!(session.status().phase, Phase::Error);
    assert!(!session.status().busy);

    let EngineEvent::TurnFailed { error, .. } = failed else {
        unreachable!("matched above");
    };
    assert_eq!(error.kind, ErrorKind::QuotaExceeded);
    assert_eq!(error.details, "You exceeded your current quota");
}

#[tokio::test]
async fn open_failure_is_classified_from_metadata() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_open_failure(BackendError::AuthError("API key not valid".into()));

    session.submit("hi", None).unwrap();
    let failed = wait_for_event(&mut events, |e| matches!(e, EngineEvent::TurnFailed { .. })).await;

    let EngineEvent::TurnFailed { error, .. } = failed else {
        unreachable!("matched above");
    };
    assert_eq!(error.kind, ErrorKind::InvalidCredentials);
    assert!(!error.kind.is_user_recoverable());
    assert_eq!(error.details, "API key not valid");
}

#[tokio::test]
async fn next_submission_after_failure_clears_error_phase() {
    let (session, backend, _events) = scripted_session(&EngineConfig::default());
    backend.push_open_failure(BackendError::NetworkError("fetch failed".into()));
    backend.push_text(&["recovered"]);

    session.submit("one", None).unwrap();
    settle(&session).await;
    assert_eq!(session.status().phase, Phase::Error);

    session.submit("two", None).unwrap();
    settle(&session).await;
    assert_eq!(session.status().phase, Phase::Idle);
    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "one".to_owned()),
            (Role::User, "two".to_owned()),
            (Role::Assistant, "recovered".to_owned())
        ]
    );
    // The failed utterance stays in history.
    assert_eq!(backend.requests()[1].history.len(), 1);
}

#[tokio::test]
async fn cancellation_is_never_reported_as_an_error() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    let _live = backend.push_live();

    session.submit("one", None).unwrap();
    session.stop();
    let terminal = wait_for_event(&mut events, EngineEvent::is_terminal).await;
    assert!(matches!(terminal, EngineEvent::TurnCancelled { .. }));
    settle(&session).await;
    assert_eq!(session.status().phase, Phase::Idle);
}

#[tokio::test]
async fn failure_after_earlier_turns_removes_only_the_placeholder() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["Hello"]);
    session.submit("hi", None).unwrap();
    settle(&session).await;

    backend.push_chunks(vec![
        Ok(Chunk::text("Let me")),
        Err(BackendError::NetworkError("connection reset".into())),
    ]);
    session.submit("and then?", None).unwrap();
    wait_for_event(&mut events, |e| matches!(e, EngineEvent::TurnFailed { .. })).await;
    settle(&session).await;

    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "hi".to_owned()),
            (Role::Assistant, "Hello".to_owned()),
            (Role::User, "and then?".to_owned())
        ]
    );
    assert_eq!(session.status().phase, Phase::Error);
}
