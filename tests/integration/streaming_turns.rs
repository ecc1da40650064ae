//! Completed turns: prose, commands, sources, history.

use std::sync::Arc;

use colloquy::Role;
use colloquy::command::{Directive, Payload};
use colloquy::config::EngineConfig;
use colloquy::conversation::CitationRecord;
use colloquy::dispatch::ChannelDispatcher;
use colloquy::provider::Chunk;
use colloquy::runtime::EngineEvent;
use colloquy::session::{Phase, SubmitOutcome};

use crate::helpers::{drain_events, scripted_session, scripted_session_with, settle, transcript};

#[tokio::test]
async fn prose_reply_assembles_and_has_no_sources() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["Hel", "lo"]);

    let outcome = session.submit("greet me", None).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Started { .. }));
    settle(&session).await;

    let turns = session.log_snapshot();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role(), Role::Assistant);
    assert_eq!(turns[1].text(), "Hello");
    assert!(turns[1].sources().is_none());
    assert_eq!(session.status().phase, Phase::Idle);

    let events = drain_events(&mut events);
    assert!(matches!(
        events.iter().find(|e| e.is_terminal()),
        Some(EngineEvent::TurnCompleted {
            payload: Payload::Prose,
            ..
        })
    ));
}

#[tokio::test]
async fn streamed_text_only_grows_until_final() {
    let (session, backend, mut events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["The ", "quick ", "brown ", "fox"]);

    session.submit("story", None).unwrap();
    settle(&session).await;

    let lengths: Vec<usize> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::TextUpdated { text, .. } => Some(text.len()),
            _ => None,
        })
        .collect();
    assert!(!lengths.is_empty());
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn command_reply_shows_spoken_text_and_is_dispatched() {
    let (dispatcher, mut commands) = ChannelDispatcher::channel();
    let (session, backend, mut events) =
        scripted_session_with(&EngineConfig::default(), Arc::new(dispatcher));
    backend.push_text(&[r#"{"kind":"device_control""#, r#","spokenText":"Done."}"#]);

    session.submit("lights off", None).unwrap();
    settle(&session).await;

    assert_eq!(
        transcript(&session),
        vec![
            (Role::User, "lights off".to_owned()),
            (Role::Assistant, "Done.".to_owned())
        ]
    );
    let request = commands.try_recv().unwrap();
    assert_eq!(request.directive, Directive::Other(String::new()));
    assert!(commands.try_recv().is_err());

    let forwarded = drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::CommandForwarded { .. }))
        .count();
    assert_eq!(forwarded, 1);
}

#[tokio::test]
async fn multi_directive_reply_dispatches_every_envelope_in_order() {
    let (dispatcher, mut commands) = ChannelDispatcher::channel();
    let (session, backend, _events) =
        scripted_session_with(&EngineConfig::default(), Arc::new(dispatcher));
    backend.push_text(&[
        r#"[{"kind":"device_control","directive":"turn_off","target":"tv","spokenText":"Goodnight."},"#,
        r#"{"kind":"device_control","directive":"turn_off","target":"lamp","spokenText":"Lamp off."}]"#,
    ]);

    session.submit("goodnight", None).unwrap();
    settle(&session).await;

    assert_eq!(session.log_snapshot()[1].text(), "Goodnight.");
    let targets: Vec<String> = std::iter::from_fn(|| commands.try_recv().ok())
        .map(|r| r.target)
        .collect();
    assert_eq!(targets, vec!["tv", "lamp"]);
}

#[tokio::test]
async fn json_lookalike_stays_prose() {
    let (dispatcher, mut commands) = ChannelDispatcher::channel();
    let (session, backend, _events) =
        scripted_session_with(&EngineConfig::default(), Arc::new(dispatcher));
    backend.push_text(&["{not json"]);

    session.submit("break it", None).unwrap();
    settle(&session).await;

    assert_eq!(session.log_snapshot()[1].text(), "{not json");
    assert!(commands.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_sources_collapse_first_seen() {
    let (session, backend, _events) = scripted_session(&EngineConfig::default());
    backend.push_chunks(vec![
        Ok(Chunk::text("Per ").with_sources(vec![
            CitationRecord::new("a"),
            CitationRecord::new("b"),
        ])),
        Ok(Chunk::text("sources.").with_sources(vec![CitationRecord::new("a")])),
    ]);

    session.submit("cite", None).unwrap();
    settle(&session).await;

    let turns = session.log_snapshot();
    assert_eq!(
        turns[1].sources(),
        Some(&[CitationRecord::new("a"), CitationRecord::new("b")][..])
    );
}

#[tokio::test]
async fn later_turns_receive_prior_history() {
    let (session, backend, _events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["first answer"]);
    backend.push_text(&["second answer"]);

    session.submit("first", None).unwrap();
    settle(&session).await;
    session.submit("second", None).unwrap();
    settle(&session).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].history.is_empty());
    let history: Vec<&str> = requests[1].history.iter().map(|t| t.text()).collect();
    assert_eq!(history, vec!["first", "first answer"]);
    assert_eq!(requests[1].prompt, "second");
    assert_eq!(session.log_snapshot().len(), 4);
}

#[tokio::test]
async fn attachment_reaches_the_backend_and_the_log() {
    let (session, backend, _events) = scripted_session(&EngineConfig::default());
    backend.push_text(&["A cat."]);
    let image = colloquy::conversation::Attachment::new("img-7", "image/jpeg");

    session.submit("what is this?", Some(image.clone())).unwrap();
    settle(&session).await;

    assert_eq!(backend.requests()[0].attachment.as_ref(), Some(&image));
    assert_eq!(session.log_snapshot()[0].attachment(), Some(&image));
}
