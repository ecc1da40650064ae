//! Config file loading and provider routing from config.

use std::sync::Arc;

use colloquy::DialogueError;
use colloquy::config::{DropPolicy, EngineConfig, QueueMode};
use colloquy::provider::{EchoBackend, GenerationBackend, ProviderRouter, ScriptedBackend};

#[test]
fn full_file_round_trips_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[provider]
active = "scripted"

[queue]
mode = "collect"
max_pending = 3
drop_policy = "newest"
clear_on_stop = false

[events]
capacity = 16

[logging]
filter = "colloquy=debug"
"#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.provider.active, "scripted");
    assert_eq!(config.queue.mode, QueueMode::Collect);
    assert_eq!(config.queue.max_pending, 3);
    assert_eq!(config.queue.drop_policy, DropPolicy::Newest);
    assert!(!config.queue.clear_on_stop);
    assert_eq!(config.events.capacity, 16);
    assert_eq!(config.logging.filter, "colloquy=debug");
}

#[test]
fn router_selects_configured_provider() {
    let config = EngineConfig::default();
    let providers: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(EchoBackend::new()),
        Arc::new(ScriptedBackend::new("scripted")),
    ];
    let router = ProviderRouter::from_config(&config.provider, providers).unwrap();
    assert_eq!(router.active_name(), "echo");
    assert_eq!(router.provider_names(), vec!["echo", "scripted"]);
}

#[test]
fn router_rejects_unknown_provider() {
    let mut config = EngineConfig::default();
    config.provider.active = "missing".to_owned();
    let providers: Vec<Arc<dyn GenerationBackend>> = vec![Arc::new(EchoBackend::new())];
    let err = ProviderRouter::from_config(&config.provider, providers).unwrap_err();
    assert!(matches!(err, DialogueError::Config(_)));
}
