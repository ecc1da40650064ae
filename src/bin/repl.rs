//! Interactive line-based front end for the session engine.
//!
//! Each stdin line is submitted as a user turn; assistant replies stream to
//! stdout. `/stop` interrupts the running turn, `/provider <name>` switches
//! the generation provider, `/quit` exits. Diagnostics go to stderr.
//!
//! The config path comes from `COLLOQUY_CONFIG`, falling back to the
//! platform config directory.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colloquy::config::EngineConfig;
use colloquy::dispatch::TracingDispatcher;
use colloquy::provider::{EchoBackend, GenerationBackend, ProviderRouter};
use colloquy::runtime::{EngineEvent, ErrorNotice};
use colloquy::session::{SessionController, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

const ECHO_CHUNK_DELAY: Duration = Duration::from_millis(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var_os("COLLOQUY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(EngineConfig::default_path);
    let config = EngineConfig::load_or_default(&path)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let providers: Vec<Arc<dyn GenerationBackend>> =
        vec![Arc::new(EchoBackend::new().with_chunk_delay(ECHO_CHUNK_DELAY))];
    let router = Arc::new(ProviderRouter::from_config(&config.provider, providers)?);
    let session = SessionController::new(router.clone(), Arc::new(TracingDispatcher), &config);
    tracing::info!(config = %path.display(), session_id = %session.session_id(), "colloquy-repl starting");

    let printer = tokio::spawn(print_events(session.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/stop" => {
                if !session.stop() {
                    println!("(nothing to stop)");
                }
            }
            command if command.starts_with("/provider") => {
                let name = command.trim_start_matches("/provider").trim();
                match router.select(name) {
                    Ok(()) => println!("(provider: {})", router.active_name()),
                    Err(e) => println!("(error: {e})"),
                }
            }
            text => match session.submit(text, None) {
                Ok(SubmitOutcome::Started { .. }) => {}
                Ok(SubmitOutcome::Queued { pending }) => println!("(queued, {pending} pending)"),
                Ok(SubmitOutcome::Rejected(reason)) => println!("(rejected: {reason})"),
                Err(e) => println!("(error: {e})"),
            },
        }
    }

    session.stop();
    session.wait_idle().await;
    printer.abort();
    tracing::info!("colloquy-repl shut down cleanly");
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>) {
    let mut shown = 0usize;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        match event {
            EngineEvent::TurnStarted { .. } => {
                shown = 0;
                print!("assistant> ");
            }
            EngineEvent::TextUpdated { text, .. } => {
                // Command replies replace the streamed JSON wholesale.
                if text.len() >= shown && text.is_char_boundary(shown) {
                    print!("{}", &text[shown..]);
                } else {
                    print!("\rassistant> {text}");
                }
                shown = text.len();
            }
            EngineEvent::TurnCompleted { .. } => println!(),
            EngineEvent::TurnCancelled { .. } => println!(" [interrupted]"),
            EngineEvent::TurnFailed { error, .. } => {
                let notice = ErrorNotice::from(&error);
                println!();
                println!("error> {}: {}", notice.title, notice.message);
                if let Some(hint) = notice.hint {
                    println!("       {hint}");
                }
            }
            EngineEvent::CommandForwarded {
                request, spoken_text, ..
            } => println!("  -> {} {} ({spoken_text})", request.directive, request.target),
            EngineEvent::InputDropped { text } => println!("(dropped queued input: {text})"),
            EngineEvent::QueueCleared { dropped } => println!("(cleared {dropped} queued)"),
            EngineEvent::InputQueued { .. }
            | EngineEvent::InputRejected { .. }
            | EngineEvent::StatusChanged(_) => {}
        }
        let _ = std::io::stdout().flush();
    }
}
