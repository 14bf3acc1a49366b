use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_chat::call::{CallEvent, CallSession};
use voice_chat::config::AgentConfig;
use voice_chat::llm::{GeminiClient, StreamEvent};

/// Environment variable holding an optional TOML config path
const CONFIG_PATH_VAR: &str = "VOICE_CHAT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_chat=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting voice chat agent");

    let config = load_config()?;
    config.validate()?;
    info!("Using model {}", config.model_id);

    let client = Arc::new(GeminiClient::new(&config)?);
    let (session, handle) = CallSession::new(&config, client);
    let (event_tx, mut response_rx) = handle.into_parts();

    info!("Call {} connected; type to talk, /quit to hang up", session.call_id());
    let call = tokio::spawn(session.run());

    spawn_console_reader(event_tx);

    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = response_rx.recv().await {
            if let Err(e) = print_event(&mut stdout, event) {
                warn!("Failed to write to stdout: {}", e);
                break;
            }
        }
    });

    let outcome = call.await.context("call task panicked")?;
    printer.await.context("printer task panicked")?;

    match outcome {
        Ok(end) => {
            info!("Call finished: {:?}", end);
            Ok(())
        }
        Err(e) => {
            error!(recoverable = e.is_recoverable(), "Call failed: {}", e);
            println!("\n[{}]", e.user_message());
            Err(e.into())
        }
    }
}

/// Write one response event to the console
fn print_event(out: &mut impl Write, event: StreamEvent) -> std::io::Result<()> {
    match event {
        StreamEvent::TextChunk { content } => write!(out, "{}", content)?,
        StreamEvent::EndCall { message } => {
            if let Some(message) = message {
                write!(out, " {}", message)?;
            }
            writeln!(out, "\n[call ended by agent]")?;
        }
    }
    out.flush()
}

fn load_config() -> Result<AgentConfig> {
    let config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => AgentConfig::load(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => AgentConfig::default(),
    };

    Ok(config.apply_env())
}

/// Feed stdin lines into the call as caller utterances
///
/// Every line interrupts any reply still streaming, like a caller talking
/// over the agent. Reading happens on a plain thread because stdin blocks.
fn spawn_console_reader(event_tx: mpsc::Sender<CallEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line.trim().to_string(),
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };

            if line.is_empty() {
                continue;
            }

            let events = if line == "/quit" {
                vec![CallEvent::Hangup]
            } else {
                vec![
                    CallEvent::UserStartedSpeaking,
                    CallEvent::TranscriptionReceived(line),
                    CallEvent::UserStoppedSpeaking,
                ]
            };

            for event in events {
                if event_tx.blocking_send(event).is_err() {
                    return;
                }
            }
        }

        let _ = event_tx.blocking_send(CallEvent::Hangup);
    });
}
