//! Interactive console demo for the assistant engine.
//!
//! Spoken lines print to stdout; typed lines stand in for recognized
//! speech. Type a stop command ("stop", "goodbye", ...) or press Ctrl-D
//! to end the session.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use stellarforge::{Assistant, AssistantConfig, AssistantEvent, ConsoleVoice, JsonFileStore, Phase};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = AssistantConfig::default();
    let store = Arc::new(JsonFileStore::new(&config.history.root_dir));
    let assistant = Assistant::new(config, Arc::new(ConsoleVoice), store);

    let mut events = assistant.subscribe();
    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::from_millis(300));

    while let Ok(event) = events.recv().await {
        match event {
            AssistantEvent::ContactFormRequested => {
                println!("[the contact form would open here]");
                break;
            }
            AssistantEvent::PhaseChanged(Phase::Idle) => break,
            _ => {}
        }
    }

    assistant.set_active(false);
    Ok(())
}
