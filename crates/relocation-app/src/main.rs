//! Relocation planner binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Open the SQLite-backed plan store
//! 3. Run the requested subcommand against it

mod cli;
mod replay;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use relocation_core::config::RelocationConfig;
use relocation_core::{EventBus, TimelineEvent};
use relocation_storage::SqliteKeyValueStore;
use relocation_timeline::TimelineStore;
use relocation_voice::{CompletedCall, ToolContext, ToolDispatcher, ToolRegistry};

use cli::{CliArgs, Command};

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &RelocationConfig) -> Result<Arc<TimelineStore>, Box<dyn std::error::Error>> {
    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = config.db_path();
    let kv = Arc::new(SqliteKeyValueStore::open(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let events = EventBus::new(config.timeline.event_buffer);
    Ok(Arc::new(TimelineStore::open(kv, &config.storage, events)))
}

fn print_plan(store: &TimelineStore) -> Result<(), serde_json::Error> {
    let snapshot = store.snapshot();
    let plan = json!({
        "services": snapshot.selected_services,
        "profile": snapshot.profile,
        "tasks": snapshot.tasks,
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Print UI messages queued on `rx` so far.
fn print_messages(rx: &mut tokio::sync::broadcast::Receiver<TimelineEvent>) {
    loop {
        match rx.try_recv() {
            Ok(TimelineEvent::UiMessage { message, .. }) => println!("> {}", message),
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Some assistant messages were dropped");
            }
            Err(_) => break,
        }
    }
}

async fn select(store: Arc<TimelineStore>, config: &RelocationConfig, services: Vec<String>) {
    let context = ToolContext::new(store, config.voice.clone());
    let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), context);
    let call = CompletedCall {
        call_id: "cli".to_string(),
        name: "select_services".to_string(),
        arguments: json!({ "services": services }),
    };
    let outcome = dispatcher.execute(&call).await;
    println!("{}", outcome.output);
}

async fn run_replay(
    store: Arc<TimelineStore>,
    config: &RelocationConfig,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = std::fs::read_to_string(file)?;
    let frames = replay::read_frames(&log);
    let mut messages = store.events().subscribe();

    let sent = replay::replay(Arc::clone(&store), config.voice.clone(), frames).await?;
    print_messages(&mut messages);
    for frame in sent {
        println!("< {}", frame);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        RelocationConfig::load(&config_file)?
    } else {
        RelocationConfig::default()
    };
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    init_tracing(&args.resolve_log_level(&config.general.log_level));
    tracing::info!("Starting relocation v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let store = open_store(&config)?;

    match args.command {
        Command::Show => print_plan(&store)?,
        Command::Reset => {
            store.reset_all()?;
            println!("Plan reset");
        }
        Command::Select { services } => {
            select(Arc::clone(&store), &config, services).await;
            print_plan(&store)?;
        }
        Command::Replay { file } => run_replay(store, &config, &file).await?,
    }

    Ok(())
}
