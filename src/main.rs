use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storycluster::{
    clustering::ClusterMatcher,
    config::{Config, ObservabilityConfig, ProcessingConfig, RetentionConfig, StateConfig},
    models::{Entity, Item, Tag},
    processing::{ingest_queue, ItemProcessor, WorkerPool},
    reference::InMemoryReference,
    scheduler::start_scheduler,
    state::create_store,
};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Enrichment-and-clustering pipeline. Reads newline-delimited JSON
/// items on stdin and folds them into story clusters.
#[derive(Parser)]
#[command(name = "storycluster", version)]
struct Args {
    /// Entity dictionary seed file (JSON array of entities)
    #[arg(long, env = "STORYCLUSTER_ENTITIES")]
    entities: Option<PathBuf>,

    /// Tag table seed file (JSON array of tags)
    #[arg(long, env = "STORYCLUSTER_TAGS")]
    tags: Option<PathBuf>,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        default_config()
    });

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("storycluster={}", config.observability.log_level).into());
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting storycluster v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = storycluster::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    }

    // Initialize storage backend
    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state).await?;

    // Seed reference data
    let reference = Arc::new(InMemoryReference::new());
    if let Some(path) = &args.entities {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading entity dictionary {}", path.display()))?;
        let entities: Vec<Entity> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing entity dictionary {}", path.display()))?;
        tracing::info!(count = entities.len(), "Entity dictionary loaded");
        reference.replace_entities(entities);
    } else {
        tracing::warn!("No entity dictionary given; entity matching will find nothing");
    }
    if let Some(path) = &args.tags {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tag table {}", path.display()))?;
        let tags: Vec<Tag> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing tag table {}", path.display()))?;
        tracing::info!(count = tags.len(), "Tag table loaded");
        reference.replace_tags(tags);
    }

    // Wire up the pipeline
    let matcher = ClusterMatcher::new(config.clustering.clone());
    let processor = Arc::new(ItemProcessor::new(
        store.clone(),
        reference,
        matcher,
        config.processing.clone(),
    ));

    let workers = args.workers.unwrap_or(config.processing.workers);
    let (sender, receiver) = ingest_queue(config.processing.queue_capacity);
    let pool = WorkerPool::start(processor, receiver, workers);
    tracing::info!(workers = workers, "Pipeline workers started");

    // Start the retention scheduler
    let mut scheduler = start_scheduler(store.clone(), &config.retention).await?;

    // Feed NDJSON items from stdin until EOF
    let mut feeder = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let mut accepted: u64 = 0;
        let mut malformed: u64 = 0;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Item>(&line) {
                        Ok(item) => {
                            if sender.send(item).await.is_err() {
                                break;
                            }
                            accepted += 1;
                        }
                        Err(e) => {
                            malformed += 1;
                            tracing::warn!(error = %e, "Dropping malformed input line");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        (accepted, malformed)
    });

    tokio::select! {
        result = &mut feeder => {
            if let Ok((accepted, malformed)) = result {
                tracing::info!(accepted = accepted, malformed = malformed, "Input drained");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            // Aborting the feeder drops the ingest sender
            feeder.abort();
        }
    }

    // Dropping the last sender lets the workers drain and exit
    pool.join().await;
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }

    if config.observability.prometheus_enabled {
        print!("{}", storycluster::metrics::gather_metrics());
    }

    tracing::info!("Shutting down gracefully");
    Ok(())
}

fn default_config() -> Config {
    Config {
        state: StateConfig {
            backend: Default::default(),
            path: None,
        },
        processing: ProcessingConfig::default(),
        clustering: Default::default(),
        retention: RetentionConfig::default(),
        observability: ObservabilityConfig::default(),
    }
}
