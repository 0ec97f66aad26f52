use dispatchbox::config::Config;
use dispatchbox::queue::QueueClient;
use dispatchbox::store::{FjallStore, ListStore};
use dispatchbox::worker::{Accounting, Worker};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{EnqueueArgs, FailedArgs, StatsArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn open_store(config: &Config) -> Result<Arc<FjallStore>, AnyError> {
    Ok(Arc::new(FjallStore::open(&config.store.path)?))
}

pub async fn work(config: &Config) -> Result<(), AnyError> {
    let registry = config.registry();
    if registry.is_empty() {
        warn!("No handlers configured, the worker will poll nothing");
    }

    let store = open_store(config)?;
    let worker = Worker::new(
        store.clone(),
        config.key_namer(),
        registry,
        config.worker_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let result = worker.run(shutdown_rx).await;
    store.persist()?;
    result?;
    Ok(())
}

pub async fn enqueue(config: &Config, args: EnqueueArgs) -> Result<(), AnyError> {
    let store = open_store(config)?;
    let client = QueueClient::new(store.clone(), config.key_namer());

    let job_args = args.args.iter().map(|raw| parse_arg(raw)).collect();
    client.enqueue(&args.queue, &args.class, job_args).await?;
    store.persist()?;

    info!(queue = %args.queue, class = %args.class, "Job enqueued");
    Ok(())
}

pub async fn stats(config: &Config, args: StatsArgs) -> Result<(), AnyError> {
    let store: Arc<dyn ListStore> = open_store(config)?;
    let accounting = Accounting::new(store, config.key_namer());

    let stats = accounting.stats(args.job.as_deref()).await?;
    let scope = args.job.as_deref().unwrap_or("all jobs");
    println!("{}: processed={} failed={}", scope, stats.processed, stats.failed);
    Ok(())
}

pub async fn failed(config: &Config, args: FailedArgs) -> Result<(), AnyError> {
    let store: Arc<dyn ListStore> = open_store(config)?;
    let accounting = Accounting::new(store, config.key_namer());

    let total = accounting.failure_count().await?;
    for payload in accounting.failures(args.start, args.limit).await? {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    println!("{} failure(s) recorded", total);
    Ok(())
}

/// Parse a CLI argument as JSON, falling back to a string
fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
