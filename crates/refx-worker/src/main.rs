//! Render worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use refx_media::FfmpegEncoder;
use refx_queue::RedisQueue;
use refx_storage::R2Publisher;
use refx_store::RedisJobStore;
use refx_worker::{Worker, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting refx-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    let queue = match RedisQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create render queue: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.connect().await {
        error!("Failed to connect to render queue: {}", e);
        std::process::exit(1);
    }

    let store = match RedisJobStore::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create job store: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = store.connect().await {
        error!("Failed to connect to job store: {}", e);
        std::process::exit(1);
    }

    let encoder = match FfmpegEncoder::from_env() {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to create encoder: {}", e);
            std::process::exit(1);
        }
    };

    let publisher = match R2Publisher::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create artifact publisher: {}", e);
            std::process::exit(1);
        }
    };

    let worker = Worker::new(
        config,
        Arc::new(queue),
        Arc::new(store),
        Arc::new(encoder),
        Arc::new(publisher),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    if let Err(e) = worker.run(shutdown_rx).await {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production.
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,refx=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
