#![doc = include_str!("../README.md")]

use clap::Parser;
use objectid::{BlockAllocator, FileCounterStore};
use objectid_axum_server::server::{
    config::{CliArgs, ServerConfig},
    service::handler::{IdService, router},
    telemetry::init_telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_format)?;

    let store = FileCounterStore::open(&config.data_dir)?;
    let allocator = BlockAllocator::new(store, config.source_id, config.types.clone())?
        .with_max_cache_age(config.max_cache_age);
    if config.setup_on_start {
        let report = allocator.setup_types()?;
        tracing::info!(created = ?report.created, "types provisioned on start");
    }

    let service = IdService::new(Arc::new(allocator), config.max_block_size);
    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config, &service);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &ServerConfig, service: &IdService<FileCounterStore>) {
    let served: Vec<_> = service
        .allocator()
        .types()
        .into_iter()
        .map(|ty| ty.name)
        .collect();
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting ID service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting ID service on {} for source {} (blocks of at most {} values)",
            config.server_addr,
            config.source_id,
            service.max_block_size()
        );
    }
    if served.len() < config.types.len() {
        tracing::warn!(
            served = ?served,
            declared = config.types.len(),
            "some declared types have no counter yet; run setup to provision them"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
