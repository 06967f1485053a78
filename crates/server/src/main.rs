use std::sync::Arc;

use clap::Parser;
use craftsync_server::config::ServerConfig;
use craftsync_server::persistence::PersistError;
use craftsync_server::state::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("craftsync -- authoritative voxel sandbox server");

    // ── Seed terrain, then overlay the saved world ──────────────────────
    let state = Arc::new(ServerState::new(&config));

    if config.fresh {
        tracing::info!("--fresh given, not loading {}", config.world_file.display());
    } else {
        match state.persistence.load(&state.world).await {
            Ok(blocks) => tracing::info!("Restored {} blocks", blocks.len()),
            Err(PersistError::NotFound(path)) => {
                tracing::info!("No saved world at {}, starting fresh", path.display())
            }
            Err(e) => tracing::error!("Failed to load saved world: {:#}", e),
        }
    }

    // ── Periodic autosave ───────────────────────────────────────────────
    if let Some(period) = config.autosave_interval() {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick is immediate, skip it
            loop {
                interval.tick().await;
                tracing::info!("Autosaving...");
                if let Err(e) = state.persistence.save(&state.world).await {
                    tracing::error!("Autosave failed: {:#}", e);
                }
            }
        });
    }

    // ── Serve until Ctrl+C ──────────────────────────────────────────────
    tokio::select! {
        result = craftsync_server::net::listener::run(Arc::clone(&state), config.bind) => {
            if let Err(e) = result {
                tracing::error!("Server error: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }

    // ── Save on shutdown ────────────────────────────────────────────────
    tracing::info!("Saving world before exit...");
    match state.persistence.save(&state.world).await {
        Ok(n) => tracing::info!("Shutdown save complete: {} blocks written", n),
        Err(e) => tracing::error!("Shutdown save failed: {:#}", e),
    }
    Ok(())
}
