/**
 * SYMBION SELFHEAL - Main entry point of the self-healing simulation kernel
 *
 * ROLE: Bootstrap: env, logging, config, kernel initialization, HTTP server.
 *
 * ARCHITECTURE: Single owned kernel (entity store + drift task) injected into the Axum router.
 * UTILITY: Backend of the self-healing OS panel of the Symbion dashboard.
 */

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use symbion_selfheal::config::load_config;
use symbion_selfheal::http::{self, AppState};
use symbion_selfheal::Kernel;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = load_config().await;
    let addr: SocketAddr = cfg
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", cfg.http.bind))?;

    // kernel + background drift
    let kernel = Arc::new(Kernel::new(cfg));
    kernel.initialize();

    let app = http::build_router(AppState { kernel: kernel.clone() });

    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!("[kernel] listening on http://{addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await;

    kernel.shutdown();
    if let Err(e) = served {
        error!("[kernel] server error: {e}");
        return Err(e.into());
    }
    info!("[kernel] stopped");
    Ok(())
}
