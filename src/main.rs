//! cogbridge API Server
//!
//! Usage:
//!   cargo run --bin cogbridge
//!
//! Environment:
//!   PORT / COGBRIDGE_PORT - Server port (default: 8000)
//!   COGBRIDGE_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG              - Log filter (default: info)
//!   See `ServiceConfig` for the remaining settings.

use cogbridge::{create_router, AppState, ServiceConfig, TelemetryCollector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = ServiceConfig::from_env();
    let addr = config.socket_addr()?;

    info!("📚 Notebook config: {} (ttl {}s)", config.notebook_config_url, config.config_ttl.as_secs());
    info!("📂 Notebook output: {}", config.notebook_output_dir.display());
    info!("🧾 QLR templates:  {}", config.qlr_template_config.display());
    info!("🔗 Jupyter:        {}", config.jupyter_base_url);

    // Initialize telemetry
    let telemetry = Arc::new(TelemetryCollector::new());
    let telemetry_for_shutdown = telemetry.clone();

    // Create app state
    let state = Arc::new(AppState::new(config, telemetry)?);
    info!("🐍 Notebook kernel: {}", state.notebooks.kernel_name());

    // Create router
    let app = create_router(state);

    info!("🚀 cogbridge starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  GET /create-qlr?url=&collection=        - QGIS layer file for a COG");
    info!("  GET /run-notebook/{{notebook_id}}?...     - Prepare a configured notebook");
    info!("  GET /run-notebook?cog_url=&bbox=        - Prepare the local NDVI notebook");
    info!("  GET /view-notebook/{{output_id}}          - Open a prepared notebook");
    info!("  GET /stats                              - Counters and cache statistics");
    info!("  GET /health                             - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    // Start server with graceful shutdown
    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Graceful shutdown sequence
    info!("");
    info!("🛑 Shutdown signal received");
    let stats = telemetry_for_shutdown.get_stats();
    info!("   QLR files generated: {}", stats.qlr_generated);
    info!("   Notebooks prepared:  {}", stats.notebooks_prepared);
    info!("   Failures:            {}", stats.total_failures);
    info!("👋 cogbridge shutdown complete");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    +--------------------------------------------------+
    |                                                  |
    |      c o g b r i d g e   v{:<10}             |
    |      COG -> QGIS layers & Jupyter notebooks      |
    |                                                  |
    +--------------------------------------------------+
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
