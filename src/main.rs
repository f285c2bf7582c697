use std::sync::Arc;

use tracing::info;

use homebook::config::Config;
use homebook::engine::Engine;
use homebook::maintenance;
use homebook::notify::LogNotifier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    homebook::observability::init_logging();

    let config = Config::from_env();
    homebook::observability::init(config.metrics_port)?;

    let engine = Arc::new(Engine::open(&config)?);
    let handles = maintenance::spawn_background(engine.clone(), &config, Arc::new(LogNotifier));

    info!("homebook running");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  strict_slots: {}", config.strict_slots);
    info!(
        "  completion sweep: {}",
        config
            .completion_sweep
            .map_or("disabled".to_string(), |d| format!("every {}s", d.as_secs()))
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Wait for SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received, stopping background tasks");
    for handle in handles {
        handle.abort();
    }
    if let Err(e) = engine.compact().await {
        tracing::warn!("final compaction failed: {e}");
    }

    info!("homebook stopped");
    Ok(())
}
