use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{now_ms, Engine};
use crate::notify::{self, Notifier};

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically mark finished confirmed bookings as completed.
pub async fn run_completer(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let completed = engine.complete_finished(now_ms()).await;
        if !completed.is_empty() {
            info!("auto-completed {} bookings", completed.len());
        }
    }
}

/// Compact the journal whenever enough records have piled up since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&engine, threshold).await {
            warn!("journal compaction failed: {e}");
        }
    }
}

async fn compact_if_needed(
    engine: &Engine,
    threshold: u64,
) -> Result<bool, crate::engine::EngineError> {
    if engine.journal_appends_since_compact().await < threshold {
        return Ok(false);
    }
    engine.compact().await?;
    Ok(true)
}

/// Start the dispatcher, compactor and (if configured) completion sweep.
pub fn spawn_background(
    engine: Arc<Engine>,
    config: &Config,
    notifier: Arc<dyn Notifier>,
) -> Vec<JoinHandle<()>> {
    let mut handles = vec![
        tokio::spawn(notify::run_dispatcher(engine.notify.clone(), notifier)),
        tokio::spawn(run_compactor(engine.clone(), config.compact_threshold)),
    ];
    if let Some(every) = config.completion_sweep {
        handles.push(tokio::spawn(run_completer(engine, every)));
    }
    handles
}
