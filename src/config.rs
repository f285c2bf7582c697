use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from `HOMEBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// Compact the journal once this many records were appended since the last compaction.
    pub compact_threshold: u64,
    pub strict_slots: bool,
    /// How often finished confirmed bookings are marked completed. `None` disables the sweep.
    pub completion_sweep: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            strict_slots: false,
            completion_sweep: Some(Duration::from_secs(300)),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| var(key).and_then(|s| s.trim().parse::<u64>().ok());
        Self {
            data_dir: var("HOMEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: var("HOMEBOOK_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: parsed("HOMEBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            strict_slots: var("HOMEBOOK_STRICT_SLOTS")
                .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.strict_slots),
            completion_sweep: match parsed("HOMEBOOK_COMPLETION_SWEEP_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.completion_sweep,
            },
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("homebook.wal")
    }
}
