use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_subscriber::EnvFilter;

/// One-time `tracing` init: `tracing_subscriber::fmt().with_env_filter(...)
/// .compact().init()`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .init();
}

/// Per-node plain-text log file at `<log_dir>/<id>.txt`: one event per line, prefixed
/// with local wall-clock time. This is the stable external contract of §6, distinct
/// from the `tracing` output above (operational diagnostics for the process itself).
pub struct NodeLog {
    path: PathBuf,
}

impl NodeLog {
    pub fn open(log_dir: &Path, node_id: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{node_id}.txt"));
        if !path.exists() {
            let mut file = OpenOptions::new().create(true).write(true).open(&path)?;
            writeln!(file, "=== LOG STARTED ===")?;
        }
        Ok(Self { path })
    }

    pub fn write(&self, message: &str) {
        let line = format!("{} - {message}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = file.write_all(line.as_bytes());
        }
    }
}
