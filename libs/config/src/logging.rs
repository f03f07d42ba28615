//! Tracing Bootstrap
//!
//! Initializes the global `tracing` subscriber from [`LoggerSettings`].
//! The `RUST_LOG` environment variable, when set, overrides the configured
//! level so operators can raise verbosity without touching config files.

use crate::settings::LoggerSettings;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Idempotent; later calls are no-ops so
/// tests that share a process cannot trample each other.
pub fn init(settings: &LoggerSettings) {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

        match &settings.path {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .unwrap_or_else(|e| panic!("cannot open log file {}: {}", path.display(), e));
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .init();
            }
            None => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }

        info!(level = %settings.level, "logging initialized");
    });
}
