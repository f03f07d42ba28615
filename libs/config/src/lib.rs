//! # Hive Node Configuration
//!
//! Loads node, logger, and cluster settings from TOML files with
//! environment-variable overrides, and bootstraps `tracing` from the
//! logger section.
//!
//! ## Usage
//!
//! ```no_run
//! use hive_config::{load_settings, logging};
//!
//! let settings = load_settings(Some(std::path::Path::new("config/node.toml"))).unwrap();
//! logging::init(&settings.logger);
//! let member = settings.node.to_member();
//! ```

pub mod logging;
pub mod settings;

pub use settings::{
    load_settings, ClusterSettings, HiveSettings, LoggerSettings, NodeSettings, ProviderSettings,
};
