//! Settings Structures and Loading
//!
//! Mirrors the on-disk layout consumed by node bootstrap:
//!
//! ```toml
//! [node]
//! id = 1
//! kind = "game"
//! address = "10.0.0.5"
//! port = 7101
//! tags = ["game"]
//!
//! [logger]
//! level = "info"
//!
//! [cluster]
//! name = "dev"
//! node_subject_prefix = "cluster.node."
//! codec = "json"
//!
//! [cluster.discovery]
//! provider = "memory"
//!
//! [cluster.message_queue]
//! provider = "memory"
//! ```

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use hive_codec::Codec;
use hive_types::Member;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveSettings {
    pub node: NodeSettings,
    #[serde(default)]
    pub logger: LoggerSettings,
    #[serde(default)]
    pub cluster: Option<ClusterSettings>,
}

/// Identity and endpoint of this node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSettings {
    pub id: u64,
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl NodeSettings {
    /// Build the discovery membership record for this node.
    ///
    /// The node kind is always present as a tag so service-name routing can
    /// target whole node classes.
    pub fn to_member(&self) -> Member {
        let mut member = Member::new(self.id, self.kind.clone())
            .with_endpoint(self.address.clone(), self.port);
        member.tags.insert(self.kind.clone());
        member.tags.extend(self.tags.iter().cloned());
        member.meta = self.meta.clone();
        member
    }
}

/// Logger section: level filter plus optional file output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Rotation policy consumed by deployment tooling ("daily", "size:100mb", ...)
    #[serde(default)]
    pub rotation: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            path: None,
            level: default_log_level(),
            rotation: None,
        }
    }
}

/// Cluster overlay section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub name: String,
    pub discovery: ProviderSettings,
    pub message_queue: ProviderSettings,
    #[serde(default = "default_subject_prefix")]
    pub node_subject_prefix: String,
    #[serde(default)]
    pub codec: Codec,
}

fn default_subject_prefix() -> String {
    "cluster.node.".to_string()
}

/// Pluggable provider selection: a type name plus free-form parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl HiveSettings {
    /// Load configuration from a TOML file with `HIVE_`-prefixed
    /// environment-variable overrides layered on top.
    pub fn load(base_path: Option<&Path>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/node.toml"));
        info!(config = %base.display(), "loading node configuration");

        let builder = Config::builder()
            .add_source(File::from(base).required(true))
            .add_source(
                Environment::with_prefix("HIVE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build().context("failed to build configuration")?;
        let mut settings: HiveSettings = config
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        settings.expand_env_vars()?;
        Ok(settings)
    }

    /// Expand `$VAR` references in endpoint and provider parameters
    fn expand_env_vars(&mut self) -> Result<()> {
        if !self.node.address.is_empty() {
            self.node.address = shellexpand::env(&self.node.address)
                .context("failed to expand node address")?
                .to_string();
        }
        if let Some(cluster) = &mut self.cluster {
            for params in [
                &mut cluster.discovery.params,
                &mut cluster.message_queue.params,
            ] {
                for value in params.values_mut() {
                    *value = shellexpand::env(value)
                        .context("failed to expand provider parameter")?
                        .to_string();
                }
            }
        }
        Ok(())
    }
}

/// Convenience wrapper used by node bootstrap
pub fn load_settings(base_path: Option<&Path>) -> Result<HiveSettings> {
    HiveSettings::load(base_path)
}
