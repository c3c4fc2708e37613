use std::{ops::Deref, path::Path, sync::Arc};

use crate::moderation::{EscalationPolicy, FileLedger};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Moderation configuration document
pub const CONFIG_FILE: &str = "data/warden_config.yaml";
/// Offense ledger document
pub const LEDGER_FILE: &str = "data/offenses.yaml";

/// Moderation configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    // Minutes for the second-offense timeout
    pub timeout_short_minutes: u32,
    // Minutes for the third-offense timeout
    pub timeout_long_minutes: u32,
    // Channel for audit records; audit posting is disabled when unset
    pub audit_log_channel_id: Option<u64>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            timeout_short_minutes: 10,
            timeout_long_minutes: 60,
            audit_log_channel_id: None,
        }
    }
}

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Load configuration and the offense ledger from the data directory
    pub async fn load() -> Self {
        Self(Arc::new(DataInner::load().await))
    }

    /// Escalation policy built from the configured durations
    #[must_use]
    pub fn policy(&self) -> EscalationPolicy {
        EscalationPolicy::new(
            self.config.timeout_short_minutes,
            self.config.timeout_long_minutes,
        )
    }
}

/// Main centralized data structure for the bot
pub struct DataInner {
    /// Moderation configuration, read once at startup
    pub config: ModerationConfig,
    /// Persistent per-user offense counters
    pub ledger: Arc<FileLedger>,
}

impl DataInner {
    /// Load data from YAML files
    ///
    /// A missing or unreadable config file falls back to defaults; the
    /// ledger applies the same tolerance to its own document.
    pub async fn load() -> Self {
        let config = match tokio::fs::read_to_string(CONFIG_FILE).await {
            Ok(contents) => match serde_yaml::from_str::<ModerationConfig>(&contents) {
                Ok(config) => {
                    info!(path = CONFIG_FILE, "Moderation config loaded");
                    config
                }
                Err(e) => {
                    warn!(path = CONFIG_FILE, error = %e, "Corrupt moderation config, using defaults");
                    ModerationConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = CONFIG_FILE, "No moderation config on disk, using defaults");
                ModerationConfig::default()
            }
            Err(e) => {
                warn!(path = CONFIG_FILE, error = %e, "Failed to read moderation config, using defaults");
                ModerationConfig::default()
            }
        };

        let ledger = Arc::new(FileLedger::load(Path::new(LEDGER_FILE)).await);

        Self { config, ledger }
    }
}
