use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RelocationError, Result};

/// Top-level configuration for the relocation planner.
///
/// Loaded from `~/.relocation/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelocationConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

impl RelocationConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelocationConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RelocationError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Data directory with a leading `~` expanded against `$HOME`.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Full path of the SQLite database holding persisted plan state.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.db_file)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the plan database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.relocation/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name inside `general.data_dir`.
    pub db_file: String,
    /// Prefix of every persisted key.
    pub key_namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "timeline.db".to_string(),
            key_namespace: "voice-relocation".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn selected_services_key(&self) -> String {
        format!("{}:selected-services", self.key_namespace)
    }

    pub fn timeline_tasks_key(&self) -> String {
        format!("{}:timeline-tasks", self.key_namespace)
    }

    pub fn relocation_profile_key(&self) -> String {
        format!("{}:relocation-profile", self.key_namespace)
    }
}

/// Realtime voice session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Model requested when minting a session credential.
    pub model: String,
    /// Overrides the built-in session instructions when set.
    pub instructions: Option<String>,
    /// Sent with `response.create` after every tool output.
    pub follow_up_instructions: String,
    /// Upper bound on a single tool handler.
    pub tool_timeout_secs: u64,
    /// Upper bound on credential fetch plus transport negotiation.
    pub connect_timeout_secs: u64,
    /// Upper bound on a housing listing search.
    pub housing_timeout_secs: u64,
    /// Listings returned to the agent per search.
    pub max_housing_results: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-realtime-preview".to_string(),
            instructions: None,
            follow_up_instructions:
                "Provide a concise spoken update and end with a next-step question.".to_string(),
            tool_timeout_secs: 30,
            connect_timeout_secs: 15,
            housing_timeout_secs: 20,
            max_housing_results: 5,
        }
    }
}

/// Timeline store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Capacity of the change-notification channel.
    pub event_buffer: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { event_buffer: 256 }
    }
}
