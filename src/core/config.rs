//! Application settings and their JSON persistence.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::alerts::AlertMask;
use super::scheduler::CycleConfig;

/// Settings supplied by the configuration boundary. The core re-reads
/// these into a [`CycleConfig`] at the start of each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the game's per-account preference tree.
    pub prefs_root: PathBuf,
    /// Client log files to tail, one per running game installation.
    /// Re-derived externally; an empty list just means no pattern alerts.
    #[serde(default)]
    pub client_logs: Vec<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub alert_mask: AlertMask,
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefs_root: default_prefs_root(),
            client_logs: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            alert_mask: AlertMask::default(),
        }
    }
}

impl Settings {
    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            prefs_root: self.prefs_root.clone(),
            client_logs: self.client_logs.clone(),
            alert_mask: self.alert_mask,
        }
    }
}

/// Where the game keeps its preference tree by default. The user will
/// likely override this for non-standard installs.
fn default_prefs_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Funcom")
        .join("SWL")
        .join("Prefs")
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    /// Load settings, falling back to defaults when the file is absent or
    /// unreadable.
    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            if let Ok(content) = fs::read_to_string(&self.config_path) {
                match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => {
                        log::warn!("Ignoring malformed settings file: {}", e);
                    }
                }
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}
