/// Config schema for the motifini daemon.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Seconds between repeat notifications when no `delay` rule applies.
pub const DEFAULT_DELAY_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotifiniConfig {
    /// Subscriber state JSON. An empty path keeps state in memory only.
    pub state_file: PathBuf,
    /// Scratch directory for captured pictures and videos.
    pub temp_dir: PathBuf,
    /// API prefixes that receive notifications. Empty, `all` or `any`
    /// enables every API.
    pub enabled_apis: Vec<String>,
    /// Camera names known to the chat commands.
    pub cameras: Vec<String>,
    pub default_delay_secs: u64,
    pub console: ConsoleConfig,
}

impl Default for MotifiniConfig {
    fn default() -> Self {
        Self {
            state_file: crate::loader::data_dir()
                .map(|d| d.join("subscribers.json"))
                .unwrap_or_else(|| PathBuf::from("subscribers.json")),
            temp_dir: std::env::temp_dir(),
            enabled_apis: Vec::new(),
            cameras: Vec::new(),
            default_delay_secs: DEFAULT_DELAY_SECS,
            console: ConsoleConfig::default(),
        }
    }
}

/// The stdin/stdout channel used by `motifini run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Contact name console messages are attributed to.
    pub contact: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            contact: "local".into(),
        }
    }
}
