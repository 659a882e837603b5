//! Layered configuration for the onboarding core.
//!
//! Priority: CLI / env var  >  `{data_dir}/config.toml`  >  built-in default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_RECENT_EVENT_DAYS: i64 = 7;
const DEFAULT_RECENT_EVENT_LIMIT: i64 = 10;

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,onboardd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
    /// Hex-encoded 32-byte vault key. Omit to use the generated
    /// `{data_dir}/vault.key` file.
    vault_key: Option<String>,
    /// Dashboard recent-activity window in days (default: 7).
    recent_event_days: Option<i64>,
    /// Maximum rows returned by the recent-activity feed (default: 10).
    recent_event_limit: Option<i64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnboardConfig {
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" | "json".
    pub log_format: String,
    /// Hex-encoded key override (ONBOARDD_VAULT_KEY env var or config.toml).
    /// None means load-or-generate `{data_dir}/vault.key`.
    pub vault_key: Option<String>,
    pub recent_event_days: i64,
    pub recent_event_limit: i64,
}

impl OnboardConfig {
    /// Build config from CLI/env args + optional TOML file.
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("ONBOARDD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let vault_key = std::env::var("ONBOARDD_VAULT_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.vault_key);

        let recent_event_days = toml
            .recent_event_days
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_RECENT_EVENT_DAYS);
        let recent_event_limit = toml
            .recent_event_limit
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RECENT_EVENT_LIMIT);

        Self {
            data_dir,
            log,
            log_format,
            vault_key,
            recent_event_days,
            recent_event_limit,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("onboardd");
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join("onboardd");
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("onboardd");
        }
    }

    #[cfg(windows)]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("onboardd");
        }
    }

    PathBuf::from(".onboardd")
}
