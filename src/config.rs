//! Gateway configuration.
//!
//! Loads from `./scoutgate.toml` (or `$SCOUTGATE_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Every input the gateway reads from its environment is a named field here —
//! there is no ambient state and no hidden fallback URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default engine base URL (local development engine).
const DEFAULT_BACKEND_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default outbound request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default service-credential validity window in seconds.
const DEFAULT_CREDENTIAL_TTL_SECS: u64 = 300;

/// Default outreach status poll interval in seconds.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default pause-warning threshold in seconds (two hours).
const DEFAULT_PAUSE_WARNING_SECS: u64 = 7_200;

/// Gateway configuration, constructed once and passed into each component.
///
/// Precedence: env vars > `scoutgate.toml` > defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base URL of the outreach engine.
    pub backend_base_url: String,
    /// Shared internal-probe secret authenticating server-to-server calls.
    ///
    /// Absence is a configuration error at mint time, never an upstream one.
    pub probe_key: Option<String>,
    /// Outbound request timeout in seconds.
    pub request_timeout_secs: u64,
    /// How long a minted service credential stays valid, in seconds.
    pub credential_ttl_secs: u64,
    /// How often callers should poll `GET /api/outreach/status`, in seconds.
    pub status_poll_interval_secs: u64,
    /// How long outreach may stay paused before the watchdog warns, in seconds.
    pub pause_warning_threshold_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_BASE_URL.to_owned(),
            probe_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_ttl_secs: DEFAULT_CREDENTIAL_TTL_SECS,
            status_poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            pause_warning_threshold_secs: DEFAULT_PAUSE_WARNING_SECS,
        }
    }
}

impl GateConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$SCOUTGATE_CONFIG_PATH` or `./scoutgate.toml`.
    /// A missing file is not an error; the defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (injected for testability).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is unreadable or invalid.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = Self::config_path_with(&env);
        let mut config = Self::load_from_path(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: GateConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file found, using defaults");
                Ok(GateConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config file path: `$SCOUTGATE_CONFIG_PATH`, then `./scoutgate.toml`.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("SCOUTGATE_CONFIG_PATH")
            .map_or_else(|| PathBuf::from("scoutgate.toml"), PathBuf::from)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in
    /// tests). Invalid numeric values are ignored with a warning rather than
    /// aborting startup.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("SCOUTGATE_BACKEND_URL") {
            self.backend_base_url = v;
        }
        if let Some(v) = env("SCOUTGATE_PROBE_KEY") {
            self.probe_key = Some(v);
        }

        for (var, field) in [
            ("SCOUTGATE_TIMEOUT_SECS", &mut self.request_timeout_secs),
            ("SCOUTGATE_CREDENTIAL_TTL_SECS", &mut self.credential_ttl_secs),
            (
                "SCOUTGATE_POLL_INTERVAL_SECS",
                &mut self.status_poll_interval_secs,
            ),
            (
                "SCOUTGATE_PAUSE_WARNING_SECS",
                &mut self.pause_warning_threshold_secs,
            ),
        ] {
            if let Some(v) = env(var) {
                match v.parse() {
                    Ok(n) => *field = n,
                    Err(_) => tracing::warn!(
                        var,
                        value = %v,
                        "ignoring invalid env override"
                    ),
                }
            }
        }
    }

    /// Outbound request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Status poll interval as a [`Duration`].
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    /// Service-credential validity window as a [`chrono::Duration`].
    pub fn credential_ttl(&self) -> chrono::Duration {
        secs_to_chrono(self.credential_ttl_secs)
    }

    /// Pause-warning threshold as a [`chrono::Duration`].
    pub fn pause_warning_threshold(&self) -> chrono::Duration {
        secs_to_chrono(self.pause_warning_threshold_secs)
    }
}

/// Convert a seconds knob to a `chrono::Duration`, saturating on overflow.
fn secs_to_chrono(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
