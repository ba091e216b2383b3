use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use crate::transport::ReconnectPolicy;

pub const SETTINGS_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub server_url: String,
    pub reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub reconnect_delay_max_ms: u64,
    pub randomization_factor: f64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            reconnect: true,
            reconnect_delay_ms: 1000,
            reconnect_delay_max_ms: 5000,
            randomization_factor: 0.5,
        }
    }
}

impl DashboardSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect,
            initial_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_delay_max_ms.max(self.reconnect_delay_ms)),
            randomization_factor: self.randomization_factor.clamp(0.0, 1.0),
        }
    }
}

/// Defaults, then `dashboard.toml` in the working directory, then environment.
pub fn load_settings() -> DashboardSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> DashboardSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match parse_settings(&raw) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %format!("{error:#}"), "ignoring unreadable settings file");
                DashboardSettings::default()
            }
        },
        Err(_) => DashboardSettings::default(),
    };

    if let Some(v) = env("PEDAL_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__RECONNECT") {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => settings.reconnect = true,
            "0" | "false" | "no" | "off" => settings.reconnect = false,
            _ => tracing::warn!(value = %v, "ignoring invalid APP__RECONNECT"),
        }
    }

    if let Some(v) = env("APP__RECONNECT_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_delay_ms = parsed;
        }
    }
    if let Some(v) = env("APP__RECONNECT_DELAY_MAX_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_delay_max_ms = parsed;
        }
    }

    settings
}

pub fn parse_settings(raw: &str) -> anyhow::Result<DashboardSettings> {
    toml::from_str::<DashboardSettings>(raw).context("failed to parse dashboard settings")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
