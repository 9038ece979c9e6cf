//! Application-level configuration loading: settlement rewards, defaults and timeouts.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PLYR_BACK_CONFIG_PATH";
/// Points credited to a player for a settled game.
const DEFAULT_REWARD_POINTS: u32 = 10;
/// Duration pre-filled in the self-report.
const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Upper bound on a settlement commit.
const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    reward_points: u32,
    default_duration_minutes: u32,
    commit_timeout_ms: u64,
    fixtures_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        reward_points = app_config.reward_points,
                        commit_timeout_ms = app_config.commit_timeout_ms,
                        "loaded settlement settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Points credited to a player when a settlement commits.
    pub fn reward_points(&self) -> u32 {
        self.reward_points
    }

    pub fn default_duration_minutes(&self) -> u32 {
        self.default_duration_minutes
    }

    /// Commit timeout; `0` in the config disables it.
    pub fn commit_timeout(&self) -> Option<Duration> {
        (self.commit_timeout_ms > 0).then(|| Duration::from_millis(self.commit_timeout_ms))
    }

    /// JSON file used to seed the in-memory store.
    pub fn fixtures_path(&self) -> Option<&Path> {
        self.fixtures_path.as_deref()
    }

    #[must_use]
    pub fn with_commit_timeout(self, timeout: Option<Duration>) -> Self {
        let commit_timeout_ms = timeout.map_or(0, |limit| limit.as_millis().max(1) as u64);
        Self {
            commit_timeout_ms,
            ..self
        }
    }

    #[must_use]
    pub fn with_reward_points(self, reward_points: u32) -> Self {
        Self {
            reward_points,
            ..self
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reward_points: DEFAULT_REWARD_POINTS,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            commit_timeout_ms: DEFAULT_COMMIT_TIMEOUT_MS,
            fixtures_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    reward_points: Option<u32>,
    #[serde(default)]
    default_duration_minutes: Option<u32>,
    #[serde(default)]
    commit_timeout_ms: Option<u64>,
    #[serde(default)]
    fixtures_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            reward_points: value.reward_points.unwrap_or(defaults.reward_points),
            default_duration_minutes: value
                .default_duration_minutes
                .unwrap_or(defaults.default_duration_minutes),
            commit_timeout_ms: value.commit_timeout_ms.unwrap_or(defaults.commit_timeout_ms),
            fixtures_path: value.fixtures_path.filter(|path| !path.as_os_str().is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(r#"{ "reward_points": 15 }"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.reward_points(), 15);
        assert_eq!(config.default_duration_minutes(), 60);
        assert_eq!(config.commit_timeout(), Some(Duration::from_secs(10)));
        assert!(config.fixtures_path().is_none());
    }

    #[test]
    fn zero_timeout_disables_the_limit() {
        let raw: RawConfig = serde_json::from_str(r#"{ "commit_timeout_ms": 0 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).commit_timeout(), None);
    }
}
