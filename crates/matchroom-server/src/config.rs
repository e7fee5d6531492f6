//! Server configuration: TOML file, then environment, then CLI flags.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use matchroom::prelude::LobbyConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `server.bind_address`.
pub const ENV_BIND: &str = "MATCHROOM_BIND";
/// Environment variable that overrides `lobby.max_players`.
pub const ENV_MAX_PLAYERS: &str = "MATCHROOM_MAX_PLAYERS";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Everything the binary can be configured with.
///
/// Every section has defaults, so a file only needs the keys it changes:
///
/// ```toml
/// [server]
/// bind_address = "0.0.0.0:7777"
///
/// [lobby]
/// max_players = 8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub lobby: LobbyConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    /// Seconds a new connection has to send its handshake.
    pub handshake_timeout_secs: u64,
    /// Seconds a ready connection may stay silent.
    pub idle_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7777".to_string(),
            handshake_timeout_secs: 5,
            idle_timeout_secs: 15,
        }
    }
}

impl ServerSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Applies `MATCHROOM_*` overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind_address = bind;
        }
        if let Some(raw) = lookup(ENV_MAX_PLAYERS) {
            self.lobby.max_players = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_PLAYERS} must be a number, got {raw:?}"))?;
        }
        Ok(())
    }

    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {:?}", self.server.bind_address))?;

        if self.server.handshake_timeout_secs == 0 || self.server.idle_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }

        self.lobby.validate()?;

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "invalid log level {:?}, expected one of {LOG_LEVELS:?}",
                self.logging.level
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:7777");
        assert_eq!(config.server.idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.lobby.max_players, 40);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nbind_address = \"0.0.0.0:9100\"\n\n[lobby]\nmax_players = 8\nnotify_rejections = false"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:9100");
        assert_eq!(config.server.handshake_timeout_secs, 5);
        assert_eq!(config.lobby.max_players, 8);
        assert!(!config.lobby.notify_rejections);
        assert!(config.lobby.broadcast_match_list);
    }

    #[test]
    fn test_load_malformed_file_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[lobby]\nmax_players = \"lots\"").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();

        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_apply_env_overrides_bind_and_players() {
        let mut config = AppConfig::default();

        config
            .apply_env(env(&[(ENV_BIND, "0.0.0.0:1234"), (ENV_MAX_PLAYERS, " 12 ")]))
            .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:1234");
        assert_eq!(config.lobby.max_players, 12);
    }

    #[test]
    fn test_apply_env_rejects_non_numeric_players() {
        let mut config = AppConfig::default();
        let result = config.apply_env(env(&[(ENV_MAX_PLAYERS, "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not an address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.lobby.max_players = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
