use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GrimoireConfig {
    pub bot: BotConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram bot token. Empty until configured; `serve` refuses to start
    /// without one.
    pub token: String,
    /// User ids allowed to talk to the bot. Everyone else gets a refusal.
    pub allowed_users: Vec<i64>,
    pub log_level: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Upper bound on simultaneously open SQLite connections. Callers beyond
    /// the bound queue.
    pub max_connections: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            allowed_users: Vec::new(),
            log_level: "info".into(),
            poll_timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_grimoire_dir()
            .join("journal.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            max_connections: 4,
        }
    }
}

/// Returns `~/.grimoire/`
pub fn default_grimoire_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".grimoire")
}

/// Returns the default config file path: `~/.grimoire/config.toml`
pub fn default_config_path() -> PathBuf {
    default_grimoire_dir().join("config.toml")
}

impl GrimoireConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GrimoireConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (GRIMOIRE_BOT_TOKEN,
    /// GRIMOIRE_ALLOWED_USERS, GRIMOIRE_DB, GRIMOIRE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GRIMOIRE_BOT_TOKEN") {
            self.bot.token = val;
        }
        if let Ok(val) = std::env::var("GRIMOIRE_ALLOWED_USERS") {
            let users: Vec<i64> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !users.is_empty() {
                self.bot.allowed_users = users;
            }
        }
        if let Ok(val) = std::env::var("GRIMOIRE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("GRIMOIRE_LOG_LEVEL") {
            self.bot.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GrimoireConfig::default();
        assert_eq!(config.bot.log_level, "info");
        assert_eq!(config.bot.poll_timeout_secs, 30);
        assert!(config.bot.token.is_empty());
        assert!(config.bot.allowed_users.is_empty());
        assert_eq!(config.storage.max_connections, 4);
        assert!(config.storage.db_path.ends_with("journal.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[bot]
token = "123:abc"
allowed_users = [111, 222]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"
"#;
        let config: GrimoireConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot.token, "123:abc");
        assert_eq!(config.bot.allowed_users, vec![111, 222]);
        assert_eq!(config.bot.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        // defaults still apply for unset fields
        assert_eq!(config.storage.max_connections, 4);
        assert_eq!(config.bot.poll_timeout_secs, 30);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GrimoireConfig::default();
        std::env::set_var("GRIMOIRE_BOT_TOKEN", "456:def");
        std::env::set_var("GRIMOIRE_ALLOWED_USERS", "7, 8,9");
        std::env::set_var("GRIMOIRE_DB", "/tmp/override.db");
        std::env::set_var("GRIMOIRE_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.bot.token, "456:def");
        assert_eq!(config.bot.allowed_users, vec![7, 8, 9]);
        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.bot.log_level, "trace");

        // Clean up
        std::env::remove_var("GRIMOIRE_BOT_TOKEN");
        std::env::remove_var("GRIMOIRE_ALLOWED_USERS");
        std::env::remove_var("GRIMOIRE_DB");
        std::env::remove_var("GRIMOIRE_LOG_LEVEL");
    }
}
