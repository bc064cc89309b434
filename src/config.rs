//! Environment configuration.
//!
//! Values come from the process environment; a `.env` file is honored when
//! present. Only the transport credential and the administrator identity are
//! required — everything else has a working default.

use std::path::PathBuf;

/// Runtime configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-transport credential. Also used as the shared secret the
    /// transport bridge must present on every request.
    pub transport_token: String,
    /// The one identity allowed into the moderation flow.
    pub admin_id: i64,
    /// Secondary geocoding provider credential. Absent key disables the
    /// secondary provider entirely.
    pub google_api_key: Option<String>,
    pub database_url: String,
    pub backup_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Assemble configuration from an arbitrary lookup (testable without
    /// touching the process environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let transport_token = required(&lookup, "TELEGRAM_TOKEN")?;
        let admin_raw = required(&lookup, "ADMIN_ID")?;
        let admin_id = admin_raw
            .parse()
            .map_err(|_| ConfigError::Invalid("ADMIN_ID", admin_raw.clone()))?;

        let google_api_key = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty());
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://bot_catalog.db".into());
        let backup_dir = lookup("BACKUP_DIR").unwrap_or_else(|| "backups".into()).into();

        Ok(Self {
            transport_token,
            admin_id,
            google_api_key,
            database_url,
            backup_dir,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map = env(pairs);
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            ("TELEGRAM_TOKEN", "123:abc"),
            ("ADMIN_ID", "42"),
            ("GOOGLE_API_KEY", "key"),
            ("DATABASE_URL", "sqlite://x.db"),
            ("BACKUP_DIR", "/var/backups"),
        ])
        .unwrap();

        assert_eq!(config.transport_token, "123:abc");
        assert_eq!(config.admin_id, 42);
        assert_eq!(config.google_api_key.as_deref(), Some("key"));
        assert_eq!(config.database_url, "sqlite://x.db");
        assert_eq!(config.backup_dir, Path::new("/var/backups"));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TELEGRAM_TOKEN", "t"), ("ADMIN_ID", "1")]).unwrap();
        assert!(config.google_api_key.is_none());
        assert_eq!(config.database_url, "sqlite://bot_catalog.db");
        assert_eq!(config.backup_dir, Path::new("backups"));
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[("ADMIN_ID", "1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TELEGRAM_TOKEN")));
    }

    #[test]
    fn test_bad_admin_id() {
        let err = load(&[("TELEGRAM_TOKEN", "t"), ("ADMIN_ID", "not-a-number")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("ADMIN_ID", _)));
    }

    #[test]
    fn test_blank_google_key_disables_secondary() {
        let config = load(&[
            ("TELEGRAM_TOKEN", "t"),
            ("ADMIN_ID", "1"),
            ("GOOGLE_API_KEY", "   "),
        ])
        .unwrap();
        assert!(config.google_api_key.is_none());
    }
}
