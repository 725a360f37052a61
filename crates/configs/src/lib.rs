//! # configs
//!
//! Layered settings: built-in defaults, then `config/default.toml` (optional),
//! then `config/local.toml` (optional), then `THREADS__`-prefixed environment
//! variables (`THREADS__AUTH__TOKEN_SECRET`, `THREADS__THREADS__MAX_BODY_CHARS`,
//! ...). A `.env` file is read first when present.

use config::{Config, Environment, File};
use domains::TombstonePolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub threads: ThreadSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres URL. Without it the server runs on the in-memory store.
    #[serde(default, deserialize_with = "optional_secret")]
    pub url: Option<SecretString>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the session service.
    #[serde(deserialize_with = "secret")]
    pub token_secret: SecretString,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ThreadSettings {
    pub max_body_chars: usize,
    pub max_title_chars: usize,
    pub tombstones: TombstonePolicy,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            max_body_chars: 10_000,
            max_title_chars: 200,
            tombstones: TombstonePolicy::Prune,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info".to_string(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

/// Minimum HS256 secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

fn secret<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

fn optional_secret<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from))
}

impl Settings {
    /// Loads `.env`, the optional config files and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("THREADS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    /// Deserializes and validates an already-built `Config`.
    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.auth.token_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(SettingsError::Invalid {
                key: "auth.token_secret",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        if self.threads.max_body_chars == 0 || self.threads.max_title_chars == 0 {
            return Err(SettingsError::Invalid {
                key: "threads",
                reason: "character limits must be positive".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(SettingsError::Invalid {
                key: "database.max_connections",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn build(overrides: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Settings::from_config(builder.build()?)
    }

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let settings = build(&[("auth.token_secret", SECRET)]).unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:8080");
        assert_eq!(settings.threads.max_body_chars, 10_000);
        assert_eq!(settings.threads.tombstones, TombstonePolicy::Prune);
        assert!(!settings.logging.json);
        assert_eq!(settings.database.max_connections, 10);
    }

    #[test]
    fn tombstone_policy_parses_lowercase() {
        let settings = build(&[
            ("auth.token_secret", SECRET),
            ("threads.tombstones", "placeholder"),
            ("threads.max_body_chars", "500"),
        ])
        .unwrap();
        assert_eq!(settings.threads.tombstones, TombstonePolicy::Placeholder);
        assert_eq!(settings.threads.max_body_chars, 500);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = build(&[("auth.token_secret", "short")]).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "auth.token_secret", .. }));
    }

    #[test]
    fn missing_auth_section_fails_to_load() {
        assert!(matches!(build(&[]), Err(SettingsError::Load(_))));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = build(&[("auth.token_secret", SECRET), ("database.url", "postgres://u:p@h/db")]).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains(SECRET));
        assert!(!printed.contains("u:p@h"));
    }
}
