//! Configuration and credentials.
//!
//! Configuration is a JSON file read once at startup.  SMTP credentials are
//! never part of it: they come from `SMTP_USERNAME` / `SMTP_PASSWORD` in the
//! process environment (a `.env` file is loaded into the environment by
//! `main` beforehand).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "FEED_DIGEST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const USERNAME_ENV: &str = "SMTP_USERNAME";
const PASSWORD_ENV: &str = "SMTP_PASSWORD";

fn default_ledger_path() -> PathBuf {
    PathBuf::from("sent_items.json")
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub from_email: String,
    pub to_email: String,
    pub feed_urls: Vec<String>,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Upper bound on simultaneous feed fetches; defaults to one per source.
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

impl Config {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    #[cfg(test)]
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, Path::new("<inline>"))
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp_server.trim().is_empty() {
            return Err(ConfigError::Empty("smtp_server"));
        }
        if self.feed_urls.is_empty() {
            return Err(ConfigError::Empty("feed_urls"));
        }
        // A zero timeout fails every fetch, which would look like a quiet run.
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch_timeout_secs"));
        }
        if self.send_timeout_secs == 0 {
            return Err(ConfigError::Zero("send_timeout_secs"));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrent_fetches
            .unwrap_or(self.feed_urls.len())
            .max(1)
    }
}

/// SMTP login, handed to the notifier and nothing else.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup.  Empty values count
    /// as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };
        Ok(Self {
            username: get(USERNAME_ENV)?,
            password: get(PASSWORD_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
