use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How `get_post` produces the projection it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Return the stored like counter and reply snapshot as written
    Stored,
    /// Derive both from the fact rows on every read
    Recompute,
}

impl ReadMode {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stored" => Ok(ReadMode::Stored),
            "recompute" => Ok(ReadMode::Recompute),
            other => anyhow::bail!("Unknown FEED_READ_MODE '{}': expected stored or recompute", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub read_mode: ReadMode,
    /// Deadline for one write scope; `None` waits indefinitely
    pub write_timeout: Option<Duration>,
    pub max_body_len: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::Stored,
            write_timeout: Some(Duration::from_millis(5000)),
            max_body_len: 280,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let write_timeout_ms: u64 = lookup("FEED_WRITE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);
        let read_mode = match lookup("FEED_READ_MODE") {
            Some(value) => ReadMode::parse(&value)?,
            None => ReadMode::Stored,
        };

        Ok(Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite:data/social_feed.db".to_string()),
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8),
            },
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3000),
            },
            feed: FeedConfig {
                read_mode,
                write_timeout: (write_timeout_ms > 0)
                    .then(|| Duration::from_millis(write_timeout_ms)),
                max_body_len: lookup("FEED_MAX_BODY_LEN")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(280),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
