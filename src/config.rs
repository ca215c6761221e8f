//! Configuration types for ledger-import

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// How events reach the consumer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Forward every event as soon as its row is transformed
    ///
    /// A run that fails on a malformed row may already have delivered the
    /// events of earlier rows. Consumers must discard them when the run fails.
    #[default]
    Streaming,
    /// Hold back all events until both files transformed without error
    ///
    /// All-or-nothing delivery at the cost of keeping one run's events in memory.
    Buffered,
}

/// Importer configuration shared by all runs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Parent directory of the per-run workspaces
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Overall timeout of the archive request, body included (default: 300 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent sent with the request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the event channel (default: 1024)
    ///
    /// A consumer that falls this many events behind pauses row production.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Event delivery mode
    #[serde(default)]
    pub delivery: DeliveryMode,

    /// Fail when the archive contains members other than SK.csv and RU.csv
    #[serde(default)]
    pub strict_members: bool,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            fetch_timeout: default_fetch_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            event_buffer: default_event_buffer(),
            delivery: DeliveryMode::default(),
            strict_members: false,
        }
    }
}

impl ImporterConfig {
    /// Check settings that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.temp_dir.as_os_str().is_empty() {
            return Err(Error::config("temp_dir must not be empty", "temp_dir"));
        }
        if self.event_buffer == 0 {
            return Err(Error::config(
                "event_buffer must be at least 1",
                "event_buffer",
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::config(
                "fetch_timeout must be greater than zero",
                "fetch_timeout",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config(
                "connect_timeout must be greater than zero",
                "connect_timeout",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::config("user_agent must not be empty", "user_agent"));
        }
        Ok(())
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("ledger-import")
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("ledger-import/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_event_buffer() -> usize {
    1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
