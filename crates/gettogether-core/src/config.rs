//! Synchronization configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Default capacity of every event bus channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 512;

/// Default number of messages requested per history page.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 32;

/// Raw timestamps below this value are taken to be seconds, not milliseconds.
pub const DEFAULT_SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "gettogether.db";

/// Tunables for the event bus and the synchronization controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Capacity of each event bus channel (oldest events drop past this).
    pub event_channel_capacity: usize,
    /// Messages requested from the engine per history page.
    pub history_page_size: u32,
    /// Raw event timestamps below this are converted from seconds.
    pub seconds_threshold: i64,
    /// Database file name.
    pub database_file: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            seconds_threshold: DEFAULT_SECONDS_THRESHOLD,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Fields absent from the file keep
    /// their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an invalid configuration.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.history_page_size == 0 {
            return Err(Error::Config(
                "history_page_size must be greater than zero".to_string(),
            ));
        }
        if self.seconds_threshold <= 0 {
            return Err(Error::Config(
                "seconds_threshold must be positive".to_string(),
            ));
        }
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("database_file must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`SyncConfig`].
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Creates a new builder populated with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Sets the history page size.
    #[must_use]
    pub const fn history_page_size(mut self, size: u32) -> Self {
        self.config.history_page_size = size;
        self
    }

    /// Sets the seconds/milliseconds threshold for raw timestamps.
    #[must_use]
    pub const fn seconds_threshold(mut self, threshold: i64) -> Self {
        self.config.seconds_threshold = threshold;
        self
    }

    /// Sets the database file name.
    #[must_use]
    pub fn database_file(mut self, file: impl Into<String>) -> Self {
        self.config.database_file = file.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SyncConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.seconds_threshold, 100_000_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = SyncConfig::builder()
            .event_channel_capacity(8)
            .history_page_size(10)
            .database_file("test.db")
            .build();
        assert_eq!(config.event_channel_capacity, 8);
        assert_eq!(config.history_page_size, 10);
        assert_eq!(config.database_file, "test.db");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = SyncConfig::builder().event_channel_capacity(0).build();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"history_page_size": 5}"#).unwrap();
        assert_eq!(config.history_page_size, 5);
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!(
            "gettogether-missing-{}.json",
            uuid::Uuid::new_v4()
        ));
        let config = SyncConfig::load(&path).await.unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "gettogether-config-{}.json",
            uuid::Uuid::new_v4()
        ));
        tokio::fs::write(&path, r#"{"event_channel_capacity": 64}"#)
            .await
            .unwrap();

        let config = SyncConfig::load(&path).await.unwrap();
        assert_eq!(config.event_channel_capacity, 64);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
