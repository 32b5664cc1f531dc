use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Upper bound accepted for either scroller's debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Scroll coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrollConfig {
    /// Main transcript scroller delay while streaming.
    pub transcript_debounce_ms: u64,
    /// Reasoning sub-panel scroller delay while streaming.
    pub reasoning_debounce_ms: u64,
    /// Instant scroll-to-end when resuming a persisted conversation.
    pub initial_scroll: bool,
}

impl ScrollConfig {
    /// Debounce applied to transcript scrolls while streaming.
    pub fn transcript_debounce(&self) -> Duration {
        Duration::from_millis(self.transcript_debounce_ms)
    }

    /// Debounce applied to reasoning-panel scrolls while streaming.
    pub fn reasoning_debounce(&self) -> Duration {
        Duration::from_millis(self.reasoning_debounce_ms)
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self { transcript_debounce_ms: 100, reasoning_debounce_ms: 150, initial_scroll: true }
    }
}

/// Retry/regenerate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Ask the persistence layer to purge the discarded tail before regenerating.
    pub delete_persisted: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { delete_persisted: true }
    }
}

/// File logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self { enabled: false, level: "debug".to_string() }
    }
}

/// Privacy controls for turn content written to logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrivacyLoggingConfig {
    /// Include turn text in trace logs at all.
    pub log_content: bool,
    /// Maximum characters kept when content is logged.
    pub truncate_length: usize,
}

impl Default for PrivacyLoggingConfig {
    fn default() -> Self {
        Self { log_content: false, truncate_length: 200 }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: FileLoggingConfig,
    pub privacy: PrivacyLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
            file: FileLoggingConfig::default(),
            privacy: PrivacyLoggingConfig::default(),
        }
    }
}

/// Root configuration structure for threadline.toml.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scroll: ScrollConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| crate::Error::Config(ConfigError::from(e).to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        use crate::Error;

        for (field, value) in [
            ("scroll.transcript_debounce_ms", self.scroll.transcript_debounce_ms),
            ("scroll.reasoning_debounce_ms", self.scroll.reasoning_debounce_ms),
        ] {
            if value > MAX_DEBOUNCE_MS {
                return Err(Error::Config(
                    ConfigError::DebounceOutOfRange { field: field.to_string(), value }.to_string(),
                ));
            }
        }

        if self.logging.format.parse::<crate::logging::LogFormat>().is_err() {
            return Err(Error::Config(ConfigError::InvalidLogFormat(self.logging.format.clone()).to_string()));
        }

        Ok(())
    }

    /// Get example configuration (as a string).
    pub fn example() -> &'static str {
        r#"# Threadline Configuration Example
# Every section and field is optional.

[scroll]
# Delay before following the transcript to its end while a response streams
transcript_debounce_ms = 100
# Delay before following the reasoning panel while a response streams
reasoning_debounce_ms = 150
# Jump to the end once when a saved conversation is reopened
initial_scroll = true

[retry]
# Purge persisted turns after the last user turn before regenerating
delete_persisted = true

[logging]
# Level for stderr output (overridden by THREADLINE_LOG / RUST_LOG)
level = "warn"
# "pretty", "json", or "compact"
format = "pretty"

[logging.file]
enabled = false
level = "debug"

[logging.privacy]
# Write turn text into trace logs
log_content = false
truncate_length = 200
"#
    }
}

/// Configuration-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Debounce window too large
    #[error("{field} must be at most 10000 ms, got {value}")]
    DebounceOutOfRange { field: String, value: u64 },

    /// Unknown log format
    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scroll.transcript_debounce(), Duration::from_millis(100));
        assert_eq!(config.scroll.reasoning_debounce(), Duration::from_millis(150));
        assert!(config.scroll.initial_scroll);
        assert!(config.retry.delete_persisted);
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.file.enabled);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_example_parses() {
        let config = Config::from_toml_str(Config::example()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml_str("[scroll]\nreasoning_debounce_ms = 300\n").unwrap();
        assert_eq!(config.scroll.reasoning_debounce_ms, 300);
        assert_eq!(config.scroll.transcript_debounce_ms, 100);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Config::from_toml_str("[scroll]\nspeed = 3\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_debounce_out_of_range() {
        let result = Config::from_toml_str("[scroll]\ntranscript_debounce_ms = 60000\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("scroll.transcript_debounce_ms"));
        assert!(err.contains("60000"));
    }

    #[test]
    fn test_invalid_log_format() {
        let result = Config::from_toml_str("[logging]\nformat = \"xml\"\n");
        assert!(result.unwrap_err().to_string().contains("invalid log format: xml"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\ndelete_persisted = false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.retry.delete_persisted);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
