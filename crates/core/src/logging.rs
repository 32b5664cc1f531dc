//! Tracing subscriber setup for threadline binaries.
//!
//! Stderr always gets a formatted layer filtered by `THREADLINE_LOG`, then
//! `RUST_LOG`, then `[logging] level`. When `[logging.file] enabled = true`
//! a daily-rotated JSON log is written as well, filtered by its own level.
//!
//! | variable | effect |
//! | --- | --- |
//! | `THREADLINE_LOG` | filter directives for stderr |
//! | `THREADLINE_LOG_FORMAT` | `pretty`, `json` or `compact`; overrides TTY detection |
//! | `THREADLINE_LOG_DIR` | file log directory, default `~/.threadline/logs` |

use crate::Error;
use crate::config::{FileLoggingConfig, LoggingConfig as LoggingSection, PrivacyLoggingConfig};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "threadline.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Stderr output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, colored
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// One line per event, no color
    Compact,
}

impl LogFormat {
    pub const NAMES: [&'static str; 3] = ["pretty", "json", "compact"];
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config(format!(
                "unknown log format '{}', expected one of {}",
                other,
                LogFormat::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        };
        f.write_str(name)
    }
}

/// How much turn text may reach a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyConfig {
    pub log_content: bool,
    pub truncate_length: usize,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        PrivacyLoggingConfig::default().into()
    }
}

impl From<PrivacyLoggingConfig> for PrivacyConfig {
    fn from(section: PrivacyLoggingConfig) -> Self {
        Self { log_content: section.log_content, truncate_length: section.truncate_length }
    }
}

/// Resolved `[logging]` settings handed to [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// `None` when file logging is off.
    pub file: Option<FileLoggingConfig>,
    pub privacy: PrivacyConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingSection::default().into()
    }
}

impl From<LoggingSection> for LoggingConfig {
    /// Unknown format names fall back to pretty; [`crate::Config`] rejects
    /// them at load time.
    fn from(section: LoggingSection) -> Self {
        Self {
            level: section.level,
            format: section.format.parse().unwrap_or_default(),
            file: section.file.enabled.then_some(section.file),
            privacy: section.privacy.into(),
        }
    }
}

impl LoggingConfig {
    /// Override the stderr level, e.g. for `--verbose`.
    pub fn with_level(self, level: impl Into<String>) -> Self {
        Self { level: level.into(), ..self }
    }

    /// Override the configured stderr format.
    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }
}

/// Stderr filter directives: `THREADLINE_LOG`, then `RUST_LOG`, then `fallback`.
fn resolve_filter(var: impl Fn(&str) -> Option<String>, fallback: &str) -> String {
    var("THREADLINE_LOG").or_else(|| var("RUST_LOG")).unwrap_or_else(|| fallback.to_string())
}

/// An explicit `THREADLINE_LOG_FORMAT` wins; otherwise non-terminals get compact.
fn resolve_format(var: impl Fn(&str) -> Option<String>, configured: LogFormat, is_tty: bool) -> LogFormat {
    match var("THREADLINE_LOG_FORMAT").and_then(|name| name.parse().ok()) {
        Some(format) => format,
        None if is_tty => configured,
        None => LogFormat::Compact,
    }
}

fn resolve_log_dir(var: impl Fn(&str) -> Option<String>) -> Result<PathBuf, Error> {
    if let Some(dir) = var("THREADLINE_LOG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    var("HOME")
        .or_else(|| var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".threadline").join("logs"))
        .ok_or_else(|| Error::Config("no home directory for file logs; set THREADLINE_LOG_DIR".to_string()))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn filter(directives: &str, fallback: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().with_ansi(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is on. Dropping it
/// flushes and stops the writer, so hold it until exit.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<Option<WorkerGuard>, Error> {
    let config = config.unwrap_or_default();
    let format = resolve_format(env_var, config.format, atty::is(atty::Stream::Stderr));
    let directives = resolve_filter(env_var, &config.level);

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(format).with_filter(filter(&directives, &config.level)).boxed()];
    let mut guard = None;

    if let Some(file) = &config.file {
        let dir = resolve_log_dir(env_var)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Config(format!("cannot create log directory {}: {}", dir.display(), e)))?;

        let (writer, file_guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX));
        let file_layer = tracing_subscriber::fmt::layer().json().with_writer(writer).with_ansi(false);
        layers.push(file_layer.with_filter(filter(&file.level, "debug")).boxed());
        guard = Some(file_guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| Error::Config(format!("tracing subscriber already installed: {}", e)))?;

    tracing::debug!(%format, filter = %directives, file = config.file.is_some(), "logging initialized");
    Ok(guard)
}

/// Turn text as it may appear in a log line.
pub fn redact_content(content: &str, privacy: &PrivacyConfig) -> String {
    let total = content.chars().count();
    if !privacy.log_content {
        return format!("[REDACTED {} chars]", total);
    }

    match content.char_indices().nth(privacy.truncate_length) {
        Some((cut, _)) => format!("{}... ({} total chars)", &content[..cut], total),
        None => content.to_string(),
    }
}
