//! Process configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use clap::{Parser, ValueEnum};
use gantry_core::context::parse_offset;
use gantry_core::DEFAULT_MAX_DEPTH;

use crate::network::NetworkConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging settings handed to [`crate::logging::init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

/// Settings of the mapping service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    /// Recursion bound for nested schemas and condition trees.
    pub max_depth: usize,
    /// Timezone applied when a request does not name one.
    pub default_timezone: Option<FixedOffset>,
    /// Directory holding `*.json` schema documents and `messages/<lang>.json`.
    pub schema_dir: Option<PathBuf>,
    /// Language used when a request's language has no message.
    pub default_language: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_timezone: None,
            schema_dir: None,
            default_language: "en".to_string(),
        }
    }
}

fn parse_timezone(text: &str) -> Result<FixedOffset, String> {
    parse_offset(text).ok_or_else(|| format!("invalid UTC offset `{text}`, expected e.g. +02:00"))
}

/// Top-level server configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gantry-server",
    version,
    about = "Schema-driven argument binding and filter compilation over HTTP"
)]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "GANTRY_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    #[arg(long, env = "GANTRY_PORT", default_value_t = 8080)]
    pub port: u16,
    /// Default timezone for time fields, as a UTC offset.
    #[arg(long, env = "GANTRY_TIMEZONE", value_parser = parse_timezone)]
    pub timezone: Option<FixedOffset>,
    #[arg(long, env = "GANTRY_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
    /// Directory of schema documents loaded at startup.
    #[arg(long, env = "GANTRY_SCHEMA_DIR")]
    pub schema_dir: Option<PathBuf>,
    #[arg(long, env = "GANTRY_LANGUAGE", default_value = "en")]
    pub language: String,
    /// Comma-separated allowed CORS origins; `*` allows any.
    #[arg(long, env = "GANTRY_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,
    #[arg(long, env = "GANTRY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
    #[arg(long, env = "GANTRY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    /// Log filter directives; `RUST_LOG` takes precedence.
    #[arg(long = "log", env = "GANTRY_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timezone: None,
            max_depth: DEFAULT_MAX_DEPTH,
            schema_dir: None,
            language: "en".to_string(),
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            log_format: LogFormat::Pretty,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn mapping(&self) -> MappingConfig {
        MappingConfig {
            max_depth: self.max_depth,
            default_timezone: self.timezone,
            schema_dir: self.schema_dir.clone(),
            default_language: self.language.clone(),
        }
    }

    #[must_use]
    pub fn log(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            filter: self.log_filter.clone(),
        }
    }
}
