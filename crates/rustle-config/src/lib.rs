//! Configuration for Rustle.
//!
//! Settings are read from TOML. Every section is optional and falls back to its defaults, so an
//! empty file is a valid configuration:
//!
//! ```toml
//! [logging]
//! level = "info"
//! json = false
//!
//! [refactor.move]
//! allow_public_api_changes = true
//! make_public_within_crate = false
//! keep_existing_style = true
//! optimize_imports = true
//! ```

use std::path::Path;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RustleConfig {
    pub logging: LoggingConfig,
    pub refactor: RefactorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in when set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefactorConfig {
    #[serde(rename = "move")]
    pub move_items: MoveConfig,
}

/// Knobs for the move refactoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoveConfig {
    /// Allow visibility fixes that make an item `pub`. When disabled, conflicts that would need
    /// a `pub` item are reported without a fix; `pub(crate)` increases are still offered.
    pub allow_public_api_changes: bool,
    /// Prefer `pub(crate)` over `pub` when every reference stays within the item's crate.
    pub make_public_within_crate: bool,
    /// Rewrite a path by keeping as many trailing segments as it had and importing the rest.
    /// When disabled, paths are always replaced by their full new form.
    pub keep_existing_style: bool,
    /// Remove duplicate `use` items in files touched by the move.
    pub optimize_imports: bool,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            allow_public_api_changes: true,
            make_public_within_crate: false,
            keep_existing_style: true,
            optimize_imports: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet; keep just the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl RustleConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs a global `tracing` subscriber for `config`.
///
/// Safe to call multiple times; only the first call installs a subscriber, and it does nothing
/// if the host already installed one.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let layer: Box<dyn Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else if cfg!(debug_assertions) {
            // Keeps `cargo test` output captured.
            tracing_subscriber::fmt::layer()
                .with_writer(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives_accept_synonyms_and_casing() {
        assert_eq!(LoggingConfig::normalize_level_directives(" WARNING "), "warn");
        assert_eq!(LoggingConfig::normalize_level_directives("Debug"), "debug");
        assert_eq!(LoggingConfig::normalize_level_directives(""), "info");
        assert_eq!(
            LoggingConfig::normalize_level_directives("rustle_refactor=trace"),
            "rustle_refactor=trace"
        );
    }

    #[test]
    fn init_tracing_can_run_twice() {
        let config = LoggingConfig::default();
        init_tracing(&config);
        init_tracing(&config);
        tracing::debug!("still alive");
    }
}
