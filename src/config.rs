//! Engine and logging configuration, read from JSON.
//!
//! ```
//! use polyglot::config::ExchangeConfig;
//!
//! let config = ExchangeConfig::from_json_str(r#"{ "max_eval_depth": 8, "journal": true }"#).unwrap();
//! assert_eq!(config.max_eval_depth, 8);
//! assert_eq!(config.log.level, "info");
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::runtime::builder::DEFAULT_MAX_EVAL_DEPTH;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config")]
    Parse(#[from] serde_json::Error),

    #[error("invalid log level `{0}`")]
    InvalidLevel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    /// Directory that relative source paths are resolved from.
    pub root: Option<PathBuf>,
    pub max_eval_depth: usize,
    /// Keep a journal of exchanges for diagnostics.
    pub journal: bool,
    /// Extra file extensions per language id.
    pub languages: Vec<LanguageConfig>,
    pub log: LogConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            root: None,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            journal: false,
            languages: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl ExchangeConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    pub id: String,
    pub extensions: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default level: "silent", "error", "warn", "info", "debug" or "trace".
    pub level: String,
    pub format: LogFormat,
    /// Level overrides keyed by target, e.g. `"polyglot::registry"`.
    pub targets: BTreeMap<String, String>,
    /// Also append log output to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::default(),
            targets: BTreeMap::new(),
            file: None,
        }
    }
}

impl LogConfig {
    pub fn global_level(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.level)
    }

    /// The level for `target`, falling back to the global level.
    pub fn level_for(&self, target: &str) -> Result<LevelFilter, ConfigError> {
        match self.targets.get(target) {
            Some(level) => parse_level(level),
            None => self.global_level(),
        }
    }
}

pub fn parse_level(s: &str) -> Result<LevelFilter, ConfigError> {
    match s.to_lowercase().as_str() {
        "silent" | "off" => Ok(LevelFilter::OFF),
        "error" => Ok(LevelFilter::ERROR),
        "warn" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        _ => Err(ConfigError::InvalidLevel(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() -> anyhow::Result<()> {
        let config = ExchangeConfig::from_json_str("{}")?;
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.max_eval_depth, DEFAULT_MAX_EVAL_DEPTH);
        Ok(())
    }

    #[test]
    fn parses_languages_and_log_overrides() -> anyhow::Result<()> {
        let config = ExchangeConfig::from_json_str(
            r#"{
                "root": "demo",
                "languages": [{ "id": "lisp", "extensions": ["lsp"] }],
                "log": {
                    "level": "warn",
                    "format": "json",
                    "targets": { "polyglot::registry": "trace" }
                }
            }"#,
        )?;
        assert_eq!(config.root, Some(PathBuf::from("demo")));
        assert_eq!(config.languages[0].extensions, vec!["lsp"]);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level_for("polyglot::registry")?, LevelFilter::TRACE);
        assert_eq!(config.log.level_for("polyglot::engine")?, LevelFilter::WARN);
        Ok(())
    }

    #[test]
    fn rejects_unknown_fields_and_levels() {
        assert!(matches!(
            ExchangeConfig::from_json_str(r#"{ "max_depth": 3 }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(parse_level("loud"), Err(ConfigError::InvalidLevel(_))));
        assert_eq!(parse_level("SILENT").unwrap(), LevelFilter::OFF);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ExchangeConfig::from_file("/nonexistent/polyglot.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
