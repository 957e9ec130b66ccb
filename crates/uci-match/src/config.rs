//! Configuration file loading for match runs.
//!
//! Engines are described in a TOML file (`match.toml` by default):
//!
//! ```toml
//! [engines.deep]
//! path = "/usr/games/stockfish"
//! depth = 20
//!
//! [engines.quick]
//! path = "stockfish"
//! movetime = 100
//! read_timeout_ms = 5000
//! random_contempt = { min = -10, max = 10 }
//!
//! [engines.quick.options]
//! Hash = 64
//! "Skill Level" = 10
//! ```

use crate::session::{ContemptRange, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uci::{EngineOptions, SearchLimit};

/// Depth used when an engine entry names no search limit.
pub const DEFAULT_DEPTH: u32 = 2;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Requested engine was not found in the configuration.
    #[error("Engine not found: {0}")]
    EngineNotFound(String),
    /// More than one of `depth`, `movetime` and `nodes` was given.
    #[error("Engine {0} sets more than one search limit")]
    ConflictingLimits(String),
}

/// Configuration for one engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Path to the engine executable, or a name looked up on `PATH`.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Fixed search depth in plies.
    pub depth: Option<u32>,
    /// Fixed search time in milliseconds.
    pub movetime: Option<u64>,
    /// Fixed node count.
    pub nodes: Option<u64>,
    /// Keep the engine's own `Ponder` setting.
    #[serde(default)]
    pub ponder: bool,
    /// Upper bound for a single exchange with the engine, in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Draw `Contempt` and `Contempt Factor` from this range.
    pub random_contempt: Option<ContemptRange>,
    /// Option overrides applied on top of the base table.
    #[serde(default)]
    pub options: EngineOptions,
}

fn default_path() -> PathBuf {
    PathBuf::from("stockfish")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            depth: None,
            movetime: None,
            nodes: None,
            ponder: false,
            read_timeout_ms: None,
            random_contempt: None,
            options: EngineOptions::new(),
        }
    }
}

impl EngineConfig {
    /// Entry for an engine that has no section in the file: `name` is taken
    /// as the executable.
    pub fn from_executable(name: &str) -> Self {
        Self {
            path: PathBuf::from(name),
            ..Default::default()
        }
    }

    /// The single search limit this entry asks for.
    ///
    /// `name` is only used in the error.
    pub fn search_limit(&self, name: &str) -> Result<SearchLimit, ConfigError> {
        let limits: Vec<SearchLimit> = [
            self.depth.map(SearchLimit::Depth),
            self.movetime.map(SearchLimit::MoveTime),
            self.nodes.map(SearchLimit::Nodes),
        ]
        .into_iter()
        .flatten()
        .collect();

        match limits.as_slice() {
            [] => Ok(SearchLimit::Depth(DEFAULT_DEPTH)),
            [limit] => Ok(*limit),
            _ => Err(ConfigError::ConflictingLimits(name.to_string())),
        }
    }

    /// Session settings for this entry.
    pub fn session_config(&self, name: &str) -> Result<SessionConfig, ConfigError> {
        Ok(SessionConfig {
            search: Some(self.search_limit(name)?),
            ponder: self.ponder,
            options: self.options.clone(),
            random_contempt: self.random_contempt,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        })
    }
}

/// Main configuration structure.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct MatchConfig {
    /// Map of engine names to their configurations.
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
}

impl MatchConfig {
    /// Loads the configuration from [`Self::config_path()`].
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads the configuration from `path`, or the default if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default path of the configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("match.toml")
    }

    /// Retrieves an engine configuration by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EngineNotFound`] if no engine with the given name exists.
    pub fn get_engine(&self, name: &str) -> Result<&EngineConfig, ConfigError> {
        self.engines
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))
    }

    /// The configured entry for `name`, or one that runs `name` as an
    /// executable with default settings.
    pub fn resolve(&self, name: &str) -> EngineConfig {
        match self.get_engine(name) {
            Ok(engine) => engine.clone(),
            Err(e) => {
                tracing::debug!("{}; running {} from PATH", e, name);
                EngineConfig::from_executable(name)
            }
        }
    }
}
