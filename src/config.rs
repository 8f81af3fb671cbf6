//! Run settings, loadable from a JSON file.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "max_moves": 200, "settle_ms": 150, "keys": { "undo": "ctrl+z" } }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::Region;
use crate::engine::{Move, DEFAULT_SIZE};
use crate::input::KeyMap;
use crate::policy::{PolicyConfig, DEFAULT_PRIORITY, MAX_LOOKAHEAD};
use crate::runner::{RunConfig, DEFAULT_MAX_MOVES, DEFAULT_MAX_UNDO_RETRIES};
use crate::vision::{LibraryOptions, DEFAULT_LOW_CONFIDENCE};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    pub grid_size: usize,
    pub max_moves: u64,
    pub max_undo_retries: u32,
    pub lookahead: usize,
    pub settle_ms: u64,
    pub low_confidence: f64,
    /// Resize prototypes (and captured cells) to this (width, height).
    pub prototype_size: Option<(u32, u32)>,
    /// Board rectangle inside the screenshot; the whole image when absent.
    pub region: Option<Region>,
    pub priority: [Move; 4],
    pub keys: KeyMap,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_SIZE,
            max_moves: DEFAULT_MAX_MOVES,
            max_undo_retries: DEFAULT_MAX_UNDO_RETRIES,
            lookahead: 1,
            settle_ms: 0,
            low_confidence: DEFAULT_LOW_CONFIDENCE,
            prototype_size: None,
            region: None,
            priority: DEFAULT_PRIORITY,
            keys: KeyMap::default(),
        }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < 2 {
            return Err(ConfigError::Invalid(format!("grid_size must be at least 2, got {}", self.grid_size)));
        }
        if !(1..=MAX_LOOKAHEAD).contains(&self.lookahead) {
            return Err(ConfigError::Invalid(format!("lookahead must be in 1..={MAX_LOOKAHEAD}, got {}", self.lookahead)));
        }
        if !self.policy_config().priority_is_complete() {
            return Err(ConfigError::Invalid(format!("priority must name every direction once, got {:?}", self.priority)));
        }
        if !(-1.0..=1.0).contains(&self.low_confidence) {
            return Err(ConfigError::Invalid(format!("low_confidence {} is outside [-1, 1]", self.low_confidence)));
        }
        if matches!(self.prototype_size, Some((0, _)) | Some((_, 0))) {
            return Err(ConfigError::Invalid("prototype_size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            max_moves: self.max_moves,
            max_undo_retries: self.max_undo_retries,
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig { lookahead: self.lookahead, priority: self.priority }
    }

    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions { prototype_size: self.prototype_size }
    }
}
