use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, EffortTable};

/// Represents errors found while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("grid size bounds are inverted: min {min} > max {max}")]
    InvertedBounds { min: usize, max: usize },
    #[error("minimum grid size must be at least 1")]
    ZeroMinimum,
    #[error("grid size {size} is outside the allowed range {min}..={max}")]
    SizeOutOfRange { size: usize, min: usize, max: usize },
    #[error("effort override for unknown action kind '{0}'")]
    UnknownEffortKind(String),
}

/// Immutable settings for one simulation run.
///
/// Built once at start-up and passed by reference to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub min_grid_size: usize,
    pub max_grid_size: usize,
    /// Side length used when a fresh grid is created.
    pub grid_size: usize,
    /// Per-kind effort costs replacing the defaults, keyed by kind name.
    pub effort: BTreeMap<String, u64>,
    /// Whether actors may claim to be someone else when speaking.
    pub allow_sender_spoofing: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            min_grid_size: 3,
            max_grid_size: 50,
            grid_size: 8,
            effort: BTreeMap::new(),
            allow_sender_spoofing: false,
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a JSON configuration. Missing fields take their
    /// default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_effort(mut self, kind: ActionKind, cost: u64) -> Self {
        self.effort.insert(kind.name().to_string(), cost);
        self
    }

    pub fn with_sender_spoofing(mut self, allowed: bool) -> Self {
        self.allow_sender_spoofing = allowed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_grid_size == 0 {
            return Err(ConfigError::ZeroMinimum);
        }
        if self.min_grid_size > self.max_grid_size {
            return Err(ConfigError::InvertedBounds {
                min: self.min_grid_size,
                max: self.max_grid_size,
            });
        }
        self.check_grid_size(self.grid_size)?;
        for name in self.effort.keys() {
            name.parse::<ActionKind>()
                .map_err(|_| ConfigError::UnknownEffortKind(name.clone()))?;
        }
        Ok(())
    }

    /// Checks `size` against the configured bounds.
    pub fn check_grid_size(&self, size: usize) -> Result<(), ConfigError> {
        if (self.min_grid_size..=self.max_grid_size).contains(&size) {
            Ok(())
        } else {
            Err(ConfigError::SizeOutOfRange {
                size,
                min: self.min_grid_size,
                max: self.max_grid_size,
            })
        }
    }

    pub fn effort_table(&self) -> EffortTable {
        EffortTable::with_overrides(&self.effort)
    }
}
