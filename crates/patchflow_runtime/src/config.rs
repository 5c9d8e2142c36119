// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Which nodes a tick evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationScope {
    /// Every node, every tick
    #[default]
    FullGraph,
    /// Only nodes feeding a designated output node; falls back to the full
    /// graph when nothing is designated
    ReachableFromOutputs,
}

/// What to do with feedback loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CyclePolicy {
    /// Evaluate cyclic nodes in insertion order; an edge whose source has
    /// not run yet this tick delivers the source's previous-tick value
    #[default]
    DelayFeedback,
    /// Treat any cycle as a structural error
    Reject,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON could not be written
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluation scope
    pub scope: EvaluationScope,
    /// Feedback loop policy
    pub cycle_policy: CyclePolicy,
    /// Turn executor panics into node errors instead of unwinding the tick
    pub catch_panics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope: EvaluationScope::FullGraph,
            cycle_policy: CyclePolicy::DelayFeedback,
            catch_panics: true,
        }
    }
}

impl EngineConfig {
    /// Parse from RON
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Write as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron(&source)
    }
}
