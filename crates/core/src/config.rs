//! Converter configuration.

use serde::{Deserialize, Serialize};

/// Default bound on nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tunables for a [`Converter`](crate::converter::Converter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Maximum nesting of records, external records, unions, sequences and
    /// mappings within one conversion.
    pub max_depth: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ConverterConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse a configuration from a JSON document. Missing keys take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
