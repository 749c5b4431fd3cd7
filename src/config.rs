//! Pipeline-wide configuration options.
//!
//! `Options` keeps only the knobs this crate actually reads: enrichment
//! defaults, the fuzzy-map separator, and the per-source-type queue capacity.
//! Loaded from and saved to TOML via `serde`, the same load/save shape a
//! larger config surface would use.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Default bounded-queue capacity used by the demuxer when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Options {
    /// Default behaviour of `enrich` when called without explicit overrides.
    pub add_enum_siblings: bool,
    /// Default behaviour of `enrich` when called without explicit overrides.
    pub add_observables: bool,
    /// Separator used by `FuzzyMap` when stripping source-type suffixes.
    pub fuzzy_key_separator: char,
    /// Default bounded queue capacity for per-source-type queues (0 = unbounded).
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            add_enum_siblings: true,
            add_observables: true,
            fuzzy_key_separator: ':',
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Options {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: Options = toml::from_str(content)?;
        Ok(options)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PipelineError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::config(format!("failed to serialize options: {e}")))?;
        std::fs::write(path, content).map_err(PipelineError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let opts = Options::default();
        assert!(opts.add_enum_siblings);
        assert!(opts.add_observables);
        assert_eq!(opts.fuzzy_key_separator, ':');
        assert_eq!(opts.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn round_trips_through_toml() {
        let opts = Options { queue_capacity: 256, ..Options::default() };
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed = Options::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, opts);
    }
}
