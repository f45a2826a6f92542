//! Checker configuration
//!
//! Loaded from a TOML file given with `--config`; command-line flags are
//! applied on top.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Bounds on the transitive fact chase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Most fact edges walked from the left side of a target
    #[serde(default = "default_chase_depth")]
    pub chase_depth: usize,

    /// Most edges followed out of any one expression
    #[serde(default = "default_chase_fanout")]
    pub chase_fanout: usize,
}

fn default_chase_depth() -> usize {
    3
}

fn default_chase_fanout() -> usize {
    16
}

impl Default for ProverConfig {
    fn default() -> Self {
        ProverConfig {
            chase_depth: default_chase_depth(),
            chase_fanout: default_chase_fanout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub prover: ProverConfig,

    /// Check functions on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Keep each function's final facts in its report
    #[serde(default)]
    pub dump_facts: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            prover: ProverConfig::default(),
            parallel: default_parallel(),
            dump_facts: false,
        }
    }
}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompileError::io_error(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CompileError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckConfig::default();
        assert_eq!(config.prover.chase_depth, 3);
        assert_eq!(config.prover.chase_fanout, 16);
        assert!(config.parallel);
        assert!(!config.dump_facts);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(CheckConfig::from_toml("").unwrap(), CheckConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = CheckConfig::from_toml(
            r#"
            parallel = false

            [prover]
            chase_depth = 5
            "#,
        )
        .unwrap();
        assert!(!config.parallel);
        assert_eq!(config.prover.chase_depth, 5);
        assert_eq!(config.prover.chase_fanout, 16);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = CheckConfig::from_toml("prover = 3").unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }));
    }
}
