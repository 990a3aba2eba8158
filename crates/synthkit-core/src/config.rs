//! Pass configuration.
//!
//! Recognized options mirror the pass entry point: class exclusion patterns,
//! fixpoint iteration, and whether a single rewrite failure aborts the run.
//! Configuration can be read from YAML or JSON.

use crate::errors::{Result, SynthError};
use glob::Pattern;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_PASSES: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Glob patterns over class descriptors (`Lcom/vendor/*`). Matching
    /// classes are neither scanned, rewritten, nor have their fields touched.
    pub exclude_patterns: Vec<String>,
    /// Re-run detection after rewriting until nothing more is approved.
    pub iterate_to_fixpoint: bool,
    /// Upper bound on passes when iterating to a fixpoint.
    pub max_passes: u32,
    /// Abort the whole run, without mutating anything, on the first
    /// rewrite verification failure.
    pub fail_fast: bool,
    /// Only consider methods carrying the SYNTHETIC access flag.
    pub require_synthetic_flag: bool,
    /// Widen a private or protected field so inlined call sites can reach it.
    /// When disabled, candidates whose field is not already accessible from
    /// every caller are rejected.
    pub relax_field_visibility: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            iterate_to_fixpoint: false,
            max_passes: DEFAULT_MAX_PASSES,
            fail_fast: false,
            require_synthetic_flag: false,
            relax_field_visibility: true,
        }
    }
}

impl SynthConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SynthConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SynthConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_passes == 0 {
            return Err(SynthError::Config("max_passes must be at least 1".into()));
        }
        ExclusionFilter::new(&self.exclude_patterns).map(|_| ())
    }

    /// Number of passes the driver may run.
    pub fn pass_limit(&self) -> u32 {
        if self.iterate_to_fixpoint {
            self.max_passes.max(1)
        } else {
            1
        }
    }
}

/// Compiled form of `exclude_patterns`.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Pattern>,
}

impl ExclusionFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, class: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SynthConfig::default();
        assert!(!config.iterate_to_fixpoint);
        assert!(!config.fail_fast);
        assert!(config.relax_field_visibility);
        assert_eq!(config.pass_limit(), 1);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = SynthConfig::from_yaml_str(
            "exclude_patterns:\n  - \"Lcom/vendor/*\"\niterate_to_fixpoint: true\nmax_passes: 3\n",
        )
        .unwrap();
        assert_eq!(config.exclude_patterns, vec!["Lcom/vendor/*".to_string()]);
        assert_eq!(config.pass_limit(), 3);
        assert!(!config.fail_fast);
    }

    #[test]
    fn test_from_json() {
        let config = SynthConfig::from_json_str(r#"{"fail_fast": true}"#).unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.max_passes, DEFAULT_MAX_PASSES);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = SynthConfig::from_json_str(r#"{"exclude_patterns": ["Lcom/[oops"]}"#).unwrap_err();
        assert!(matches!(err, SynthError::Config(_)));
    }

    #[test]
    fn test_zero_max_passes_rejected() {
        assert!(SynthConfig::from_yaml_str("max_passes: 0\n").is_err());
    }

    #[test]
    fn test_exclusion_filter() {
        let filter = ExclusionFilter::new(&["Lcom/vendor/*".to_string(), "LExact;".to_string()]).unwrap();
        assert!(filter.is_excluded("Lcom/vendor/Lib;"));
        assert!(filter.is_excluded("Lcom/vendor/deep/Lib$Inner;"));
        assert!(filter.is_excluded("LExact;"));
        assert!(!filter.is_excluded("Lcom/example/Alpha;"));
    }
}
