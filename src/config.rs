//! Configuration for the query parser and the metadata store.
//!
//! Every struct has working defaults, so `Settings::default()` is a complete
//! configuration. [`Settings::load`] merges a TOML file and `DOCLENS_`
//! environment variables over those defaults (nested keys use `__`, e.g.
//! `DOCLENS_STORE__CACHE_TTL_SECONDS=60`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{LensResult, ValidationError};
use crate::identity::DEFAULT_STOPWORDS;

/// Default shortest and longest name, in characters.
pub const DEFAULT_NAME_LENGTH_BOUNDS: (usize, usize) = (2, 4);

/// Override patterns for the directive scanner.
///
/// Each pattern is a regular expression; capture group 1 is the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPatterns {
    /// Replaces the built-in `year:<value>` pattern.
    pub year: Option<String>,
    /// Replaces the built-in `drafter:<value>` pattern.
    pub identity: Option<String>,
}

/// Query parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Words never treated as names.
    pub stopwords: BTreeSet<String>,
    /// Directive pattern overrides.
    pub token_patterns: TokenPatterns,
    /// Inclusive (min, max) name length in characters.
    pub name_length_bounds: (usize, usize),
    /// Minimum combined score for a fuzzy identity match.
    pub fuzzy_threshold: f64,
    /// Minimum skeleton similarity before a pair is scored at all.
    pub skeleton_threshold: f64,
    /// Maximum fuzzy comparisons per query, shared by all candidates.
    pub fuzzy_comparison_budget: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
            token_patterns: TokenPatterns::default(),
            name_length_bounds: DEFAULT_NAME_LENGTH_BOUNDS,
            fuzzy_threshold: 0.87,
            skeleton_threshold: 0.80,
            fuzzy_comparison_budget: 50,
        }
    }
}

impl ParserConfig {
    /// Check ranges and bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` describing the first problem.
    pub fn validate(self) -> Result<Self, ValidationError> {
        validate_bounds(self.name_length_bounds)?;
        for (name, value) in [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("skeleton_threshold", self.skeleton_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("{name} must be within [0, 1] (got {value})"),
                });
            }
        }
        Ok(self)
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file. `None` keeps the store in memory only.
    pub path: Option<PathBuf>,
    /// Lifetime of cached search results; 0 disables the cache.
    pub cache_ttl_seconds: u64,
    /// Upper bound on cached result sets.
    pub cache_max_entries: u64,
    /// Minimum time between automatic saves after single writes.
    pub auto_save_interval_seconds: u64,
    /// Inclusive (min, max) length for identity field values.
    pub name_length_bounds: (usize, usize),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            auto_save_interval_seconds: 10,
            name_length_bounds: DEFAULT_NAME_LENGTH_BOUNDS,
        }
    }
}

impl StoreConfig {
    /// Memory-only defaults.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Defaults persisted to `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Cache TTL as a `Duration`.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Auto-save interval as a `Duration`.
    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_seconds)
    }

    /// Check bounds and the snapshot path.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` describing the first problem.
    pub fn validate(self) -> Result<Self, ValidationError> {
        validate_bounds(self.name_length_bounds)?;
        if let Some(path) = &self.path {
            if path.file_name().is_none() {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("store path {} has no file name", path.display()),
                });
            }
        }
        Ok(self)
    }
}

fn validate_bounds((min, max): (usize, usize)) -> Result<(), ValidationError> {
    if min == 0 || min > max {
        return Err(ValidationError::InvalidConfig {
            reason: format!("name_length_bounds must satisfy 1 <= min <= max (got ({min}, {max}))"),
        });
    }
    Ok(())
}

/// Complete configuration for one parser and one store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Query parser settings.
    pub parser: ParserConfig,
    /// Metadata store settings.
    pub store: StoreConfig,
}

impl Settings {
    /// Load defaults, then `path` (if it exists), then `DOCLENS_*` variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a source cannot be parsed, or a
    /// validation error if the merged values are out of range.
    pub fn load(path: impl AsRef<Path>) -> LensResult<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DOCLENS_").split("__"));
        Self::from_figment(&figment)
    }

    /// Extract and validate settings from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn from_figment(figment: &Figment) -> LensResult<Self> {
        let settings: Self = figment.extract()?;
        Ok(Self {
            parser: settings.parser.validate()?,
            store: settings.store.validate()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.parser.name_length_bounds, (2, 4));
        assert!((settings.parser.fuzzy_threshold - 0.87).abs() < f64::EPSILON);
        assert_eq!(settings.parser.fuzzy_comparison_budget, 50);
        assert!(settings.parser.stopwords.contains("문서"));
        assert_eq!(settings.store.cache_ttl_seconds, 300);
        assert_eq!(settings.store.auto_save_interval_seconds, 10);
        assert!(settings.store.path.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let cfg = ParserConfig {
            name_length_bounds: (5, 2),
            ..ParserConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ValidationError::InvalidConfig { .. })
        ));

        let cfg = StoreConfig {
            name_length_bounds: (0, 4),
            ..StoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let cfg = ParserConfig {
            fuzzy_threshold: 1.5,
            ..ParserConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("fuzzy_threshold"));
    }

    #[test]
    fn test_load_merges_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doclens.toml");
        std::fs::write(
            &path,
            r#"
[parser]
stopwords = ["회의"]
fuzzy_comparison_budget = 10

[parser.token_patterns]
identity = '(?:by)\s*[:=]\s*(\S+)'

[store]
cache_ttl_seconds = 5
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.parser.fuzzy_comparison_budget, 10);
        assert_eq!(settings.parser.stopwords.len(), 1);
        assert!(settings.parser.token_patterns.identity.is_some());
        assert!(settings.parser.token_patterns.year.is_none());
        assert_eq!(settings.store.cache_ttl_seconds, 5);
        assert_eq!(settings.store.auto_save_interval_seconds, 10);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.store, StoreConfig::default());
    }

    #[test]
    fn test_load_invalid_values_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doclens.toml");
        std::fs::write(&path, "[store]\nname_length_bounds = [4, 2]\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(err.is_validation());
    }
}
