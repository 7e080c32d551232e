//! Configuration types for the cache and the extractor.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::entry::DEFAULT_TTL_HOURS;
use super::pattern::{DEFAULT_MAX_LINE_ITEMS, DEFAULT_MAX_PERIOD_FORMATS};
use crate::error::{ExtractionError, Result};

/// Environment variable overriding the cache directory.
pub const ENV_CACHE_DIR: &str = "EXTRACTION_CACHE_DIR";

/// Environment variable overriding the TTL, in hours.
pub const ENV_CACHE_TTL_HOURS: &str = "EXTRACTION_CACHE_TTL_HOURS";

/// Longest accepted TTL, in hours (100 years).
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 100;

/// Environment variable overriding the model name.
pub const ENV_MODEL: &str = "OPENAI_MODEL";

/// Configuration for cache storage and pattern learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for persisted entries (FileStore only).
    ///
    /// Default: `extraction_cache`.
    pub cache_dir: PathBuf,

    /// Time-to-live applied to new entries, in hours.
    ///
    /// Default: 24.
    pub ttl_hours: i64,

    /// Line items remembered per (entity, statement).
    ///
    /// Default: 10.
    pub max_line_items: usize,

    /// Period formats remembered per (entity, statement).
    ///
    /// Default: 5.
    pub max_period_formats: usize,

    /// Minimum line items a result needs before it is learned from.
    ///
    /// Default: 3.
    pub min_items_to_learn: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("extraction_cache"),
            ttl_hours: DEFAULT_TTL_HOURS,
            max_line_items: DEFAULT_MAX_LINE_ITEMS,
            max_period_formats: DEFAULT_MAX_PERIOD_FORMATS,
            min_items_to_learn: 3,
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            if !dir.trim().is_empty() {
                config.cache_dir = PathBuf::from(dir);
            }
        }

        if let Ok(raw) = std::env::var(ENV_CACHE_TTL_HOURS) {
            let hours: i64 = raw.trim().parse().map_err(|_| {
                ExtractionError::Config(format!(
                    "{ENV_CACHE_TTL_HOURS} must be a whole number of hours, got {raw:?}"
                ))
            })?;
            config = config.with_ttl_hours(hours)?;
        }

        Ok(config)
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the TTL in hours. Must be in `1..=MAX_TTL_HOURS`.
    pub fn with_ttl_hours(mut self, hours: i64) -> Result<Self> {
        if hours <= 0 {
            return Err(ExtractionError::Config(format!(
                "cache TTL must be positive, got {hours}h"
            )));
        }
        if hours > MAX_TTL_HOURS {
            return Err(ExtractionError::Config(format!(
                "cache TTL must be at most {MAX_TTL_HOURS}h, got {hours}h"
            )));
        }
        self.ttl_hours = hours;
        Ok(self)
    }

    /// Set the learned list limits.
    pub fn with_pattern_limits(mut self, line_items: usize, period_formats: usize) -> Self {
        self.max_line_items = line_items;
        self.max_period_formats = period_formats;
        self
    }

    /// Set the learning threshold.
    pub fn with_min_items_to_learn(mut self, min: usize) -> Self {
        self.min_items_to_learn = min;
        self
    }

    /// TTL as a duration.
    ///
    /// `ttl_hours` is public, so out-of-range values set directly are
    /// clamped into `1..=MAX_TTL_HOURS` here.
    pub fn ttl(&self) -> Duration {
        Duration::try_hours(self.ttl_hours.clamp(1, MAX_TTL_HOURS))
            .unwrap_or_else(|| Duration::hours(DEFAULT_TTL_HOURS))
    }
}

/// Configuration for the smart extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Model identifier reported in stats and passed to the AI.
    ///
    /// Default: `gpt-4o-mini`.
    pub model: String,

    /// Character budget for content sent to targeted AI extraction.
    ///
    /// Default: 4000.
    pub truncate_chars: usize,

    /// Character budget for the excerpt sent with enhancement requests.
    ///
    /// Default: 1500.
    pub enhance_excerpt_chars: usize,

    /// Items a pattern-first extraction needs to skip the AI.
    ///
    /// Default: 5.
    pub min_pattern_items: usize,

    /// Items a hybrid extraction needs before enhancement is attempted.
    ///
    /// Default: 3.
    pub min_hybrid_items: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            truncate_chars: 4000,
            enhance_excerpt_chars: 1500,
            min_pattern_items: 5,
            min_hybrid_items: 3,
        }
    }
}

impl ExtractorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the model name from the environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the truncation budget.
    pub fn with_truncate_chars(mut self, chars: usize) -> Self {
        self.truncate_chars = chars;
        self
    }
}
