//! Storage traits for cached results and learned patterns.
//!
//! The storage layer is split into focused traits:
//! - `ResultCache`: Extraction results with TTL expiry
//! - `PatternStore`: Per-entity learned patterns
//! - `ExtractionStore`: Composite trait combining both

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    entry::CacheEntry,
    key::{CacheKey, EntityId, StatementType},
    pattern::{EntityPatterns, LearnedPattern},
    result::ExtractionResult,
};

/// Cache for extraction results.
///
/// At most one entry is held per key. Expired entries are never served;
/// they are removed when a `get` runs into them or on `purge_expired`.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Get a live result for the key.
    ///
    /// Returns None if:
    /// - No entry exists
    /// - The entry exists but its TTL has elapsed (the entry is removed)
    async fn get(&self, key: &CacheKey) -> Result<Option<ExtractionResult>>;

    /// Store a fully-formed entry, replacing any entry for the same key.
    async fn put_entry(&self, entry: CacheEntry) -> Result<()>;

    /// Store a result stamped now with the store's TTL.
    async fn put(&self, key: &CacheKey, result: &ExtractionResult) -> Result<()> {
        let entry = CacheEntry::new(key.clone(), result.clone()).with_ttl(self.ttl());
        self.put_entry(entry).await
    }

    /// Remove every entry. Returns the number removed.
    async fn clear_all(&self) -> Result<usize>;

    /// Remove every entry whose key references the entity.
    ///
    /// Returns the number removed.
    async fn clear_for_entity(&self, entity: &EntityId) -> Result<usize>;

    /// Remove expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize>;

    /// Number of stored entries, including expired ones not yet purged.
    async fn len(&self) -> Result<usize>;

    /// Whether the cache holds no entries.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// TTL applied by `put`.
    fn ttl(&self) -> chrono::Duration;
}

/// Store for learned per-entity patterns.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Get the learned pattern for one statement of an entity.
    async fn patterns_for(
        &self,
        entity: &EntityId,
        statement: &StatementType,
    ) -> Result<Option<LearnedPattern>>;

    /// Get all learned patterns for an entity.
    async fn patterns_for_entity(&self, entity: &EntityId) -> Result<Option<EntityPatterns>>;

    /// Learn from an extraction result.
    ///
    /// Returns the updated pattern, or None when the result was not
    /// learned from (empty entity or too few line items).
    async fn learn(
        &self,
        entity: &EntityId,
        statement: &StatementType,
        result: &ExtractionResult,
    ) -> Result<Option<LearnedPattern>>;

    /// Entities with learned patterns, sorted.
    async fn entities(&self) -> Result<Vec<EntityId>>;

    /// Forget everything learned about an entity.
    ///
    /// Returns true if anything was removed.
    async fn forget_entity(&self, entity: &EntityId) -> Result<bool>;

    /// Forget all learned patterns. Returns the number of entities removed.
    async fn forget_all(&self) -> Result<usize>;

    /// Render the learned context block for an entity, if any.
    async fn context_for(&self, entity: &EntityId, statement: &StatementType) -> Result<String> {
        if entity.is_empty() {
            return Ok(String::new());
        }
        Ok(self
            .patterns_for(entity, statement)
            .await?
            .map(|p| p.context(entity.as_str()))
            .unwrap_or_default())
    }
}

/// Composite storage trait combining results and patterns.
///
/// This is the main trait used by the SmartExtractor.
pub trait ExtractionStore: ResultCache + PatternStore {}

// Blanket implementation: anything implementing both traits is an ExtractionStore
impl<T: ResultCache + PatternStore> ExtractionStore for T {}

/// Rules shared by every `PatternStore` backend.
#[derive(Debug, Clone, Copy)]
pub struct LearningRules {
    pub max_line_items: usize,
    pub max_period_formats: usize,
    pub min_items_to_learn: usize,
}

impl LearningRules {
    /// Whether a result qualifies for learning.
    pub fn accepts(&self, entity: &EntityId, result: &ExtractionResult) -> bool {
        !entity.is_empty() && result.item_count() >= self.min_items_to_learn.max(1)
    }

    /// Apply a result to a pattern.
    pub fn apply(&self, pattern: &mut LearnedPattern, result: &ExtractionResult) {
        pattern.absorb(result, self.max_line_items, self.max_period_formats);
    }
}

impl From<&crate::types::config::CacheConfig> for LearningRules {
    fn from(config: &crate::types::config::CacheConfig) -> Self {
        Self {
            max_line_items: config.max_line_items,
            max_period_formats: config.max_period_formats,
            min_items_to_learn: config.min_items_to_learn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::CacheConfig;

    #[test]
    fn test_learning_rules_threshold() {
        let rules = LearningRules::from(&CacheConfig::default());
        let entity = EntityId::new("AAPL");

        let small = ExtractionResult::new()
            .with_line("A", &[1.0])
            .with_line("B", &[2.0]);
        assert!(!rules.accepts(&entity, &small));

        let enough = small.clone().with_line("C", &[3.0]);
        assert!(rules.accepts(&entity, &enough));
        assert!(!rules.accepts(&EntityId::new(""), &enough));
    }

    #[test]
    fn test_zero_threshold_still_requires_data() {
        let rules = LearningRules::from(&CacheConfig::default().with_min_items_to_learn(0));
        assert!(!rules.accepts(&EntityId::new("AAPL"), &ExtractionResult::new()));
    }
}
