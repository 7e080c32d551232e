//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::traits::store::{LearningRules, PatternStore, ResultCache};
use crate::types::{
    config::CacheConfig,
    entry::CacheEntry,
    key::{CacheKey, EntityId, StatementType},
    pattern::{EntityPatterns, LearnedPattern},
    result::ExtractionResult,
};

/// In-memory storage for cached results and learned patterns.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    patterns: RwLock<HashMap<EntityId, EntityPatterns>>,
    ttl: Duration,
    rules: LearningRules,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store with default settings.
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Create a store using the TTL and learning limits from `config`.
    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            patterns: RwLock::new(HashMap::new()),
            ttl: config.ttl(),
            rules: LearningRules::from(config),
        }
    }

    /// Get the number of entities with learned patterns.
    pub fn entity_count(&self) -> usize {
        read(&self.patterns).len()
    }
}

// Poisoned locks are recovered; the maps are never left half-updated.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ResultCache for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<ExtractionResult>> {
        let now = Utc::now();
        {
            let entries = read(&self.entries);
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now) => {
                    return Ok(Some(entry.result.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: drop it unless a fresh entry replaced it meanwhile
        let mut entries = write(&self.entries);
        if entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
            entries.remove(key);
            tracing::debug!(key = %key, "Purged expired cache entry on read");
        }
        Ok(None)
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        write(&self.entries).insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut entries = write(&self.entries);
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn clear_for_entity(&self, entity: &EntityId) -> Result<usize> {
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|key, _| !key.references(entity));
        Ok(before - entries.len())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(read(&self.entries).len())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl PatternStore for MemoryStore {
    async fn patterns_for(
        &self,
        entity: &EntityId,
        statement: &StatementType,
    ) -> Result<Option<LearnedPattern>> {
        Ok(read(&self.patterns)
            .get(entity)
            .and_then(|p| p.get(statement))
            .cloned())
    }

    async fn patterns_for_entity(&self, entity: &EntityId) -> Result<Option<EntityPatterns>> {
        Ok(read(&self.patterns).get(entity).cloned())
    }

    async fn learn(
        &self,
        entity: &EntityId,
        statement: &StatementType,
        result: &ExtractionResult,
    ) -> Result<Option<LearnedPattern>> {
        if !self.rules.accepts(entity, result) {
            return Ok(None);
        }

        let mut patterns = write(&self.patterns);
        let pattern = patterns
            .entry(entity.clone())
            .or_default()
            .entry(statement.clone())
            .or_default();
        self.rules.apply(pattern, result);

        Ok(Some(pattern.clone()))
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        let mut entities: Vec<_> = read(&self.patterns).keys().cloned().collect();
        entities.sort();
        Ok(entities)
    }

    async fn forget_entity(&self, entity: &EntityId) -> Result<bool> {
        Ok(write(&self.patterns).remove(entity).is_some())
    }

    async fn forget_all(&self) -> Result<usize> {
        let mut patterns = write(&self.patterns);
        let count = patterns.len();
        patterns.clear();
        Ok(count)
    }
}
