//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local development with many cached filings
//! - Single-server deployments
//! - Testing with persistent data

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{ExtractionError, Result};
use crate::traits::store::{LearningRules, PatternStore, ResultCache};
use crate::types::{
    config::CacheConfig,
    entry::CacheEntry,
    key::{CacheKey, ContentFingerprint, EntityId, StatementType},
    pattern::{EntityPatterns, LearnedPattern},
    result::ExtractionResult,
};

/// SQLite-based extraction store.
pub struct SqliteStore {
    pool: SqlitePool,
    ttl: Duration,
    rules: LearningRules,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://extraction_cache/cache.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str, config: &CacheConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(ExtractionError::storage)?;

        let store = Self {
            pool,
            ttl: config.ttl(),
            rules: LearningRules::from(config),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self> {
        // A single connection, so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(ExtractionError::storage)?;

        let config = CacheConfig::default();
        let store = Self {
            pool,
            ttl: config.ttl(),
            rules: LearningRules::from(&config),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                storage_name TEXT PRIMARY KEY,
                entity TEXT NOT NULL,
                statement TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                result TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_entity ON cache_entries(entity);
            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS learned_patterns (
                entity TEXT NOT NULL,
                statement TEXT NOT NULL,
                pattern TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (entity, statement)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct EntryRow {
    entity: String,
    statement: String,
    fingerprint: String,
    result: String,
    created_at: String,
    expires_at: String,
}

impl EntryRow {
    fn into_entry(self) -> Result<CacheEntry> {
        let created_at = parse_timestamp(&self.created_at)?;
        let expires_at = parse_timestamp(&self.expires_at)?;
        let result: ExtractionResult = serde_json::from_str(&self.result)
            .map_err(|e| ExtractionError::storage(format!("Invalid result JSON: {e}")))?;

        let key = CacheKey::with_fingerprint(
            self.entity,
            StatementType::parse(&self.statement),
            ContentFingerprint::from_hex(self.fingerprint)?,
        );

        Ok(CacheEntry::new(key, result)
            .with_created_at(created_at)
            .with_ttl(expires_at - created_at))
    }
}

#[derive(Debug, FromRow)]
struct PatternRow {
    statement: String,
    pattern: String,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| ExtractionError::storage(format!("Invalid date: {e}")))?
        .with_timezone(&Utc))
}

// RFC 3339 with a fixed offset and precision so string comparison orders by time
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Clamp to four-digit years, the range where RFC 3339 strings sort by time.
fn storable(ts: DateTime<Utc>) -> DateTime<Utc> {
    let latest = Utc
        .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let earliest = Utc
        .with_ymd_and_hms(0, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    ts.clamp(earliest, latest)
}

#[async_trait]
impl ResultCache for SqliteStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<ExtractionResult>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT entity, statement, fingerprint, result, created_at, expires_at FROM cache_entries WHERE storage_name = ?",
        )
        .bind(key.storage_name())
        .fetch_optional(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = match row.into_entry() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache row");
                self.delete(key).await?;
                return Ok(None);
            }
        };

        if entry.key != *key {
            return Ok(None);
        }

        if entry.is_expired() {
            self.delete(key).await?;
            tracing::debug!(key = %key, "Purged expired cache entry on read");
            return Ok(None);
        }

        Ok(Some(entry.result))
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        let result = serde_json::to_string(&entry.result)?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (storage_name, entity, statement, fingerprint, result, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(storage_name) DO UPDATE SET
                entity = excluded.entity,
                statement = excluded.statement,
                fingerprint = excluded.fingerprint,
                result = excluded.result,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(entry.key.storage_name())
        .bind(entry.key.entity.as_str())
        .bind(entry.key.statement.as_str())
        .bind(entry.key.fingerprint.as_str())
        .bind(&result)
        .bind(format_timestamp(storable(entry.created_at)))
        .bind(format_timestamp(storable(entry.expires_at())))
        .execute(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn clear_for_entity(&self, entity: &EntityId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE entity = ?")
            .bind(entity.as_str())
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn len(&self) -> Result<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(count.0 as usize)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl SqliteStore {
    async fn delete(&self, key: &CacheKey) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE storage_name = ?")
            .bind(key.storage_name())
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(())
    }
}

#[async_trait]
impl PatternStore for SqliteStore {
    async fn patterns_for(
        &self,
        entity: &EntityId,
        statement: &StatementType,
    ) -> Result<Option<LearnedPattern>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT pattern FROM learned_patterns WHERE entity = ? AND statement = ?")
                .bind(entity.as_str())
                .bind(statement.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(ExtractionError::storage)?;

        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn patterns_for_entity(&self, entity: &EntityId) -> Result<Option<EntityPatterns>> {
        let rows = sqlx::query_as::<_, PatternRow>(
            "SELECT statement, pattern FROM learned_patterns WHERE entity = ? ORDER BY statement",
        )
        .bind(entity.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut patterns = EntityPatterns::new();
        for row in rows {
            patterns.insert(
                StatementType::parse(&row.statement),
                serde_json::from_str(&row.pattern)?,
            );
        }
        Ok(Some(patterns))
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

        let mut pattern = self
            .patterns_for(entity, statement)
            .await?
            .unwrap_or_default();
        self.rules.apply(&mut pattern, result);

        sqlx::query(
            r#"
            INSERT INTO learned_patterns (entity, statement, pattern, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(entity, statement) DO UPDATE SET
                pattern = excluded.pattern,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity.as_str())
        .bind(statement.as_str())
        .bind(serde_json::to_string(&pattern)?)
        .bind(format_timestamp(pattern.updated_at))
        .execute(&self.pool)
        .await
        .map_err(ExtractionError::storage)?;

        Ok(Some(pattern))
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT entity FROM learned_patterns ORDER BY entity")
                .fetch_all(&self.pool)
                .await
                .map_err(ExtractionError::storage)?;

        Ok(rows.into_iter().map(|(e,)| EntityId::new(e)).collect())
    }

    async fn forget_entity(&self, entity: &EntityId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM learned_patterns WHERE entity = ?")
            .bind(entity.as_str())
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn forget_all(&self) -> Result<usize> {
        let count = self.entities().await?.len();
        sqlx::query("DELETE FROM learned_patterns")
            .execute(&self.pool)
            .await
            .map_err(ExtractionError::storage)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn result() -> ExtractionResult {
        ExtractionResult::new()
            .with_periods(["Q1 2024", "Q1 2023"])
            .with_line("Net cash provided by operating activities", &[50.0, 40.0])
            .with_line("Net cash used in investing activities", &[-20.0, -10.0])
            .with_line("Net increase in cash", &[30.0, 30.0])
    }

    #[tokio::test]
    async fn test_entry_storage() {
        let store = test_store().await;
        let key = CacheKey::new("AAPL", StatementType::CashFlow, "filing");

        store.put(&key, &result()).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(result()));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged() {
        let store = test_store().await;
        let key = CacheKey::new("AAPL", StatementType::CashFlow, "filing");

        store
            .put_entry(
                CacheEntry::new(key.clone(), result())
                    .with_created_at(Utc::now() - Duration::hours(26)),
            )
            .await
            .unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_uses_expiry_column() {
        let store = test_store().await;
        let live = CacheKey::new("A", StatementType::CashFlow, "1");
        let stale = CacheKey::new("B", StatementType::CashFlow, "2");

        store.put(&live, &result()).await.unwrap();
        store
            .put_entry(
                CacheEntry::new(stale, result())
                    .with_created_at(Utc::now() - Duration::hours(48)),
            )
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get(&live).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_for_entity() {
        let store = test_store().await;
        let aapl = CacheKey::new("AAPL", StatementType::CashFlow, "1");
        let msft = CacheKey::new("MSFT", StatementType::CashFlow, "1");

        store.put(&aapl, &result()).await.unwrap();
        store.put(&msft, &result()).await.unwrap();

        assert_eq!(store.clear_for_entity(&EntityId::new("aapl")).await.unwrap(), 1);
        assert!(store.get(&aapl).await.unwrap().is_none());
        assert!(store.get(&msft).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pattern_storage() {
        let store = test_store().await;
        let entity = EntityId::new("MDB");

        store
            .learn(&entity, &StatementType::CashFlow, &result())
            .await
            .unwrap();
        let pattern = store
            .learn(&entity, &StatementType::CashFlow, &result())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(pattern.extraction_count, 2);
        assert_eq!(store.entities().await.unwrap(), vec![entity.clone()]);

        let all = store.patterns_for_entity(&entity).await.unwrap().unwrap();
        assert_eq!(all.len(), 1);

        assert!(store.forget_entity(&entity).await.unwrap());
        assert!(store.entities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_punctuation_variants_are_separate_rows() {
        let store = test_store().await;
        let dash = CacheKey::new("BRK-B", StatementType::CashFlow, "filing");
        let slash = CacheKey::new("BRK/B", StatementType::CashFlow, "filing");
        let first = ExtractionResult::new().with_line("Revenue", &[1.0]);
        let second = ExtractionResult::new().with_line("Revenue", &[2.0]);

        store.put(&dash, &first).await.unwrap();
        store.put(&slash, &second).await.unwrap();

        assert_eq!(store.get(&dash).await.unwrap(), Some(first));
        assert_eq!(store.get(&slash).await.unwrap(), Some(second));
        assert_eq!(store.len().await.unwrap(), 2);
        assert_eq!(store.clear_for_entity(&EntityId::new("BRK-B")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unaddable_ttl_is_stored_as_far_future() {
        let store = test_store().await;
        let key = CacheKey::new("AAPL", StatementType::CashFlow, "filing");

        store
            .put_entry(CacheEntry::new(key.clone(), result()).with_ttl(Duration::MAX))
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.get(&key).await.unwrap(), Some(result()));
    }
}
