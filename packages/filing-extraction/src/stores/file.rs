//! Directory-backed storage implementation.
//!
//! Layout of the cache directory:
//! - `{fingerprint}_{statement}_{ENTITY}.json` - one file per cache entry,
//!   named by `CacheKey::storage_name`
//! - `company_patterns.json` - all learned patterns, keyed by entity
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never sees a half-written entry. Entry files that fail to parse
//! are treated as misses and removed.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{ExtractionError, Result};
use crate::traits::store::{LearningRules, PatternStore, ResultCache};
use crate::types::{
    config::CacheConfig,
    entry::CacheEntry,
    key::{CacheKey, EntityId, StatementType},
    pattern::{EntityPatterns, LearnedPattern},
    result::ExtractionResult,
};

/// File holding learned patterns inside the cache directory.
pub const PATTERNS_FILE: &str = "company_patterns.json";

const ENTRY_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = ".tmp";

/// File-based store persisting entries and patterns under one directory.
pub struct FileStore {
    dir: PathBuf,
    ttl: Duration,
    rules: LearningRules,
    patterns: Mutex<BTreeMap<EntityId, EntityPatterns>>,
}

impl FileStore {
    /// Open (and create if missing) the cache directory from `config`.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let dir = config.cache_dir.clone();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExtractionError::io(&dir, e))?;

        let patterns = load_patterns(&dir.join(PATTERNS_FILE)).await;

        tracing::debug!(
            dir = %dir.display(),
            entities = patterns.len(),
            "Opened extraction cache directory"
        );

        Ok(Self {
            dir,
            ttl: config.ttl(),
            rules: LearningRules::from(config),
            patterns: Mutex::new(patterns),
        })
    }

    /// Open a store at `dir` with otherwise default settings.
    pub async fn open_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(&CacheConfig::default().with_cache_dir(dir)).await
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.storage_name(), ENTRY_EXTENSION))
    }

    /// Paths of all entry files currently in the directory.
    async fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| ExtractionError::io(&self.dir, e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| ExtractionError::io(&self.dir, e))?
        {
            let path = item.path();
            if is_entry_file(&path) {
                paths.push(path);
            }
        }

        Ok(paths)
    }

    /// Read an entry file. Missing → None; corrupt → removed, None.
    async fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>> {
        Ok(match self.load_entry(path).await? {
            Loaded::Entry(entry) => Some(entry),
            Loaded::Missing | Loaded::Discarded => None,
        })
    }

    async fn load_entry(&self, path: &Path) -> Result<Loaded> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => return Err(ExtractionError::io(path, e)),
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Ok(Loaded::Entry(entry)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Discarding unreadable cache entry"
                );
                Ok(if remove_if_exists(path).await? {
                    Loaded::Discarded
                } else {
                    Loaded::Missing
                })
            }
        }
    }

    async fn persist_patterns(&self, patterns: &BTreeMap<EntityId, EntityPatterns>) -> Result<()> {
        let json = serde_json::to_vec_pretty(patterns)?;
        write_atomic(&self.dir.join(PATTERNS_FILE), &json).await
    }
}

/// Outcome of reading one entry file.
enum Loaded {
    Entry(CacheEntry),
    /// Gone before it could be read
    Missing,
    /// Unreadable, and this call removed it
    Discarded,
}

fn is_entry_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name != PATTERNS_FILE
        && !name.starts_with('.')
        && path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
}

async fn load_patterns(path: &Path) -> BTreeMap<EntityId, EntityPatterns> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read learned patterns");
            return BTreeMap::new();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Learned patterns file is corrupt, starting empty"
        );
        BTreeMap::new()
    })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExtractionError::storage(format!("bad cache path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}{TMP_SUFFIX}"));

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| ExtractionError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| ExtractionError::io(path, e))
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ExtractionError::io(path, e)),
    }
}

#[async_trait]
impl ResultCache for FileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<ExtractionResult>> {
        let path = self.entry_path(key);
        let Some(entry) = self.read_entry(&path).await? else {
            return Ok(None);
        };

        if entry.key != *key {
            tracing::warn!(key = %key, path = %path.display(), "Cache entry key mismatch");
            return Ok(None);
        }

        if entry.is_expired() {
            remove_if_exists(&path).await?;
            tracing::debug!(key = %key, "Purged expired cache entry on read");
            return Ok(None);
        }

        Ok(Some(entry.result))
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.key);
        let json = serde_json::to_vec(&entry)?;
        write_atomic(&path, &json).await
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            if remove_if_exists(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear_for_entity(&self, entity: &EntityId) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            let Some(entry) = self.read_entry(&path).await? else {
                continue;
            };
            if entry.key.references(entity) && remove_if_exists(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for path in self.entry_paths().await? {
            match self.load_entry(&path).await? {
                Loaded::Entry(entry) if entry.is_expired_at(now) => {
                    if remove_if_exists(&path).await? {
                        removed += 1;
                    }
                }
                Loaded::Discarded => removed += 1,
                Loaded::Entry(_) | Loaded::Missing => {}
            }
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entry_paths().await?.len())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl PatternStore for FileStore {
    async fn patterns_for(
        &self,
        entity: &EntityId,
        statement: &StatementType,
    ) -> Result<Option<LearnedPattern>> {
        Ok(self
            .patterns
            .lock()
            .await
            .get(entity)
            .and_then(|p| p.get(statement))
            .cloned())
    }

    async fn patterns_for_entity(&self, entity: &EntityId) -> Result<Option<EntityPatterns>> {
        Ok(self.patterns.lock().await.get(entity).cloned())
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

        let mut patterns = self.patterns.lock().await;
        let pattern = patterns
            .entry(entity.clone())
            .or_default()
            .entry(statement.clone())
            .or_default();
        self.rules.apply(pattern, result);
        let updated = pattern.clone();

        self.persist_patterns(&patterns).await?;
        Ok(Some(updated))
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        // BTreeMap keys are already sorted
        Ok(self.patterns.lock().await.keys().cloned().collect())
    }

    async fn forget_entity(&self, entity: &EntityId) -> Result<bool> {
        let mut patterns = self.patterns.lock().await;
        if patterns.remove(entity).is_none() {
            return Ok(false);
        }
        self.persist_patterns(&patterns).await?;
        Ok(true)
    }

    async fn forget_all(&self) -> Result<usize> {
        let mut patterns = self.patterns.lock().await;
        let count = patterns.len();
        patterns.clear();
        remove_if_exists(&self.dir.join(PATTERNS_FILE)).await?;
        Ok(count)
    }
}
