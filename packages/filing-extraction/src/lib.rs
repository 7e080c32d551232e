//! Financial Statement Extraction Cache
//!
//! Caches statement extractions from SEC filing HTML, keyed by entity,
//! statement type and content fingerprint, and learns per-entity patterns
//! that are fed back into later AI requests.
//!
//! # Design Philosophy
//!
//! - Never pay for the same extraction twice within the TTL
//! - Tables first, AI when the structure is not enough
//! - AI failures degrade to pattern results, storage failures surface
//! - Library handles mechanics, the AI implementation handles prompting
//!
//! # Usage
//!
//! ```rust,ignore
//! use filing_extraction::{CacheConfig, FileStore, SmartExtractor, StatementType};
//! use filing_extraction::testing::MockAI;
//!
//! // Persisted cache under extraction_cache/
//! let store = FileStore::open(&CacheConfig::from_env()?).await?;
//! let extractor = SmartExtractor::new(store, MockAI::new());
//!
//! let income = extractor
//!     .extract(&html, StatementType::IncomeStatement, "MDB")
//!     .await?;
//!
//! // Drop everything known about one company
//! extractor.clear_entity("MDB").await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (ResultCache, PatternStore, AI)
//! - [`types`] - Keys, entries, results, learned patterns, config
//! - [`pipeline`] - Strategy selection, table extraction, SmartExtractor
//! - [`stores`] - Storage implementations (MemoryStore, FileStore, SqliteStore)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ExtractionError, Result};
pub use traits::{
    ai::{
        AiExtraction, Enhancement, EnhancementRequest, ExtractionRequest, TokenUsage, AI,
    },
    store::{ExtractionStore, LearningRules, PatternStore, ResultCache},
};
pub use types::{
    config::{CacheConfig, ExtractorConfig},
    entry::{CacheEntry, DEFAULT_TTL_HOURS},
    key::{CacheKey, ContentFingerprint, EntityId, StatementType},
    pattern::{EntityPatterns, LearnedPattern},
    result::{CellValue, ExtractionResult},
};

// Re-export pipeline components
pub use pipeline::{
    pattern_extract, select_strategy, smart_truncate, ClearReport, ContentProfile,
    ExtractionStats, ExtractionStrategy, PreviewSource, SmartExtractor,
};

// Re-export stores
pub use stores::{FileStore, MemoryStore};

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

pub use security::{api_key_configured, api_key_from_env};

// Re-export testing utilities
pub use testing::MockAI;
