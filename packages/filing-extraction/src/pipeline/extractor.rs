//! The SmartExtractor - main entry point for cached statement extraction.
//!
//! Every extraction goes cache first. On a miss the document is profiled,
//! a strategy is picked, the result is learned from and then cached, so
//! identical content is never sent to the AI twice within the TTL.

use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::strategy::{select_strategy, ContentProfile, ExtractionStrategy};
use super::tables::pattern_extract;
use super::truncate::smart_truncate;
use crate::error::Result;
use crate::traits::{
    ai::{EnhancementRequest, ExtractionRequest, TokenUsage, AI},
    store::ExtractionStore,
};
use crate::types::{
    config::ExtractorConfig,
    key::{CacheKey, EntityId, StatementType},
    result::ExtractionResult,
};

/// Cached, adaptive statement extractor.
///
/// # Example
///
/// ```rust,ignore
/// let store = FileStore::open(&CacheConfig::from_env()?).await?;
/// let extractor = SmartExtractor::new(store, ai);
///
/// let income = extractor
///     .extract(&html, StatementType::IncomeStatement, "MDB")
///     .await?;
///
/// // Same content again: served from the cache
/// let again = extractor
///     .extract(&html, StatementType::IncomeStatement, "MDB")
///     .await?;
/// ```
pub struct SmartExtractor<S: ExtractionStore, A: AI> {
    store: S,
    ai: A,
    config: ExtractorConfig,
    last_usage: Mutex<Option<TokenUsage>>,
}

/// Snapshot of extractor state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub model: String,
    pub last_token_usage: Option<TokenUsage>,
    pub extraction_method: &'static str,
    pub entities_learned: usize,
    pub cached_entries: usize,
}

/// Where a read-only extraction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSource {
    /// A live cached result
    Cache,
    /// Pattern extraction over the document
    Patterns,
}

/// What a clear operation removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Cached results removed
    pub entries: usize,

    /// Entities whose learned patterns were removed
    pub entities: usize,
}

impl<S: ExtractionStore, A: AI> SmartExtractor<S, A> {
    /// Create a new extractor.
    pub fn new(store: S, ai: A) -> Self {
        Self::with_config(store, ai, ExtractorConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(store: S, ai: A, config: ExtractorConfig) -> Self {
        Self {
            store,
            ai,
            config,
            last_usage: Mutex::new(None),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the AI.
    pub fn ai(&self) -> &A {
        &self.ai
    }

    /// Extract a statement from filing HTML.
    ///
    /// AI failures never fail the extraction; they fall back to pattern
    /// results (possibly empty). Storage failures propagate.
    pub async fn extract(
        &self,
        html: &str,
        statement: StatementType,
        entity: impl Into<EntityId>,
    ) -> Result<ExtractionResult> {
        let entity = entity.into();
        let key = CacheKey::new(entity.clone(), statement.clone(), html);

        if let Some(cached) = self.store.get(&key).await? {
            debug!(key = %key, items = cached.item_count(), "Cache hit");
            return Ok(cached);
        }
        debug!(key = %key, "Cache miss");

        let profile = ContentProfile::analyze(html);
        let strategy = select_strategy(&profile);
        info!(
            key = %key,
            strategy = %strategy,
            tables = profile.table_count,
            density = profile.numeric_density,
            "Extracting statement"
        );

        let result = self
            .run_strategy(strategy, html, &statement, &entity)
            .await?;

        if let Some(pattern) = self.store.learn(&entity, &statement, &result).await? {
            info!(
                entity = %entity,
                statement = %statement,
                extraction_count = pattern.extraction_count,
                "Learned from extraction"
            );
        }

        self.store.put(&key, &result).await?;
        debug!(key = %key, items = result.item_count(), "Cached extraction");

        Ok(result)
    }

    /// Extract the income statement.
    pub async fn extract_income_statement(
        &self,
        html: &str,
        entity: impl Into<EntityId>,
    ) -> Result<ExtractionResult> {
        self.extract(html, StatementType::IncomeStatement, entity)
            .await
    }

    /// Extract the balance sheet.
    pub async fn extract_balance_sheet(
        &self,
        html: &str,
        entity: impl Into<EntityId>,
    ) -> Result<ExtractionResult> {
        self.extract(html, StatementType::BalanceSheet, entity).await
    }

    /// Extract the cash flow statement.
    pub async fn extract_cash_flow_statement(
        &self,
        html: &str,
        entity: impl Into<EntityId>,
    ) -> Result<ExtractionResult> {
        self.extract(html, StatementType::CashFlow, entity).await
    }

    /// Extract without touching the AI or writing to the store.
    ///
    /// Serves a live cached result when there is one, otherwise runs pattern
    /// extraction. Nothing is learned or cached, so a caller without an AI
    /// provider cannot leave pattern-only results behind for the same key.
    pub async fn preview(
        &self,
        html: &str,
        statement: StatementType,
        entity: impl Into<EntityId>,
    ) -> Result<(PreviewSource, ExtractionResult)> {
        let key = CacheKey::new(entity, statement, html);

        if let Some(cached) = self.store.get(&key).await? {
            debug!(key = %key, items = cached.item_count(), "Preview served from cache");
            return Ok((PreviewSource::Cache, cached));
        }

        let result = pattern_extract(html, &key.statement);
        debug!(key = %key, items = result.item_count(), "Preview from patterns");
        Ok((PreviewSource::Patterns, result))
    }

    async fn run_strategy(
        &self,
        strategy: ExtractionStrategy,
        html: &str,
        statement: &StatementType,
        entity: &EntityId,
    ) -> Result<ExtractionResult> {
        match strategy {
            ExtractionStrategy::Hybrid => {
                let base = pattern_extract(html, statement);
                if base.item_count() < self.config.min_hybrid_items {
                    return self.targeted_ai(html, statement, entity, Some(base)).await;
                }

                let context = self.store.context_for(entity, statement).await?;
                if context.is_empty() {
                    return Ok(base);
                }
                Ok(self.enhance(base, html, statement, entity, context).await)
            }
            ExtractionStrategy::PatternFirst => {
                let base = pattern_extract(html, statement);
                if base.item_count() >= self.config.min_pattern_items {
                    return Ok(base);
                }
                self.targeted_ai(html, statement, entity, Some(base)).await
            }
            ExtractionStrategy::TargetedAi => self.targeted_ai(html, statement, entity, None).await,
        }
    }

    /// AI extraction over truncated content with learned context.
    ///
    /// On AI failure returns the pattern result when it found anything.
    async fn targeted_ai(
        &self,
        html: &str,
        statement: &StatementType,
        entity: &EntityId,
        pattern_result: Option<ExtractionResult>,
    ) -> Result<ExtractionResult> {
        let request = ExtractionRequest {
            statement: statement.clone(),
            entity: entity.clone(),
            content: smart_truncate(html, self.config.truncate_chars),
            company_context: self.store.context_for(entity, statement).await?,
            model: self.config.model.clone(),
        };

        match self.ai.extract_statement(&request).await {
            Ok(extraction) => {
                if let Some(usage) = extraction.usage {
                    debug!(usage = %usage, "AI token usage");
                    self.record_usage(usage);
                }
                Ok(extraction.result)
            }
            Err(e) => {
                let fallback =
                    pattern_result.unwrap_or_else(|| pattern_extract(html, statement));
                warn!(
                    error = %e,
                    statement = %statement,
                    fallback_items = fallback.item_count(),
                    "AI extraction failed, using pattern result"
                );
                Ok(fallback)
            }
        }
    }

    /// Ask the AI to enhance a pattern result. Returns the base on failure.
    async fn enhance(
        &self,
        base: ExtractionResult,
        html: &str,
        statement: &StatementType,
        entity: &EntityId,
        company_context: String,
    ) -> ExtractionResult {
        let request = EnhancementRequest {
            statement: statement.clone(),
            entity: entity.clone(),
            base,
            company_context,
            excerpt: html.chars().take(self.config.enhance_excerpt_chars).collect(),
            model: self.config.model.clone(),
        };

        let outcome = self.ai.enhance(&request).await;
        match outcome {
            Ok(enhancement) => {
                debug!(
                    added = enhancement.enhanced_data.len(),
                    corrections = enhancement.corrections.len(),
                    confidence = ?enhancement.confidence_score,
                    "Applied enhancement"
                );
                enhancement.apply_to(&request.base)
            }
            Err(e) => {
                warn!(error = %e, statement = %statement, "Enhancement failed, keeping pattern result");
                request.base
            }
        }
    }

    fn record_usage(&self, usage: TokenUsage) {
        let mut last = self
            .last_usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(usage);
    }

    /// Token usage of the most recent AI extraction, if any.
    pub fn last_token_usage(&self) -> Option<TokenUsage> {
        *self
            .last_usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Extraction statistics.
    pub async fn stats(&self) -> Result<ExtractionStats> {
        Ok(ExtractionStats {
            model: self.config.model.clone(),
            last_token_usage: self.last_token_usage(),
            extraction_method: "smart_adaptive",
            entities_learned: self.store.entities().await?.len(),
            cached_entries: self.store.len().await?,
        })
    }

    /// Remove every cached result and learned pattern.
    pub async fn clear_cache(&self) -> Result<ClearReport> {
        let report = ClearReport {
            entries: self.store.clear_all().await?,
            entities: self.store.forget_all().await?,
        };
        info!(entries = report.entries, entities = report.entities, "Cleared extraction cache");
        Ok(report)
    }

    /// Remove cached results and learned patterns for one entity.
    pub async fn clear_entity(&self, entity: impl Into<EntityId>) -> Result<ClearReport> {
        let entity = entity.into();
        let report = ClearReport {
            entries: self.store.clear_for_entity(&entity).await?,
            entities: usize::from(self.store.forget_entity(&entity).await?),
        };
        info!(entity = %entity, entries = report.entries, "Cleared entity");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::MockAI;
    use crate::traits::ai::{AiExtraction, Enhancement};
    use crate::traits::store::{PatternStore, ResultCache};

    const RICH_TABLE: &str = r#"<table>
        <tr><td></td><td>Q1 2024</td><td>Q1 2023</td></tr>
        <tr><td>Total revenue</td><td>450,561</td><td>368,279</td></tr>
        <tr><td>Cost of revenue</td><td>119,848</td><td>89,456</td></tr>
        <tr><td>Gross profit</td><td>330,713</td><td>278,823</td></tr>
        <tr><td>Research and development</td><td>150,001</td><td>120,002</td></tr>
        <tr><td>Sales and marketing</td><td>200,003</td><td>180,004</td></tr>
        <tr><td>Net loss</td><td>(80,570)</td><td>(54,484)</td></tr>
    </table>"#;

    fn filing_with_tables(count: usize) -> String {
        let filler = "<table><tr><td>Shares</td><td>1</td><td>2</td></tr></table>";
        let mut html = String::from(RICH_TABLE);
        for _ in 1..count {
            html.push_str(filler);
        }
        html
    }

    fn ai_result() -> ExtractionResult {
        ExtractionResult::new()
            .with_periods(["Q1 2024"])
            .with_line("Revenue", &[1.0])
            .with_line("Gross profit", &[2.0])
            .with_line("Net loss", &[-3.0])
    }

    #[tokio::test]
    async fn test_second_extract_is_served_from_cache() {
        let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_result());
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());
        let html = "<p>Revenue was 1 and profit 2</p>";

        let first = extractor
            .extract(html, StatementType::IncomeStatement, "MDB")
            .await
            .unwrap();
        let second = extractor
            .extract(html, StatementType::IncomeStatement, "mdb")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ai.extraction_calls(), 1);
    }

    #[tokio::test]
    async fn test_pattern_first_skips_ai_with_enough_items() {
        let ai = MockAI::new();
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());

        let profile = ContentProfile::analyze(RICH_TABLE);
        assert_eq!(select_strategy(&profile), ExtractionStrategy::PatternFirst);

        let result = extractor
            .extract_income_statement(RICH_TABLE, "MDB")
            .await
            .unwrap();

        assert_eq!(result.item_count(), 6);
        assert_eq!(result.periods, vec!["Q1 2024", "Q1 2023"]);
        assert!(ai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unstructured_content_goes_to_ai_with_usage() {
        let ai = MockAI::new().with_ai_extraction(
            StatementType::IncomeStatement,
            AiExtraction::new(ai_result()).with_usage(TokenUsage::new(900, 120)),
        );
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());

        let result = extractor
            .extract("<p>No tables at all</p>", StatementType::IncomeStatement, "MDB")
            .await
            .unwrap();

        assert_eq!(result, ai_result());
        assert_eq!(ai.extraction_calls(), 1);

        let stats = extractor.stats().await.unwrap();
        assert_eq!(stats.last_token_usage, Some(TokenUsage::new(900, 120)));
        assert_eq!(stats.entities_learned, 1);
        assert_eq!(stats.cached_entries, 1);
        assert_eq!(stats.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_and_caches_empty_result() {
        let ai = MockAI::new().fail_extraction();
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());
        let html = "<p>Nothing here</p>";

        let result = extractor
            .extract(html, StatementType::CashFlow, "MDB")
            .await
            .unwrap();
        assert!(result.is_empty());

        // The empty result is cached, so the AI is not asked again
        extractor
            .extract(html, StatementType::CashFlow, "MDB")
            .await
            .unwrap();
        assert_eq!(ai.extraction_calls(), 1);
        assert_eq!(extractor.store().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hybrid_enhances_with_learned_context() {
        let enhancement = Enhancement {
            enhanced_data: [("Operating loss".to_string(), vec![None, None])]
                .into_iter()
                .collect(),
            corrections: [("Total revenue".to_string(), "Revenue".to_string())]
                .into_iter()
                .collect(),
            confidence_score: Some(0.9),
        };
        let ai = MockAI::new().with_enhancement(enhancement);
        let store = MemoryStore::new();
        store
            .learn(&EntityId::new("MDB"), &StatementType::IncomeStatement, &ai_result())
            .await
            .unwrap();
        let extractor = SmartExtractor::new(store, ai.clone());

        let html = filing_with_tables(3);
        assert_eq!(
            select_strategy(&ContentProfile::analyze(&html)),
            ExtractionStrategy::Hybrid
        );

        let result = extractor
            .extract_income_statement(&html, "MDB")
            .await
            .unwrap();

        assert_eq!(ai.enhance_calls(), 1);
        assert_eq!(result.line_items().next(), Some("Revenue"));
        assert!(result.data.contains_key("Operating loss"));
        assert!(!result.data.contains_key("Total revenue"));
    }

    #[tokio::test]
    async fn test_hybrid_without_context_skips_enhancement() {
        let ai = MockAI::new();
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());

        let result = extractor
            .extract_income_statement(&filing_with_tables(3), "MDB")
            .await
            .unwrap();

        assert_eq!(result.item_count(), 6);
        assert!(ai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_enhancement_keeps_pattern_result() {
        let ai = MockAI::new().fail_enhancement();
        let store = MemoryStore::new();
        store
            .learn(&EntityId::new("MDB"), &StatementType::IncomeStatement, &ai_result())
            .await
            .unwrap();
        let extractor = SmartExtractor::new(store, ai.clone());

        let result = extractor
            .extract_income_statement(&filing_with_tables(4), "MDB")
            .await
            .unwrap();

        assert_eq!(ai.enhance_calls(), 1);
        assert!(result.data.contains_key("Total revenue"));
    }

    #[tokio::test]
    async fn test_clear_entity_only_touches_that_entity() {
        let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_result());
        let extractor = SmartExtractor::new(MemoryStore::new(), ai.clone());
        let html = "<p>text</p>";

        extractor.extract_income_statement(html, "MDB").await.unwrap();
        extractor.extract_income_statement(html, "SNOW").await.unwrap();

        let report = extractor.clear_entity("mdb").await.unwrap();
        assert_eq!(report, ClearReport { entries: 1, entities: 1 });

        ai.clear_calls();
        extractor.extract_income_statement(html, "SNOW").await.unwrap();
        assert!(ai.calls().is_empty());

        let report = extractor.clear_cache().await.unwrap();
        assert_eq!(report, ClearReport { entries: 1, entities: 1 });
        assert_eq!(extractor.stats().await.unwrap().entities_learned, 0);
    }

    #[tokio::test]
    async fn test_targeted_ai_receives_context_and_truncated_content() {
        let ai = MockAI::new();
        let store = MemoryStore::new();
        store
            .learn(&EntityId::new("MDB"), &StatementType::IncomeStatement, &ai_result())
            .await
            .unwrap();
        let config = ExtractorConfig::default().with_truncate_chars(100);
        let extractor = SmartExtractor::with_config(store, ai.clone(), config);

        extractor
            .extract_income_statement(&"word ".repeat(200), "MDB")
            .await
            .unwrap();

        match &ai.calls()[0] {
            crate::testing::MockAICall::ExtractStatement {
                content_len,
                company_context,
                ..
            } => {
                assert_eq!(*content_len, 100);
                assert!(company_context.contains("LEARNED PATTERNS FOR MDB"));
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }
}
