//! Integration tests for the cached extraction flow.
//!
//! These tests verify the full workflow against a persisted cache:
//! 1. Extract (pattern or AI)
//! 2. Learn entity patterns
//! 3. Cache the result on disk
//! 4. Serve repeats from the cache, across reopen
//! 5. Clear by entity or entirely
//! 6. Preview without learning or caching

use filing_extraction::{
    stores::file::PATTERNS_FILE,
    testing::{MockAI, MockAICall},
    CacheConfig, EntityId, ExtractionResult, FileStore, PatternStore, PreviewSource, ResultCache,
    SmartExtractor, StatementType,
};

const EARNINGS_RELEASE: &str = r#"
<html><body>
<p>MongoDB, Inc. Announces First Quarter Fiscal 2025 Financial Results</p>
<table>
  <tr><td></td><td colspan="2">Three Months Ended April 30,</td></tr>
  <tr><td></td><td>2024</td><td>2023</td></tr>
  <tr><td>Revenue:</td><td></td><td></td></tr>
  <tr><td>Subscription</td><td>$</td><td>435,406</td><td>$</td><td>353,591</td></tr>
  <tr><td>Services</td><td>15,155</td><td>14,688</td></tr>
  <tr><td>Total revenue</td><td>450,561</td><td>368,279</td></tr>
  <tr><td>Cost of revenue</td><td>119,848</td><td>89,456</td></tr>
  <tr><td>Gross profit</td><td>330,713</td><td>278,823</td></tr>
  <tr><td>Sales and marketing</td><td>199,447</td><td>180,113</td></tr>
  <tr><td>Research and development</td><td>156,911</td><td>124,521</td></tr>
  <tr><td>General and administrative</td><td>62,112</td><td>51,402</td></tr>
  <tr><td>Loss from operations</td><td>(87,757</td><td>)</td><td>(77,213</td><td>)</td></tr>
  <tr><td>Net loss</td><td>$</td><td>(80,570</td><td>)</td><td>$</td><td>(54,484</td><td>)</td></tr>
</table>
</body></html>
"#;

fn ai_income() -> ExtractionResult {
    ExtractionResult::new()
        .with_periods(["Q1 FY2025"])
        .with_line("Total revenue", &[450561.0])
        .with_line("Gross profit", &[330713.0])
        .with_line("Net loss", &[-80570.0])
}

#[tokio::test]
async fn test_pattern_extraction_is_cached_and_learned() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().with_cache_dir(dir.path());
    let ai = MockAI::new();

    let extractor = SmartExtractor::new(FileStore::open(&config).await.unwrap(), ai.clone());
    let result = extractor
        .extract_income_statement(EARNINGS_RELEASE, "MDB")
        .await
        .unwrap();

    assert_eq!(result.periods, vec!["2024", "2023"]);
    assert_eq!(result.item_count(), 10);
    assert!(ai.calls().is_empty());
    assert!(dir.path().join(PATTERNS_FILE).exists());

    let pattern = extractor
        .store()
        .patterns_for(&EntityId::new("mdb"), &StatementType::IncomeStatement)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pattern.extraction_count, 1);
    assert_eq!(pattern.common_line_items.len(), 10);
    assert_eq!(pattern.period_formats, vec!["2024", "2023"]);
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().with_cache_dir(dir.path());
    let content = "<p>Revenue grew to 450,561</p>";

    let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_income());
    let first = SmartExtractor::new(FileStore::open(&config).await.unwrap(), ai.clone());
    let cached = first
        .extract_income_statement(content, "MDB")
        .await
        .unwrap();
    assert_eq!(ai.extraction_calls(), 1);
    drop(first);

    let ai = MockAI::new();
    let reopened = SmartExtractor::new(FileStore::open(&config).await.unwrap(), ai.clone());
    let again = reopened
        .extract_income_statement(content, "MDB")
        .await
        .unwrap();

    assert_eq!(again, cached);
    assert!(ai.calls().is_empty());
    assert_eq!(reopened.stats().await.unwrap().entities_learned, 1);
}

#[tokio::test]
async fn test_learned_context_reaches_later_ai_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::new().with_cache_dir(dir.path());
    let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_income());
    let extractor = SmartExtractor::new(FileStore::open(&config).await.unwrap(), ai.clone());

    extractor
        .extract_income_statement("<p>Quarter one</p>", "MDB")
        .await
        .unwrap();
    extractor
        .extract_income_statement("<p>Quarter two</p>", "MDB")
        .await
        .unwrap();

    let contexts: Vec<String> = ai
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            MockAICall::ExtractStatement {
                company_context, ..
            } => Some(company_context),
            _ => None,
        })
        .collect();

    assert_eq!(contexts.len(), 2);
    assert!(contexts[0].is_empty());
    assert!(contexts[1].contains("Common line items: Total revenue, Gross profit, Net loss"));
    assert!(contexts[1].contains("Previous extractions: 1"));
}

#[tokio::test]
async fn test_statements_are_cached_separately() {
    let ai = MockAI::new()
        .with_extraction(StatementType::IncomeStatement, ai_income())
        .with_extraction(
            StatementType::BalanceSheet,
            ExtractionResult::new().with_line("Total assets", &[1.0]),
        );
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open_dir(dir.path()).await.unwrap();
    let extractor = SmartExtractor::new(store, ai.clone());
    let content = "<p>Combined release</p>";

    let income = extractor.extract_income_statement(content, "MDB").await.unwrap();
    let balance = extractor.extract_balance_sheet(content, "MDB").await.unwrap();

    assert_ne!(income, balance);
    assert_eq!(extractor.store().len().await.unwrap(), 2);
    assert_eq!(ai.extraction_calls(), 2);
}

#[tokio::test]
async fn test_clear_entity_then_clear_all() {
    let dir = tempfile::tempdir().unwrap();
    let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_income());
    let extractor = SmartExtractor::new(FileStore::open_dir(dir.path()).await.unwrap(), ai.clone());

    for entity in ["MDB", "SNOW", "CRWD"] {
        extractor
            .extract_income_statement("<p>release</p>", entity)
            .await
            .unwrap();
    }
    assert_eq!(extractor.store().len().await.unwrap(), 3);

    let report = extractor.clear_entity("snow").await.unwrap();
    assert_eq!(report.entries, 1);
    assert_eq!(
        extractor.store().entities().await.unwrap(),
        vec![EntityId::new("CRWD"), EntityId::new("MDB")]
    );

    let report = extractor.clear_cache().await.unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(report.entities, 2);
    assert!(extractor.store().is_empty().await.unwrap());
    assert!(!dir.path().join(PATTERNS_FILE).exists());
}

#[tokio::test]
async fn test_preview_leaves_persisted_cache_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let ai = MockAI::new().fail_extraction();
    let extractor = SmartExtractor::new(FileStore::open_dir(dir.path()).await.unwrap(), ai.clone());

    let (source, result) = extractor
        .preview(EARNINGS_RELEASE, StatementType::IncomeStatement, "MDB")
        .await
        .unwrap();

    assert_eq!(source, PreviewSource::Patterns);
    assert_eq!(result.item_count(), 10);
    assert!(ai.calls().is_empty());
    assert!(extractor.store().is_empty().await.unwrap());
    assert!(extractor.store().entities().await.unwrap().is_empty());
    assert!(!dir.path().join(PATTERNS_FILE).exists());
}

#[tokio::test]
async fn test_preview_does_not_shadow_later_ai_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let content = "<p>Revenue grew to 450,561</p>";

    let offline = SmartExtractor::new(
        FileStore::open_dir(dir.path()).await.unwrap(),
        MockAI::new().fail_extraction(),
    );
    let (_, degraded) = offline
        .preview(content, StatementType::IncomeStatement, "MDB")
        .await
        .unwrap();
    assert!(degraded.is_empty());
    drop(offline);

    let ai = MockAI::new().with_extraction(StatementType::IncomeStatement, ai_income());
    let online = SmartExtractor::new(FileStore::open_dir(dir.path()).await.unwrap(), ai.clone());
    let result = online.extract_income_statement(content, "MDB").await.unwrap();

    assert_eq!(result, ai_income());
    assert_eq!(ai.extraction_calls(), 1);

    let (source, cached) = online
        .preview(content, StatementType::IncomeStatement, "MDB")
        .await
        .unwrap();
    assert_eq!(source, PreviewSource::Cache);
    assert_eq!(cached, ai_income());
}
