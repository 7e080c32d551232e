//! CLI for operating on a persisted extraction cache.
//!
//! Works on the `extraction_cache/` directory written by `FileStore`.
//! Extraction from the CLI is read-only: it shows a live cached result if
//! there is one, otherwise what pattern extraction yields. No AI provider
//! is wired in, and nothing is learned or written back to the cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filing_extraction::{
    api_key_configured, AiExtraction, CacheConfig, CellValue, Enhancement, EnhancementRequest,
    EntityId, ExtractionError, ExtractionRequest, ExtractionResult, ExtractorConfig, FileStore,
    PatternStore, PreviewSource, ResultCache, SmartExtractor, StatementType, AI,
};

#[derive(Parser)]
#[command(name = "extraction-cache")]
#[command(about = "Inspect and maintain the financial statement extraction cache")]
struct Cli {
    /// Cache directory (defaults to EXTRACTION_CACHE_DIR or ./extraction_cache)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache and learning statistics
    Stats,

    /// Remove cached results and learned patterns
    Clear {
        /// Only clear this entity
        #[arg(long)]
        entity: Option<String>,
    },

    /// Remove expired entries
    Purge,

    /// Show learned patterns
    Patterns {
        /// Only show this entity
        entity: Option<String>,
    },

    /// Extract a statement from a local HTML file
    Extract {
        file: PathBuf,

        #[arg(long)]
        entity: String,

        /// income_statement, balance_sheet, cash_flow_statement, gaap_reconciliation
        #[arg(long, default_value = "income_statement")]
        statement: String,
    },
}

const NO_PROVIDER: &str = "no AI provider configured for CLI extraction";

/// AI stand-in for the CLI. The CLI only runs cache maintenance and
/// `SmartExtractor::preview`, neither of which calls the AI.
struct OfflineAI;

#[async_trait]
impl AI for OfflineAI {
    async fn extract_statement(
        &self,
        _request: &ExtractionRequest,
    ) -> filing_extraction::Result<AiExtraction> {
        Err(ExtractionError::ai(NO_PROVIDER))
    }

    async fn enhance(
        &self,
        _request: &EnhancementRequest,
    ) -> filing_extraction::Result<Enhancement> {
        Err(ExtractionError::ai(NO_PROVIDER))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,filing_extraction=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let mut cache_config = CacheConfig::from_env().context("Invalid cache configuration")?;
    if let Some(dir) = cli.cache_dir {
        cache_config = cache_config.with_cache_dir(dir);
    }

    let store = FileStore::open(&cache_config)
        .await
        .with_context(|| format!("Failed to open cache at {}", cache_config.cache_dir.display()))?;
    tracing::debug!(dir = %cache_config.cache_dir.display(), "Opened extraction cache");
    let extractor = SmartExtractor::with_config(store, OfflineAI, ExtractorConfig::from_env());

    match cli.command {
        Commands::Stats => stats(&extractor, &cache_config, cli.json).await,
        Commands::Clear { entity } => clear(&extractor, entity, cli.json).await,
        Commands::Purge => purge(&extractor, cli.json).await,
        Commands::Patterns { entity } => patterns(&extractor, entity, cli.json).await,
        Commands::Extract {
            file,
            entity,
            statement,
        } => extract(&extractor, file, entity, statement, cli.json).await,
    }
}

type Extractor = SmartExtractor<FileStore, OfflineAI>;

async fn stats(extractor: &Extractor, config: &CacheConfig, json: bool) -> Result<()> {
    let stats = extractor.stats().await.context("Failed to read cache stats")?;
    let key_configured = api_key_configured();

    if json {
        let mut value = serde_json::to_value(&stats)?;
        value["cache_dir"] = config.cache_dir.display().to_string().into();
        value["ttl_hours"] = config.ttl_hours.into();
        value["api_key_configured"] = key_configured.into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "Extraction cache".bright_cyan().bold());
    println!("  {:<18} {}", "Directory:", config.cache_dir.display());
    println!("  {:<18} {}h", "TTL:", config.ttl_hours);
    println!("  {:<18} {}", "Cached entries:", stats.cached_entries);
    println!("  {:<18} {}", "Entities learned:", stats.entities_learned);
    println!("  {:<18} {}", "Model:", stats.model);
    println!(
        "  {:<18} {}",
        "API key:",
        if key_configured {
            "configured".green()
        } else {
            "not set".yellow()
        }
    );
    Ok(())
}

async fn clear(extractor: &Extractor, entity: Option<String>, json: bool) -> Result<()> {
    let report = match &entity {
        Some(entity) => extractor.clear_entity(entity.as_str()).await,
        None => extractor.clear_cache().await,
    }
    .context("Failed to clear cache")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let scope = entity
            .map(|e| EntityId::new(e).to_string())
            .unwrap_or_else(|| "all entities".to_string());
        println!(
            "{} {} cached results and {} learned pattern sets for {}",
            "Cleared".green().bold(),
            report.entries,
            report.entities,
            scope
        );
    }
    Ok(())
}

async fn purge(extractor: &Extractor, json: bool) -> Result<()> {
    let removed = extractor
        .store()
        .purge_expired()
        .await
        .context("Failed to purge expired entries")?;
    let remaining = extractor.store().len().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "removed": removed, "remaining": remaining })
        );
    } else {
        println!(
            "{} {} expired entries ({} remaining)",
            "Purged".green().bold(),
            removed,
            remaining
        );
    }
    Ok(())
}

async fn patterns(extractor: &Extractor, entity: Option<String>, json: bool) -> Result<()> {
    let store = extractor.store();
    let entities = match entity {
        Some(e) => vec![EntityId::new(e)],
        None => store.entities().await?,
    };

    let mut all = serde_json::Map::new();
    for entity in &entities {
        let Some(patterns) = store.patterns_for_entity(entity).await? else {
            if !json {
                println!("{} no learned patterns", entity.as_str().yellow());
            }
            continue;
        };

        if json {
            all.insert(entity.to_string(), serde_json::to_value(&patterns)?);
            continue;
        }

        println!("{}", entity.as_str().bright_cyan().bold());
        for (statement, pattern) in &patterns {
            println!(
                "  {} ({} extractions, updated {})",
                statement.to_string().bold(),
                pattern.extraction_count,
                pattern.updated_at.format("%Y-%m-%d %H:%M")
            );
            println!("    line items: {}", pattern.common_line_items.join(", "));
            println!("    periods:    {}", pattern.period_formats.join(", "));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else if entities.is_empty() {
        println!("{}", "No learned patterns".dimmed());
    }
    Ok(())
}

async fn extract(
    extractor: &Extractor,
    file: PathBuf,
    entity: String,
    statement: String,
    json: bool,
) -> Result<()> {
    let html = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let statement = StatementType::parse(&statement);

    let (source, result) = extractor
        .preview(&html, statement.clone(), entity.as_str())
        .await
        .context("Extraction failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "source": source,
                "result": result,
            }))?
        );
    } else {
        print_result(&statement, &EntityId::new(&entity), source, &result);
    }
    Ok(())
}

fn print_result(
    statement: &StatementType,
    entity: &EntityId,
    source: PreviewSource,
    result: &ExtractionResult,
) {
    let source = match source {
        PreviewSource::Cache => "cached",
        PreviewSource::Patterns => "patterns only, not cached",
    };
    println!(
        "{} {} for {} ({})",
        "Extracted".green().bold(),
        statement,
        entity.as_str().bright_cyan(),
        source.dimmed()
    );

    if result.is_empty() {
        println!("{}", "  No line items found".yellow());
        return;
    }

    let width = result.line_items().map(str::len).max().unwrap_or(0);
    println!("  {:<width$}  {}", "", result.periods.join("  ").bold());
    for (label, values) in &result.data {
        let cells: Vec<String> = values.iter().map(format_cell).collect();
        println!("  {label:<width$}  {}", cells.join("  "));
    }
}

fn format_cell(value: &Option<CellValue>) -> String {
    match value {
        Some(CellValue::Number(n)) => format!("{n}"),
        Some(CellValue::Text(t)) => t.clone(),
        None => "-".to_string(),
    }
}
