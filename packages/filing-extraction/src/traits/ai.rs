//! AI trait for LLM-backed statement extraction.
//!
//! The AI trait abstracts the two model calls the extractor makes:
//! - Targeted extraction of a statement from (truncated) filing content
//! - Enhancement of a pattern-based result using learned company context

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::{
    key::{EntityId, StatementType},
    result::{CellValue, ExtractionResult},
};

/// AI trait for LLM operations.
///
/// Implementations wrap specific LLM providers and handle prompting and
/// response parsing. The extractor treats every error as recoverable and
/// falls back to pattern-based results.
#[async_trait]
pub trait AI: Send + Sync {
    /// Extract a statement from document content.
    async fn extract_statement(&self, request: &ExtractionRequest) -> Result<AiExtraction>;

    /// Validate and enhance an existing extraction using learned context.
    async fn enhance(&self, request: &EnhancementRequest) -> Result<Enhancement>;
}

/// Input for targeted extraction.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub statement: StatementType,
    pub entity: EntityId,
    /// Content already truncated to the configured budget
    pub content: String,
    /// Learned context block, empty when nothing is known
    pub company_context: String,
    pub model: String,
}

/// Input for enhancement.
#[derive(Debug, Clone)]
pub struct EnhancementRequest {
    pub statement: StatementType,
    pub entity: EntityId,
    pub base: ExtractionResult,
    pub company_context: String,
    /// Leading excerpt of the source document
    pub excerpt: String,
    pub model: String,
}

/// Result of a targeted extraction.
#[derive(Debug, Clone, Default)]
pub struct AiExtraction {
    pub result: ExtractionResult,
    pub usage: Option<TokenUsage>,
}

impl AiExtraction {
    pub fn new(result: ExtractionResult) -> Self {
        Self {
            result,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prompt: {}, Completion: {}, Total: {}",
            self.prompt_tokens,
            self.completion_tokens,
            self.total()
        )
    }
}

/// Enhancement returned by the AI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enhancement {
    /// Line items to add or overwrite
    #[serde(default)]
    pub enhanced_data: IndexMap<String, Vec<Option<CellValue>>>,

    /// Label renames, old -> new
    #[serde(default)]
    pub corrections: IndexMap<String, String>,

    #[serde(default)]
    pub confidence_score: Option<f32>,
}

impl Enhancement {
    /// Apply to a base result: merge `enhanced_data`, then rename.
    pub fn apply_to(&self, base: &ExtractionResult) -> ExtractionResult {
        let mut enhanced = base.clone();

        for (label, values) in &self.enhanced_data {
            enhanced.data.insert(label.clone(), values.clone());
        }

        for (old, new) in &self.corrections {
            enhanced.rename_line(old, new);
        }

        enhanced
    }
}
