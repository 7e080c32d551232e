//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction cache
//! without making real AI calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{ExtractionError, Result};
use crate::traits::ai::{
    AiExtraction, Enhancement, EnhancementRequest, ExtractionRequest, AI,
};
use crate::types::{
    key::{EntityId, StatementType},
    result::ExtractionResult,
};

/// A mock AI implementation for testing.
///
/// Returns deterministic, configurable responses. Unknown statements
/// extract to an empty result and enhancement changes nothing unless an
/// enhancement is configured.
#[derive(Default, Clone)]
pub struct MockAI {
    /// Predefined extractions by statement
    extractions: Arc<RwLock<HashMap<StatementType, AiExtraction>>>,

    /// Predefined enhancement
    enhancement: Arc<RwLock<Option<Enhancement>>>,

    /// Failure switches
    fail_extraction: Arc<RwLock<bool>>,
    fail_enhancement: Arc<RwLock<bool>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockAICall>>>,
}

/// Record of a call made to the mock AI.
#[derive(Debug, Clone, PartialEq)]
pub enum MockAICall {
    ExtractStatement {
        statement: StatementType,
        entity: EntityId,
        content_len: usize,
        company_context: String,
    },
    Enhance {
        statement: StatementType,
        entity: EntityId,
        base_items: usize,
        excerpt_len: usize,
    },
}

impl MockAI {
    /// Create a new mock AI with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined extraction for a statement.
    pub fn with_extraction(self, statement: StatementType, result: ExtractionResult) -> Self {
        self.extractions
            .write()
            .unwrap()
            .insert(statement, AiExtraction::new(result));
        self
    }

    /// Add a predefined extraction including token usage.
    pub fn with_ai_extraction(self, statement: StatementType, extraction: AiExtraction) -> Self {
        self.extractions
            .write()
            .unwrap()
            .insert(statement, extraction);
        self
    }

    /// Set the enhancement returned for every request.
    pub fn with_enhancement(self, enhancement: Enhancement) -> Self {
        *self.enhancement.write().unwrap() = Some(enhancement);
        self
    }

    /// Make every extraction call fail.
    pub fn fail_extraction(self) -> Self {
        *self.fail_extraction.write().unwrap() = true;
        self
    }

    /// Make every enhancement call fail.
    pub fn fail_enhancement(self) -> Self {
        *self.fail_enhancement.write().unwrap() = true;
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockAICall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of extraction calls made.
    pub fn extraction_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockAICall::ExtractStatement { .. }))
            .count()
    }

    /// Number of enhancement calls made.
    pub fn enhance_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockAICall::Enhance { .. }))
            .count()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl AI for MockAI {
    async fn extract_statement(&self, request: &ExtractionRequest) -> Result<AiExtraction> {
        self.calls
            .write()
            .unwrap()
            .push(MockAICall::ExtractStatement {
                statement: request.statement.clone(),
                entity: request.entity.clone(),
                content_len: request.content.chars().count(),
                company_context: request.company_context.clone(),
            });

        if *self.fail_extraction.read().unwrap() {
            return Err(ExtractionError::AI(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Mock connection refused",
            ))));
        }

        Ok(self
            .extractions
            .read()
            .unwrap()
            .get(&request.statement)
            .cloned()
            .unwrap_or_default())
    }

    async fn enhance(&self, request: &EnhancementRequest) -> Result<Enhancement> {
        self.calls.write().unwrap().push(MockAICall::Enhance {
            statement: request.statement.clone(),
            entity: request.entity.clone(),
            base_items: request.base.item_count(),
            excerpt_len: request.excerpt.chars().count(),
        });

        if *self.fail_enhancement.read().unwrap() {
            return Err(ExtractionError::ai("Mock enhancement failed"));
        }

        Ok(self
            .enhancement
            .read()
            .unwrap()
            .clone()
            .unwrap_or_default())
    }
}
