//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Content profiling and strategy selection (Hybrid/PatternFirst/TargetedAi)
//! - Pattern-based table extraction with cell normalization
//! - Budgeted truncation of content sent to the AI
//! - The cached extraction flow (cache → strategy → learn → cache)

pub mod extractor;
pub mod numbers;
pub mod strategy;
pub mod tables;
pub mod truncate;

pub use extractor::{ClearReport, ExtractionStats, PreviewSource, SmartExtractor};
pub use numbers::{normalize_cell, parse_number};
pub use strategy::{select_strategy, ContentProfile, ExtractionStrategy};
pub use tables::{html_to_text, pattern_extract, ParsedTable};
pub use truncate::smart_truncate;
