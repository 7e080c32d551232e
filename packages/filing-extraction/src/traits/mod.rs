//! Core trait abstractions.

pub mod ai;
pub mod store;

pub use ai::AI;
pub use store::{ExtractionStore, PatternStore, ResultCache};
