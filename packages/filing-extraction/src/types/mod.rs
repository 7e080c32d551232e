//! Data types for cached extractions and learned patterns.

pub mod config;
pub mod entry;
pub mod key;
pub mod pattern;
pub mod result;
