//! Cache key types - entities, statement types, and content fingerprints.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{ExtractionError, Result};

/// A company or ticker identifier.
///
/// Normalized on construction (trimmed, upper-cased) so lookups are
/// insensitive to the way a user typed the ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a normalized entity id.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// The normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Kind of financial statement being extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    GaapReconciliation,
    /// Any other statement name, stored in snake_case.
    Other(String),
}

impl StatementType {
    /// Stable snake_case name used in storage keys.
    pub fn as_str(&self) -> &str {
        match self {
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow_statement",
            Self::GaapReconciliation => "gaap_reconciliation",
            Self::Other(name) => name,
        }
    }

    /// Parse a statement name. Accepts a few common aliases.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");

        match normalized.as_str() {
            "income_statement" | "income" => Self::IncomeStatement,
            "balance_sheet" | "balance" => Self::BalanceSheet,
            "cash_flow_statement" | "cash_flow" | "cashflow" => Self::CashFlow,
            "gaap_reconciliation" | "reconciliation" => Self::GaapReconciliation,
            _ => Self::Other(normalized),
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StatementType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<StatementType> for String {
    fn from(s: StatementType) -> Self {
        s.as_str().to_string()
    }
}

/// SHA-256 fingerprint of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprint document content.
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an existing hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into().to_lowercase();
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExtractionError::InvalidKey {
                reason: format!("fingerprint is not hex: {hex:?}"),
            });
        }
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one cached extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Company the result belongs to
    pub entity: EntityId,

    /// Statement that was extracted
    pub statement: StatementType,

    /// Fingerprint of the source document
    pub fingerprint: ContentFingerprint,
}

impl CacheKey {
    /// Build a key from raw document content.
    pub fn new(entity: impl Into<EntityId>, statement: StatementType, content: &str) -> Self {
        Self {
            entity: entity.into(),
            statement,
            fingerprint: ContentFingerprint::of(content),
        }
    }

    /// Build a key from an existing fingerprint.
    pub fn with_fingerprint(
        entity: impl Into<EntityId>,
        statement: StatementType,
        fingerprint: ContentFingerprint,
    ) -> Self {
        Self {
            entity: entity.into(),
            statement,
            fingerprint,
        }
    }

    /// Whether the key references the given entity.
    pub fn references(&self, entity: &EntityId) -> bool {
        &self.entity == entity
    }

    /// Stable name usable as a file stem or primary key.
    ///
    /// Statement names and entities are percent-encoded down to
    /// `[A-Za-z0-9.-]`, so the name is a single path component and distinct
    /// keys never share a name.
    pub fn storage_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.fingerprint,
            escape(self.statement.as_str()),
            escape(self.entity.as_str())
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.entity,
            self.statement,
            &self.fingerprint.as_str()[..self.fingerprint.as_str().len().min(12)]
        )
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9.-]`. `_` is always
/// encoded since it separates the parts of a storage name.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
