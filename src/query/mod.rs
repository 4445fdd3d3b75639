//! Parsed query descriptors and the external parser contract.
//!
//! The SQL dialect parser itself lives outside this crate; everything
//! here consumes its output. A [`ParsedQuery`] is immutable, cached by
//! origin text and shared by every caller using identical SQL.

pub mod params;

use std::collections::BTreeMap;

use crate::config::ClientConfig;
use crate::error::StrataResult;
use crate::types::StrataType;

/// Parameter name to remote type, as resolved by a server prepare or a
/// table description round trip. Keyed and iterated in name order.
pub type ResolvedTypes = BTreeMap<String, StrataType>;

/// Statement classification, drives execution routing in the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// DDL: create/alter/drop.
    Schema,
    /// DML and reads inside a transaction.
    Data,
    /// Read-only full scan channel.
    Scan,
    /// Plan inspection.
    Explain,
}

/// One syntactic placeholder the parser found in the SQL text.
///
/// A positional `?` becomes a single named slot; `IN (?, ?, ..., ?)`
/// collapses into one list parameter spread over `len` caller slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderSpec {
    Simple { name: String },
    InList { name: String, len: usize },
}

impl PlaceholderSpec {
    /// How many caller-visible slots this placeholder occupies.
    pub fn slot_count(&self) -> usize {
        match self {
            PlaceholderSpec::Simple { .. } => 1,
            PlaceholderSpec::InList { len, .. } => *len,
        }
    }
}

/// Syntactic detection of a bulk-upsert shape: the whole statement can
/// be sent as one list-of-struct parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHint {
    /// Name of the single list parameter.
    pub param_name: String,
    /// Target table, absolute or relative to the database root.
    pub table: String,
    /// Struct member names in statement order.
    pub columns: Vec<String>,
}

/// Immutable result of parsing one SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    origin_sql: String,
    prepared_sql: String,
    kind: QueryKind,
    batch_hint: Option<BatchHint>,
    placeholders: Vec<PlaceholderSpec>,
}

impl ParsedQuery {
    pub fn new(
        origin_sql: impl Into<String>,
        prepared_sql: impl Into<String>,
        kind: QueryKind,
    ) -> Self {
        Self {
            origin_sql: origin_sql.into(),
            prepared_sql: prepared_sql.into(),
            kind,
            batch_hint: None,
            placeholders: Vec::new(),
        }
    }

    pub fn with_batch_hint(mut self, hint: BatchHint) -> Self {
        self.batch_hint = Some(hint);
        self
    }

    pub fn with_placeholders(mut self, placeholders: Vec<PlaceholderSpec>) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// The SQL text as the caller wrote it; the cache key.
    pub fn origin_sql(&self) -> &str {
        &self.origin_sql
    }

    /// The rewritten text sent to the server.
    pub fn prepared_sql(&self) -> &str {
        &self.prepared_sql
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn batch_hint(&self) -> Option<&BatchHint> {
        self.batch_hint.as_ref()
    }

    pub fn placeholders(&self) -> &[PlaceholderSpec] {
        &self.placeholders
    }

    /// True when the text uses native named parameters only, with no
    /// client-side placeholder rewriting. Only such statements can be
    /// prepared server-side.
    pub fn is_plain(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Total caller-visible slot count of the placeholder plan.
    pub fn slot_count(&self) -> usize {
        self.placeholders.iter().map(PlaceholderSpec::slot_count).sum()
    }
}

/// Dialect options handed to the external parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Whether the parser should look for bulk-upsert shapes.
    pub detect_auto_batch: bool,
}

impl From<&ClientConfig> for QueryOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            detect_auto_batch: config.auto_batch_detection,
        }
    }
}

/// External SQL dialect parser.
///
/// Implementations turn raw text into a [`ParsedQuery`] or a
/// `parse-error`; they never perform I/O.
pub trait QueryParser: Send + Sync {
    fn parse(&self, sql: &str, options: &QueryOptions) -> StrataResult<ParsedQuery>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_count_expands_in_lists() {
        let query = ParsedQuery::new("SELECT 1", "SELECT 1", QueryKind::Data).with_placeholders(
            vec![
                PlaceholderSpec::Simple {
                    name: "$jp1".into(),
                },
                PlaceholderSpec::InList {
                    name: "$jp2".into(),
                    len: 3,
                },
            ],
        );
        assert_eq!(query.slot_count(), 4);
        assert!(!query.is_plain());
    }

    #[test]
    fn test_plain_query_has_no_placeholders() {
        let query = ParsedQuery::new(
            "UPSERT INTO t SELECT * FROM AS_TABLE($rows)",
            "UPSERT INTO t SELECT * FROM AS_TABLE($rows)",
            QueryKind::Data,
        );
        assert!(query.is_plain());
        assert_eq!(query.slot_count(), 0);
    }
}
