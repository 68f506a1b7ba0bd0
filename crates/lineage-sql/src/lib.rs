//! Table-level SQL lineage extraction.
//!
//! Two parser tiers share one record shape: [`ast::AstParser`] walks a real
//! SQL syntax tree, [`pattern::PatternParser`] falls back to regex matching
//! for scripts the AST parser cannot handle. [`store::SqlLineageStore`]
//! persists extracted records as JSON lines keyed by pipeline, job, and step.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use lineage_types::Result;

pub mod ast;
pub mod pattern;
pub mod store;

pub use ast::AstParser;
pub use pattern::PatternParser;
pub use store::{SqlLineageEntry, SqlLineageStore};

/// Table-level lineage of one SQL script: the written table, the tables read,
/// and the projected column names of the driving SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqlLineageRecord {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub sources: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl SqlLineageRecord {
    /// A record is useful when it names at least one end of the lineage.
    pub fn finish(mut self) -> Self {
        self.ok = self.destination.is_some() || !self.sources.is_empty();
        self
    }
}

/// One parsing strategy. Implementations return an error for scripts they
/// cannot parse at all; partial understanding is expressed through the record
/// itself.
pub trait SqlParser: Send + Sync {
    fn parse(&self, sql: &str) -> Result<SqlLineageRecord>;
}

/// Facade over a chosen parser tier. Extraction never fails: scripts the
/// parser rejects come back as a not-ok record so batch callers can keep
/// going.
pub struct SqlLineageExtractor {
    parser: Box<dyn SqlParser>,
}

impl SqlLineageExtractor {
    pub fn new(parser: Box<dyn SqlParser>) -> Self {
        Self { parser }
    }

    /// AST tier with a dialect hint such as `hive` or `postgres`. Unknown
    /// hints fall back to the generic dialect.
    pub fn ast(dialect: &str) -> Self {
        Self::new(Box::new(AstParser::new(dialect)))
    }

    /// Regex tier for scripts too dialect-bent for the AST parser.
    pub fn pattern() -> Self {
        Self::new(Box::new(PatternParser::new()))
    }

    pub fn extract(&self, sql: &str) -> SqlLineageRecord {
        match self.parser.parse(sql) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(error = %err, "sql script not parseable");
                SqlLineageRecord::default()
            }
        }
    }

    /// Extract every script, keeping only the records that carried lineage.
    pub fn extract_all<'a>(
        &self,
        scripts: impl IntoIterator<Item = &'a str>,
    ) -> Vec<SqlLineageRecord> {
        scripts
            .into_iter()
            .map(|sql| self.extract(sql))
            .filter(|record| record.ok)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_requires_a_destination_or_a_source() {
        assert!(!SqlLineageRecord::default().finish().ok);
        let with_dest = SqlLineageRecord {
            destination: Some("t".into()),
            ..Default::default()
        };
        assert!(with_dest.finish().ok);
        let with_source = SqlLineageRecord {
            sources: BTreeSet::from(["s".to_string()]),
            ..Default::default()
        };
        assert!(with_source.finish().ok);
    }

    #[test]
    fn extractor_turns_parse_failures_into_not_ok_records() {
        let extractor = SqlLineageExtractor::ast("generic");
        let record = extractor.extract("this is not sql at all (");
        assert!(!record.ok);
        assert!(record.destination.is_none());
    }

    #[test]
    fn extract_all_drops_records_without_lineage() {
        let extractor = SqlLineageExtractor::ast("generic");
        let records = extractor.extract_all([
            "INSERT INTO sales.totals SELECT customer_id, amount FROM sales.raw",
            "SELECT 1",
            "garbage ((",
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].destination.as_deref(), Some("sales.totals"));
    }
}
