//! Regex parser tier for scripts the AST parser cannot handle, typically
//! heavy vendor-dialect DDL. Matches the single `INSERT INTO ... SELECT ...
//! FROM ...` or `CREATE TABLE ... AS SELECT ... FROM ...` shape.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use lineage_types::{LineageError, Result};

use crate::{SqlLineageRecord, SqlParser};

fn insert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)insert\s+(?:overwrite\s+(?:table\s+)?|into\s+)([a-zA-Z0-9_.]+).*?select\s+(.*?)\s+from\s+([a-zA-Z0-9_.]+)")
            .expect("insert pattern compiles")
    })
}

fn ctas_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)create\s+table\s+(?:if\s+not\s+exists\s+)?([a-zA-Z0-9_.]+)\s+as\s+select\s+(.*?)\s+from\s+([a-zA-Z0-9_.]+)")
            .expect("ctas pattern compiles")
    })
}

fn alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\s+as\s+.*$").expect("alias pattern compiles"))
}

/// Best-effort single-statement matcher. Column names are a naive comma
/// split of the projection text with any `AS alias` suffix stripped, so
/// function calls with commas inside will come out mangled; the AST tier is
/// the one to ask for those.
#[derive(Debug, Default)]
pub struct PatternParser;

impl PatternParser {
    pub fn new() -> Self {
        Self
    }
}

impl SqlParser for PatternParser {
    fn parse(&self, sql: &str) -> Result<SqlLineageRecord> {
        let captures = insert_re()
            .captures(sql)
            .or_else(|| ctas_re().captures(sql))
            .ok_or_else(|| {
                LineageError::SqlParse("no insert/ctas shape matched".to_string())
            })?;

        let mut record = SqlLineageRecord {
            destination: Some(captures[1].to_string()),
            sources: BTreeSet::from([captures[3].to_string()]),
            ..Default::default()
        };
        record.columns = captures[2]
            .split(',')
            .map(|col| alias_re().replace(col.trim(), "").into_owned())
            .filter(|col| !col.is_empty())
            .collect();
        Ok(record.finish())
    }
}
