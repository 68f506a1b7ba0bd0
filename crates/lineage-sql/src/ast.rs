//! AST parser tier, built on `sqlparser`.

use std::collections::BTreeSet;

use sqlparser::ast::{
    ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableObject,
    TableWithJoins,
};
use sqlparser::dialect::{
    Dialect, GenericDialect, HiveDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;

use lineage_types::{LineageError, Result};

use crate::{SqlLineageRecord, SqlParser};

/// Walks the parsed statement list of a script. The destination is the first
/// table written by a CTAS or INSERT; every other table referenced anywhere
/// in the script counts as a source, minus CTE names, which are local to the
/// script.
pub struct AstParser {
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl AstParser {
    pub fn new(dialect: &str) -> Self {
        Self {
            dialect: dialect_for(dialect),
        }
    }
}

fn dialect_for(hint: &str) -> Box<dyn Dialect + Send + Sync> {
    match hint.to_ascii_lowercase().as_str() {
        "hive" => Box::new(HiveDialect {}),
        "mysql" => Box::new(MySqlDialect {}),
        "postgres" | "postgresql" => Box::new(PostgreSqlDialect {}),
        "snowflake" => Box::new(SnowflakeDialect {}),
        _ => Box::new(GenericDialect {}),
    }
}

impl SqlParser for AstParser {
    fn parse(&self, sql: &str) -> Result<SqlLineageRecord> {
        let statements = Parser::parse_sql(self.dialect.as_ref(), sql)
            .map_err(|e| LineageError::SqlParse(e.to_string()))?;

        let mut record = SqlLineageRecord::default();
        let mut ctes: BTreeSet<String> = BTreeSet::new();

        for stmt in &statements {
            match stmt {
                Statement::CreateTable(ct) => {
                    if record.destination.is_none() {
                        record.destination = Some(object_name(&ct.name));
                    }
                    if let Some(query) = &ct.query {
                        collect_query(query, &mut record.sources, &mut ctes);
                        fill_columns(&mut record, query);
                    }
                }
                Statement::Insert(ins) => {
                    if let TableObject::TableName(name) = &ins.table {
                        if record.destination.is_none() {
                            record.destination = Some(object_name(name));
                        }
                    }
                    if let Some(query) = &ins.source {
                        collect_query(query, &mut record.sources, &mut ctes);
                        fill_columns(&mut record, query);
                    }
                }
                Statement::Query(query) => {
                    collect_query(query, &mut record.sources, &mut ctes);
                    fill_columns(&mut record, query);
                }
                _ => {}
            }
        }

        // The written table and script-local CTEs are not upstream sources.
        if let Some(dest) = &record.destination {
            record.sources.remove(dest);
        }
        for cte in &ctes {
            record.sources.remove(cte);
        }

        Ok(record.finish())
    }
}

fn object_name(name: &ObjectName) -> String {
    let parts: Vec<&str> = name
        .0
        .iter()
        .filter_map(|part| part.as_ident().map(|ident| ident.value.as_str()))
        .collect();
    if parts.is_empty() {
        name.to_string()
    } else {
        parts.join(".")
    }
}

fn collect_query(query: &Query, sources: &mut BTreeSet<String>, ctes: &mut BTreeSet<String>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ctes.insert(cte.alias.name.value.clone());
            collect_query(&cte.query, sources, ctes);
        }
    }
    collect_set_expr(&query.body, sources, ctes);
}

fn collect_set_expr(body: &SetExpr, sources: &mut BTreeSet<String>, ctes: &mut BTreeSet<String>) {
    match body {
        SetExpr::Select(select) => {
            for twj in &select.from {
                collect_table_with_joins(twj, sources, ctes);
            }
        }
        SetExpr::Query(inner) => collect_query(inner, sources, ctes),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_expr(left, sources, ctes);
            collect_set_expr(right, sources, ctes);
        }
        _ => {}
    }
}

fn collect_table_with_joins(
    twj: &TableWithJoins,
    sources: &mut BTreeSet<String>,
    ctes: &mut BTreeSet<String>,
) {
    collect_factor(&twj.relation, sources, ctes);
    for join in &twj.joins {
        collect_factor(&join.relation, sources, ctes);
    }
}

fn collect_factor(factor: &TableFactor, sources: &mut BTreeSet<String>, ctes: &mut BTreeSet<String>) {
    match factor {
        TableFactor::Table { name, .. } => {
            sources.insert(object_name(name));
        }
        TableFactor::Derived { subquery, .. } => collect_query(subquery, sources, ctes),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_table_with_joins(table_with_joins, sources, ctes),
        _ => {}
    }
}

/// Column names of the first SELECT projection in the script, alias names
/// preferred over raw expressions.
fn fill_columns(record: &mut SqlLineageRecord, query: &Query) {
    if !record.columns.is_empty() {
        return;
    }
    if let Some(select) = first_select(&query.body) {
        record.columns = select
            .projection
            .iter()
            .map(|item| match item {
                SelectItem::ExprWithAlias { alias, .. } => alias.value.clone(),
                SelectItem::UnnamedExpr(expr) => expr.to_string(),
                other => other.to_string(),
            })
            .collect();
    }
}

fn first_select(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => first_select(&inner.body),
        SetExpr::SetOperation { left, .. } => first_select(left),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> SqlLineageRecord {
        AstParser::new("generic").parse(sql).unwrap()
    }

    #[test]
    fn insert_select_yields_destination_sources_and_columns() {
        let record = parse("INSERT INTO sales.totals SELECT customer_id, amount FROM sales.raw");
        assert!(record.ok);
        assert_eq!(record.destination.as_deref(), Some("sales.totals"));
        assert_eq!(record.sources, BTreeSet::from(["sales.raw".to_string()]));
        assert_eq!(record.columns, vec!["customer_id", "amount"]);
    }

    #[test]
    fn ctas_takes_the_created_table_as_destination() {
        let record = parse(
            "CREATE TABLE mart.daily AS SELECT order_id, SUM(amount) AS total \
             FROM sales.orders GROUP BY order_id",
        );
        assert_eq!(record.destination.as_deref(), Some("mart.daily"));
        assert_eq!(record.sources, BTreeSet::from(["sales.orders".to_string()]));
        assert_eq!(record.columns, vec!["order_id", "total"]);
    }

    #[test]
    fn joins_and_subqueries_all_count_as_sources() {
        let record = parse(
            "INSERT INTO mart.wide SELECT a.id, b.v FROM sales.a a \
             JOIN sales.b b ON a.id = b.id \
             WHERE a.id IN (SELECT id FROM x.c)",
        );
        // Subqueries outside FROM are not walked; only relation sources count.
        assert_eq!(
            record.sources,
            BTreeSet::from(["sales.a".to_string(), "sales.b".to_string()])
        );
    }

    #[test]
    fn cte_names_are_not_sources_but_their_bodies_are() {
        let record = parse(
            "INSERT INTO mart.out WITH recent AS (SELECT * FROM sales.raw) \
             SELECT * FROM recent",
        );
        assert_eq!(record.destination.as_deref(), Some("mart.out"));
        assert_eq!(record.sources, BTreeSet::from(["sales.raw".to_string()]));
    }

    #[test]
    fn self_insert_does_not_list_the_destination_as_source() {
        let record = parse("INSERT INTO t SELECT * FROM t");
        assert_eq!(record.destination.as_deref(), Some("t"));
        assert!(record.sources.is_empty());
        assert!(record.ok);
    }

    #[test]
    fn plain_select_has_sources_only() {
        let record = parse("SELECT id FROM warehouse.items");
        assert!(record.ok);
        assert!(record.destination.is_none());
        assert_eq!(record.sources, BTreeSet::from(["warehouse.items".to_string()]));
    }

    #[test]
    fn select_without_tables_is_not_ok() {
        let record = parse("SELECT 1");
        assert!(!record.ok);
    }

    #[test]
    fn unparseable_script_is_an_error() {
        assert!(AstParser::new("generic").parse("DEFINITELY NOT SQL ((").is_err());
    }

    #[test]
    fn union_collects_both_branches() {
        let record =
            parse("SELECT id FROM a.left UNION ALL SELECT id FROM a.right");
        assert_eq!(
            record.sources,
            BTreeSet::from(["a.left".to_string(), "a.right".to_string()])
        );
        assert_eq!(record.columns, vec!["id"]);
    }
}
