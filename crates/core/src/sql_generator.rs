use thiserror::Error;

use crate::filter::Filter;
use crate::sorting::SortCriterion;

/// Synthetic row-number column exposed by the windowed query.
pub const ROW_NUMBER_COLUMN: &str = "row";

const WINDOW_CTE_NAME: &str = "sorted_results";
const INNER_INDENT: &str = "    ";
const SYSTEM_SCHEMAS: [&str; 2] = ["pg_catalog", "information_schema"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlGenerationError {
    #[error("schema name cannot be empty")]
    EmptySchemaName,
    #[error("table name cannot be empty")]
    EmptyTableName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTarget<'a> {
    pub schema: &'a str,
    pub table: &'a str,
}

impl<'a> SqlTarget<'a> {
    pub fn new(schema: &'a str, table: &'a str) -> Result<Self, SqlGenerationError> {
        if schema.trim().is_empty() {
            return Err(SqlGenerationError::EmptySchemaName);
        }
        if table.trim().is_empty() {
            return Err(SqlGenerationError::EmptyTableName);
        }
        Ok(Self { schema, table })
    }
}

#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[must_use]
pub fn quote_sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// True when `value` reads as a finite number that can be emitted bare.
#[must_use]
pub fn is_numeric_literal(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .is_ok_and(f64::is_finite)
}

fn qualified_table_sql(target: &SqlTarget<'_>) -> String {
    format!(
        "{}.{}",
        quote_identifier(target.schema),
        quote_identifier(target.table)
    )
}

fn where_clause(filters: &[Filter]) -> Option<String> {
    let predicates = filters
        .iter()
        .filter(|filter| filter.is_active())
        .map(Filter::to_sql)
        .collect::<Vec<_>>();
    if predicates.is_empty() {
        return None;
    }
    Some(format!("\nWHERE\n{}", predicates.join(" AND\n  ")))
}

fn order_by_clause<'a>(criteria: impl IntoIterator<Item = &'a SortCriterion>) -> Option<String> {
    let terms = criteria
        .into_iter()
        .map(SortCriterion::to_sql)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return None;
    }
    Some(format!("\nORDER BY\n  {}", terms.join(", ")))
}

/// Filtered, sorted and limited select wrapped in a CTE that adds a `row` number column.
///
/// Sorting on the `row` column is applied to the outer query; every other criterion
/// orders the inner query, so row numbers follow the filtered and sorted data.
#[must_use]
pub fn windowed_select_sql(
    target: &SqlTarget<'_>,
    filters: &[Filter],
    sorting: &[SortCriterion],
    row_limit: u32,
) -> String {
    let (outer_sorting, inner_sorting): (Vec<_>, Vec<_>) = sorting
        .iter()
        .partition(|criterion| criterion.column == ROW_NUMBER_COLUMN);

    let mut inner = format!("SELECT * FROM {}", qualified_table_sql(target));
    if let Some(clause) = where_clause(filters) {
        inner.push_str(&clause);
    }
    if let Some(clause) = order_by_clause(inner_sorting) {
        inner.push_str(&clause);
    }
    inner.push_str(&format!("\nLIMIT {row_limit}"));

    let indented = format!(
        "{INNER_INDENT}{}",
        inner.replace('\n', &format!("\n{INNER_INDENT}"))
    );

    let mut sql = format!(
        "WITH {WINDOW_CTE_NAME} AS (\n{indented}\n)\nSELECT\n    ROW_NUMBER() OVER () AS {},\n    *\nFROM {WINDOW_CTE_NAME}",
        quote_identifier(ROW_NUMBER_COLUMN)
    );
    if let Some(clause) = order_by_clause(outer_sorting) {
        sql.push_str(&clause);
    }
    sql.push(';');
    sql
}

/// Row count for the active filters, ignoring sorting and limit.
#[must_use]
pub fn count_sql(target: &SqlTarget<'_>, filters: &[Filter]) -> String {
    let mut sql = format!("SELECT count(*) FROM {}", qualified_table_sql(target));
    if let Some(clause) = where_clause(filters) {
        sql.push_str(&clause);
    }
    sql.push(';');
    sql
}

#[must_use]
pub fn list_schemas_sql() -> String {
    "SELECT DISTINCT table_schema FROM information_schema.tables ORDER BY table_schema;"
        .to_string()
}

#[must_use]
pub fn list_tables_sql(schema: &str) -> String {
    format!(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = {} ORDER BY table_name;",
        quote_sql_string(schema)
    )
}

#[must_use]
pub fn list_all_tables_sql() -> String {
    let excluded = SYSTEM_SCHEMAS
        .iter()
        .map(|schema| quote_sql_string(schema))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT table_schema, table_name FROM information_schema.tables \
         WHERE table_schema NOT IN ({excluded}) ORDER BY table_schema, table_name;"
    )
}
