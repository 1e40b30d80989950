use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(5 * 60);
const PUBLIC_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    #[must_use]
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parses `schema.table`; the split happens at the first dot.
    #[must_use]
    pub fn parse_qualified(raw: &str) -> Option<Self> {
        let (schema, table) = raw.trim().split_once('.')?;
        if schema.is_empty() || table.is_empty() {
            return None;
        }
        Some(Self::new(schema, table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Catalog enumeration offered by a connection. Failures surface as empty lists.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_schemas(&self) -> Vec<String>;
    async fn list_tables(&self, schema: &str) -> Vec<String>;
    async fn list_all_tables(&self) -> Vec<TableRef>;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    async fn list_schemas(&self) -> Vec<String> {
        (**self).list_schemas().await
    }

    async fn list_tables(&self, schema: &str) -> Vec<String> {
        (**self).list_tables(schema).await
    }

    async fn list_all_tables(&self) -> Vec<TableRef> {
        (**self).list_all_tables().await
    }
}

#[derive(Debug)]
struct CachedTables {
    fetched_at: Instant,
    tables: Vec<TableRef>,
}

/// Cached list of every user table, used for fuzzy lookup across schemas.
#[derive(Debug)]
pub struct TableCatalog {
    ttl: Duration,
    cache: Option<CachedTables>,
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_TTL)
    }
}

impl TableCatalog {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, cache: None }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn replace(&mut self, tables: Vec<TableRef>) {
        self.replace_at(tables, Instant::now());
    }

    pub fn replace_at(&mut self, tables: Vec<TableRef>, now: Instant) {
        self.cache = Some(CachedTables {
            fetched_at: now,
            tables,
        });
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Instant::now())
    }

    #[must_use]
    pub fn needs_refresh_at(&self, now: Instant) -> bool {
        self.cache
            .as_ref()
            .map_or(true, |cache| now.duration_since(cache.fetched_at) > self.ttl)
    }

    #[must_use]
    pub fn tables(&self) -> &[TableRef] {
        self.cache
            .as_ref()
            .map_or(&[], |cache| cache.tables.as_slice())
    }

    #[must_use]
    pub fn search(&self, term: &str, current_schema: Option<&str>) -> Vec<TableRef> {
        rank_table_matches(self.tables(), term, current_schema)
    }
}

/// Case-insensitive substring match on table names.
///
/// Ordering: exact name match, then the current schema, then `public`, then the shorter
/// table name, then `schema.table` lexicographically. A blank term matches nothing.
#[must_use]
pub fn rank_table_matches(
    tables: &[TableRef],
    term: &str,
    current_schema: Option<&str>,
) -> Vec<TableRef> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = tables
        .iter()
        .filter(|table| table.table.to_lowercase().contains(&needle))
        .cloned()
        .collect::<Vec<_>>();

    matches.sort_by_cached_key(|table| {
        (
            table.table.to_lowercase() != needle,
            Some(table.schema.as_str()) != current_schema,
            table.schema != PUBLIC_SCHEMA,
            table.table.chars().count(),
            table.to_string(),
        )
    });
    matches
}
