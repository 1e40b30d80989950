use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::catalog::{TableCatalog, TableRef};
use crate::filter::{is_null_keyword, Filter, FilterId, FilterOperator, FilterState};
use crate::history::HistorySession;
use crate::json_inspect::{inspect_cell, CellInspection};
use crate::query_runner::{
    QueryOutcome, QueryRequest, QueryResponse, RequestGenerations, RequestKind, ERROR_COLUMN,
};
use crate::results::ResultGrid;
use crate::sorting::{toggle_sort, SortCriterion, SortDirection};
use crate::sql_generator::{count_sql, windowed_select_sql, SqlTarget, ROW_NUMBER_COLUMN};

pub const DEFAULT_ROW_LIMIT: u32 = 50;
pub const MANUAL_SCHEMA_LABEL: &str = "[Manual]";
pub const CUSTOM_QUERY_LABEL: &str = "[Custom Query]";
pub const QUERY_PLACEHOLDER: &str = "Select a schema and table to begin.";
const CUSTOM_QUERY_EXPORT_NAME: &str = "custom_query";
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_CELL_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Only '=' (IS NULL) or '!=' (IS NOT NULL) can be used with NULL values.")]
    NullOperator { operator: FilterOperator },
    #[error("Limit must be greater than 0.")]
    NonPositiveLimit,
    #[error("Invalid limit. Please enter a number.")]
    InvalidLimit { value: String },
    #[error("Cannot execute an empty query.")]
    EmptyQuery,
    #[error("Filter {id} no longer exists.")]
    UnknownFilter { id: FilterId },
    #[error("Select a schema and table first.")]
    NoTableSelected,
    #[error("Row counts are not available for custom queries.")]
    CountInManualMode,
    #[error("There is no data to copy or export.")]
    NoResults,
    #[error("Nothing to copy. Query box is empty or contains default text.")]
    EmptyQueryText,
    #[error("Invalid table selection `{value}`.")]
    InvalidTableReference { value: String },
    #[error("Column `{column}` cannot be filtered.")]
    UnfilterableColumn { column: String },
    #[error("Column `{column}` cannot be sorted.")]
    UnsortableColumn { column: String },
}

/// Work the controller wants done off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Execute(QueryRequest),
    LoadSchemas,
    LoadTables { schema: String, auto_select: bool },
    CacheAllTables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Generated,
    Manual,
}

/// Which actions the presentation layer should offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub can_count: bool,
    pub can_run_manual: bool,
    pub can_export: bool,
    pub can_copy_results: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDraft {
    pub operator: FilterOperator,
    pub value: String,
    pub force_string: bool,
}

impl FilterDraft {
    #[must_use]
    pub fn new(operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            operator,
            value: value.into(),
            force_string: false,
        }
    }

    #[must_use]
    pub fn with_force_string(mut self, force_string: bool) -> Self {
        self.force_string = force_string;
        self
    }
}

/// Owns the live browsing state and turns user actions into state changes, history
/// entries and dispatched commands.
#[derive(Debug)]
pub struct SessionController {
    schema: Option<String>,
    table: Option<String>,
    filters: Vec<Filter>,
    sorting: Vec<SortCriterion>,
    row_limit: u32,
    mode: QueryMode,
    query_text: String,
    query_edited: bool,
    schemas: Vec<String>,
    tables: Vec<String>,
    tables_schema: Option<String>,
    catalog: TableCatalog,
    history: HistorySession,
    generations: RequestGenerations,
    next_filter_id: FilterId,
    results: ResultGrid,
    status: String,
    connect_error: Option<String>,
    outbox: Vec<Command>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(HistorySession::default())
    }

    #[must_use]
    pub fn with_history(history: HistorySession) -> Self {
        Self {
            schema: None,
            table: None,
            filters: Vec::new(),
            sorting: Vec::new(),
            row_limit: DEFAULT_ROW_LIMIT,
            mode: QueryMode::Generated,
            query_text: String::new(),
            query_edited: false,
            schemas: Vec::new(),
            tables: Vec::new(),
            tables_schema: None,
            catalog: TableCatalog::default(),
            history,
            generations: RequestGenerations::default(),
            next_filter_id: 0,
            results: ResultGrid::default(),
            status: "Ready.".to_string(),
            connect_error: None,
            outbox: Vec::new(),
        }
    }

    /// # Panics
    /// Panics if `row_limit` is zero.
    #[must_use]
    pub fn with_row_limit(mut self, row_limit: u32) -> Self {
        assert!(row_limit > 0, "row limit must be positive");
        self.row_limit = row_limit;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: TableCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    #[must_use]
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn sorting(&self) -> &[SortCriterion] {
        &self.sorting
    }

    #[must_use]
    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    #[must_use]
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    #[must_use]
    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// Editor contents, falling back to the placeholder when nothing is loaded.
    #[must_use]
    pub fn query_display(&self) -> &str {
        if self.query_text.is_empty() {
            QUERY_PLACEHOLDER
        } else {
            &self.query_text
        }
    }

    #[must_use]
    pub fn is_query_edited(&self) -> bool {
        self.query_edited
    }

    #[must_use]
    pub fn schema_label(&self) -> &str {
        match self.mode {
            QueryMode::Manual => MANUAL_SCHEMA_LABEL,
            QueryMode::Generated => self.schema.as_deref().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn table_label(&self) -> &str {
        match self.mode {
            QueryMode::Manual => CUSTOM_QUERY_LABEL,
            QueryMode::Generated => self.table.as_deref().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    #[must_use]
    pub fn results(&self) -> &ResultGrid {
        &self.results
    }

    #[must_use]
    pub fn history(&self) -> &HistorySession {
        &self.history
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    #[must_use]
    pub fn affordances(&self) -> Affordances {
        Affordances {
            can_go_back: self.history.can_go_back(),
            can_go_forward: self.history.can_go_forward(),
            can_count: self.mode == QueryMode::Generated && self.target().is_some(),
            can_run_manual: self.query_edited || self.mode == QueryMode::Manual,
            can_export: self.results.has_rows(),
            can_copy_results: self.results.has_rows(),
        }
    }

    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    /// Snapshot of the live state as it would be recorded in history.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        AppState::capture(
            self.schema.clone(),
            self.table.clone(),
            self.filters.clone(),
            self.sorting.clone(),
            self.row_limit,
            self.mode == QueryMode::Manual,
            self.query_text.trim().to_string(),
        )
    }

    pub fn start(&mut self) {
        self.status = "Loading schemas...".to_string();
        self.outbox.push(Command::LoadSchemas);
    }

    /// Records a failed connect. The message stays in the status line until a schema
    /// listing succeeds.
    pub fn connection_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = format!("Connection failed: {message}");
        self.connect_error = Some(message);
    }

    pub fn apply_schemas(&mut self, schemas: Vec<String>) {
        self.schemas = schemas;
        let Some(first) = self.schemas.first().cloned() else {
            self.status = match &self.connect_error {
                Some(message) => format!("Connection failed: {message}"),
                None => "No schemas found in the database.".to_string(),
            };
            return;
        };
        self.connect_error = None;
        self.outbox.push(Command::CacheAllTables);
        self.select_schema(&first);
    }

    pub fn select_schema(&mut self, schema: &str) {
        let unchanged =
            self.schema.as_deref() == Some(schema) && self.mode == QueryMode::Generated;
        if schema.is_empty() || schema == MANUAL_SCHEMA_LABEL || unchanged {
            return;
        }

        info!(schema, "schema selected");
        self.schema = Some(schema.to_string());
        self.table = None;
        self.mode = QueryMode::Generated;
        self.filters.clear();
        self.sorting.clear();
        self.clear_results();
        self.request_tables(true);
    }

    pub fn apply_tables(&mut self, schema: &str, tables: Vec<String>, auto_select: bool) {
        if self.schema.as_deref() != Some(schema) {
            debug!(schema, "discarding table list for inactive schema");
            return;
        }
        self.tables = tables;
        self.tables_schema = Some(schema.to_string());
        if !auto_select {
            return;
        }

        let Some(first) = self.tables.first().cloned() else {
            self.table = None;
            self.clear_results();
            self.set_query_text(String::new());
            self.status = format!("No tables found in schema '{schema}'.");
            return;
        };
        let count = self.tables.len();
        if self.select_table(&first).is_ok() {
            self.status =
                format!("Found {count} tables in '{schema}'. Auto-selected '{first}'.");
        }
    }

    pub fn select_table(&mut self, table: &str) -> Result<(), SessionError> {
        if table.is_empty() || table == CUSTOM_QUERY_LABEL {
            return Ok(());
        }
        let Some(schema) = self.schema.clone() else {
            return Err(self.reject(SessionError::NoTableSelected));
        };
        self.switch_table(schema, table.to_string())
    }

    /// Selects a `schema.table` pick from the fuzzy finder, loading the schema's tables
    /// when it differs from the current one.
    pub fn select_qualified(&mut self, qualified: &str) -> Result<(), SessionError> {
        let Some(table_ref) = TableRef::parse_qualified(qualified) else {
            return Err(self.reject(SessionError::InvalidTableReference {
                value: qualified.to_string(),
            }));
        };
        self.switch_table(table_ref.schema, table_ref.table)
    }

    pub fn apply_all_tables(&mut self, tables: Vec<TableRef>) {
        let count = tables.len();
        self.catalog.replace(tables);
        info!(count, "cached tables for searching");
        if !self.status.contains("Loading") {
            self.status = format!("Ready. Cached {count} tables for searching.");
        }
    }

    /// Fuzzy lookup across every cached schema. Schedules a catalog refresh when stale.
    pub fn search_tables(&mut self, term: &str) -> Vec<TableRef> {
        if self.catalog.needs_refresh() && !self.schemas.is_empty() {
            self.outbox.push(Command::CacheAllTables);
        }
        self.catalog.search(term, self.schema.as_deref())
    }

    pub fn invalidate_catalog(&mut self) {
        self.catalog.invalidate();
    }

    /// Regenerates the query from the current state, records it and executes it.
    pub fn load_table_data(&mut self) -> Result<(), SessionError> {
        let Some(query) = self.generated_query() else {
            return Err(self.reject(SessionError::NoTableSelected));
        };
        self.mode = QueryMode::Generated;
        self.set_query_text(query.clone());
        self.record_current_state();
        self.dispatch_grid(query);
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<(), SessionError> {
        self.load_table_data()
    }

    pub fn request_count(&mut self) -> Result<(), SessionError> {
        if self.mode == QueryMode::Manual {
            return Err(self.reject(SessionError::CountInManualMode));
        }
        let Some(sql) = self
            .target()
            .map(|target| count_sql(&target, &self.filters))
        else {
            return Err(self.reject(SessionError::NoTableSelected));
        };

        let id = self.generations.issue(RequestKind::Count);
        self.outbox.push(Command::Execute(QueryRequest {
            id,
            kind: RequestKind::Count,
            sql,
        }));
        self.status = "Calculating total count...".to_string();
        Ok(())
    }

    pub fn add_filter(&mut self, column: &str, draft: FilterDraft) -> Result<FilterId, SessionError> {
        if self.target().is_none() {
            return Err(self.reject(SessionError::NoTableSelected));
        }
        if column == ROW_NUMBER_COLUMN || column == ERROR_COLUMN {
            return Err(self.reject(SessionError::UnfilterableColumn {
                column: column.to_string(),
            }));
        }
        let value = self.validate_draft(&draft)?;

        let id = self.next_filter_id;
        self.next_filter_id += 1;
        self.filters.push(
            Filter::new(id, column, draft.operator, value).with_force_string(draft.force_string),
        );
        self.load_table_data()?;
        Ok(id)
    }

    /// Replaces operator, value and `force_string` of a filter and re-activates it.
    pub fn edit_filter(&mut self, id: FilterId, draft: FilterDraft) -> Result<(), SessionError> {
        let value = self.validate_draft(&draft)?;
        let Some(filter) = self.filters.iter_mut().find(|filter| filter.id == id) else {
            return Err(self.reject(SessionError::UnknownFilter { id }));
        };
        filter.operator = draft.operator;
        filter.value = Some(value);
        filter.force_string = draft.force_string;
        filter.state = FilterState::Active;
        self.load_table_data()
    }

    pub fn toggle_filter(&mut self, id: FilterId) -> Result<(), SessionError> {
        let Some(filter) = self.filters.iter_mut().find(|filter| filter.id == id) else {
            return Err(self.reject(SessionError::UnknownFilter { id }));
        };
        filter.state = filter.state.toggled();
        self.load_table_data()
    }

    pub fn remove_filter(&mut self, id: FilterId) -> Result<(), SessionError> {
        let before = self.filters.len();
        self.filters.retain(|filter| filter.id != id);
        if self.filters.len() == before {
            return Err(self.reject(SessionError::UnknownFilter { id }));
        }
        self.load_table_data()
    }

    pub fn clear_filters(&mut self) -> Result<(), SessionError> {
        if self.filters.is_empty() {
            return Ok(());
        }
        self.filters.clear();
        self.load_table_data()
    }

    /// Flips the direction of `column` or appends it ascending, then reloads.
    pub fn toggle_sort(&mut self, column: &str) -> Result<SortDirection, SessionError> {
        if self.results.is_error() && column == ERROR_COLUMN {
            return Err(self.reject(SessionError::UnsortableColumn {
                column: column.to_string(),
            }));
        }
        if self.target().is_none() {
            return Err(self.reject(SessionError::NoTableSelected));
        }
        let direction = toggle_sort(&mut self.sorting, column);
        self.load_table_data()?;
        Ok(direction)
    }

    pub fn remove_sort(&mut self, column: &str) -> Result<(), SessionError> {
        let before = self.sorting.len();
        self.sorting.retain(|criterion| criterion.column != column);
        if self.sorting.len() == before {
            return Ok(());
        }
        self.load_table_data()
    }

    pub fn clear_sorting(&mut self) -> Result<(), SessionError> {
        if self.sorting.is_empty() {
            return Ok(());
        }
        self.sorting.clear();
        self.load_table_data()
    }

    /// Parses a row limit typed by the user. Returns whether the data was reloaded.
    pub fn set_row_limit(&mut self, raw: &str) -> Result<bool, SessionError> {
        let parsed = match raw.trim().parse::<i64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(self.reject(SessionError::InvalidLimit {
                    value: raw.to_string(),
                }))
            }
        };
        if parsed <= 0 {
            return Err(self.reject(SessionError::NonPositiveLimit));
        }
        let Ok(limit) = u32::try_from(parsed) else {
            return Err(self.reject(SessionError::InvalidLimit {
                value: raw.to_string(),
            }));
        };
        if limit == self.row_limit {
            return Ok(false);
        }

        self.row_limit = limit;
        if self.target().is_none() {
            return Ok(false);
        }
        self.load_table_data()?;
        Ok(true)
    }

    /// Records a user edit of the query editor.
    pub fn edit_query_text(&mut self, text: impl Into<String>) {
        self.query_text = text.into();
        self.query_edited = true;
        self.status =
            "Query modified. Run it as a custom query or refresh to reset.".to_string();
    }

    pub fn run_manual_query(&mut self) -> Result<(), SessionError> {
        let query = self.query_text.trim().to_string();
        if query.is_empty() {
            return Err(self.reject(SessionError::EmptyQuery));
        }

        self.filters.clear();
        self.sorting.clear();
        self.mode = QueryMode::Manual;
        self.query_edited = false;
        self.generations.invalidate(RequestKind::Count);
        self.record_current_state();
        self.dispatch_grid(query);
        Ok(())
    }

    pub fn go_back(&mut self) -> bool {
        let Some(state) = self.history.back().cloned() else {
            return false;
        };
        info!(cursor = ?self.history.cursor(), "history back");
        self.restore(state);
        true
    }

    pub fn go_forward(&mut self) -> bool {
        let Some(state) = self.history.forward().cloned() else {
            return false;
        };
        info!(cursor = ?self.history.cursor(), "history forward");
        self.restore(state);
        true
    }

    /// Installs `state` without recording it. Nested restores compose.
    pub fn restore(&mut self, state: AppState) {
        self.history.suppress_recording();
        self.install_snapshot(state);
        self.history.resume_recording();
    }

    /// Jumps to a saved snapshot; the current state is recorded first so Back returns to it.
    pub fn load_snapshot(&mut self, state: AppState) {
        self.record_current_state();
        self.restore(state);
    }

    pub fn apply_query_response(&mut self, response: QueryResponse) -> bool {
        if !self.generations.is_current(response.kind, response.id) {
            debug!(id = response.id, kind = ?response.kind, "discarding stale query result");
            return false;
        }

        match response.kind {
            RequestKind::Grid => {
                self.results = ResultGrid::from_outcome(&response.outcome);
                self.status = self.results.status_message();
            }
            RequestKind::Count => {
                let count = match &response.outcome {
                    QueryOutcome::Rows(result) => result
                        .rows
                        .first()
                        .and_then(|row| row.first())
                        .cloned()
                        .unwrap_or_else(|| ERROR_COLUMN.to_string()),
                    QueryOutcome::Failed { .. } => ERROR_COLUMN.to_string(),
                };
                self.status = format!("Total Count (matching filters): {count}");
            }
        }
        true
    }

    pub fn copy_query_text(&mut self) -> Result<String, SessionError> {
        let query = self.query_text.trim();
        if query.is_empty() || query == QUERY_PLACEHOLDER {
            return Err(self.reject(SessionError::EmptyQueryText));
        }
        Ok(query.to_string())
    }

    pub fn copy_query_and_results(&mut self) -> Result<String, SessionError> {
        match self.results.query_and_results_text(&self.query_text) {
            Some(text) => Ok(text),
            None => Err(self.reject(SessionError::NoResults)),
        }
    }

    /// Comma-joined values of one result column plus a ready-made status line.
    pub fn copy_column(&mut self, column: usize) -> Result<(String, String), SessionError> {
        let copied = if self.results.has_rows() {
            self.results.column_csv(column).zip(
                self.results
                    .column_name(column)
                    .map(ToString::to_string),
            )
        } else {
            None
        };
        let Some((text, name)) = copied else {
            return Err(self.reject(SessionError::NoResults));
        };
        let status = format!(
            "Copied {} values from column '{name}'",
            self.results.row_count()
        );
        Ok((text, status))
    }

    pub fn copy_cell(&mut self, row: usize, column: usize) -> Result<(String, String), SessionError> {
        let Some(value) = self.results.cell(row, column).map(ToString::to_string) else {
            return Err(self.reject(SessionError::NoResults));
        };
        let preview = if value.chars().count() > MAX_CELL_PREVIEW_CHARS {
            let mut preview = value
                .chars()
                .take(MAX_CELL_PREVIEW_CHARS)
                .collect::<String>();
            preview.push_str("...");
            preview
        } else {
            value.clone()
        };
        Ok((value, format!("Copied '{preview}' to clipboard.")))
    }

    pub fn inspect_cell(&mut self, row: usize, column: usize) -> CellInspection {
        let inspection = self
            .results
            .cell(row, column)
            .map_or(CellInspection::Empty, inspect_cell);
        if let Some(message) = inspection.status_message() {
            self.status = message.to_string();
        }
        inspection
    }

    /// Rows to export, refused when nothing real is displayed.
    pub fn export_grid(&mut self) -> Result<&ResultGrid, SessionError> {
        if !self.results.has_rows() {
            return Err(self.reject(SessionError::NoResults));
        }
        Ok(&self.results)
    }

    /// `<table>_<stamp>.csv`, or `custom_query_<stamp>.csv` in manual mode.
    #[must_use]
    pub fn csv_export_name(&self, now: NaiveDateTime) -> String {
        let base = match (self.mode, self.table.as_deref()) {
            (QueryMode::Generated, Some(table)) if !table.is_empty() => table,
            _ => CUSTOM_QUERY_EXPORT_NAME,
        };
        format!("{base}_{}.csv", now.format(FILE_STAMP_FORMAT))
    }

    fn switch_table(&mut self, schema: String, table: String) -> Result<(), SessionError> {
        let unchanged = self.schema.as_deref() == Some(schema.as_str())
            && self.table.as_deref() == Some(table.as_str())
            && self.mode == QueryMode::Generated;
        if unchanged {
            return Ok(());
        }

        let schema_changed = self.schema.as_deref() != Some(schema.as_str());
        info!(schema = %schema, table = %table, "table selected");
        self.schema = Some(schema);
        self.table = Some(table);
        if schema_changed {
            self.request_tables(false);
        }
        self.filters.clear();
        self.sorting.clear();
        self.load_table_data()
    }

    fn install_snapshot(&mut self, state: AppState) {
        let restored_max_id = state.filters.iter().map(|filter| filter.id + 1).max();
        self.next_filter_id = self.next_filter_id.max(restored_max_id.unwrap_or(0));

        self.schema = state.schema;
        self.table = state.table;
        self.row_limit = state.row_limit;
        self.query_edited = false;
        if self.schema.is_some() && self.tables_schema != self.schema {
            self.request_tables(false);
        }

        if state.is_manual_mode {
            self.mode = QueryMode::Manual;
            self.filters.clear();
            self.sorting.clear();
            self.set_query_text(state.manual_query_text.clone());
            self.generations.invalidate(RequestKind::Count);
            self.dispatch_grid(state.manual_query_text);
            return;
        }

        self.mode = QueryMode::Generated;
        self.filters = state.filters;
        self.sorting = state.sorting;
        match self.generated_query() {
            Some(query) => {
                self.set_query_text(query.clone());
                self.dispatch_grid(query);
            }
            None => {
                self.set_query_text(String::new());
                self.clear_results();
            }
        }
    }

    fn request_tables(&mut self, auto_select: bool) {
        let Some(schema) = self.schema.clone() else {
            return;
        };
        self.status = format!("Loading tables for schema '{schema}'...");
        self.outbox.push(Command::LoadTables {
            schema,
            auto_select,
        });
    }

    fn record_current_state(&mut self) {
        let outcome = self.history.record(self.snapshot());
        debug!(
            ?outcome,
            entries = self.history.len(),
            cursor = ?self.history.cursor(),
            "history record"
        );
    }

    fn dispatch_grid(&mut self, sql: String) {
        if sql.trim().is_empty() {
            return;
        }
        let id = self.generations.issue(RequestKind::Grid);
        debug!(id, "dispatching grid query");
        self.outbox.push(Command::Execute(QueryRequest {
            id,
            kind: RequestKind::Grid,
            sql,
        }));
        self.status = "Executing query...".to_string();
    }

    fn set_query_text(&mut self, text: String) {
        self.query_text = text;
        self.query_edited = false;
    }

    fn clear_results(&mut self) {
        self.results = ResultGrid::default();
        self.generations.invalidate(RequestKind::Grid);
        self.generations.invalidate(RequestKind::Count);
    }

    fn target(&self) -> Option<SqlTarget<'_>> {
        SqlTarget::new(self.schema.as_deref()?, self.table.as_deref()?).ok()
    }

    fn generated_query(&self) -> Option<String> {
        self.target().map(|target| {
            windowed_select_sql(&target, &self.filters, &self.sorting, self.row_limit)
        })
    }

    fn validate_draft(&mut self, draft: &FilterDraft) -> Result<String, SessionError> {
        let value = draft.value.trim().to_string();
        if is_null_keyword(&value) && !draft.operator.supports_null() {
            return Err(self.reject(SessionError::NullOperator {
                operator: draft.operator,
            }));
        }
        Ok(value)
    }

    fn reject(&mut self, error: SessionError) -> SessionError {
        debug!(error = %error, "rejected user action");
        self.status = error.to_string();
        error
    }
}
