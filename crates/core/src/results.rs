use crate::query_runner::{QueryOutcome, ERROR_COLUMN};
use crate::sql_generator::ROW_NUMBER_COLUMN;

/// What the grid currently shows. Rebuilt from every applied query outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultGrid {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    error: Option<String>,
}

impl ResultGrid {
    #[must_use]
    pub fn from_outcome(outcome: &QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Rows(result) => Self {
                columns: result.columns.clone(),
                rows: result.rows.clone(),
                error: None,
            },
            QueryOutcome::Failed { message } => {
                let grid = outcome.to_grid();
                Self {
                    columns: grid.columns,
                    rows: grid.rows,
                    error: Some(message.clone()),
                }
            }
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when real data rows are displayed; gates export and copy actions.
    #[must_use]
    pub fn has_rows(&self) -> bool {
        !self.is_error() && !self.columns.is_empty() && !self.rows.is_empty()
    }

    #[must_use]
    pub fn status_message(&self) -> String {
        if let Some(message) = &self.error {
            return format!("Query Error: {message}");
        }
        if self.columns.is_empty() {
            return "Query returned no displayable columns.".to_string();
        }
        if self.rows.is_empty() {
            return "Query executed successfully, 0 rows returned.".to_string();
        }
        format!("Loaded {} rows.", self.rows.len())
    }

    #[must_use]
    pub fn column_name(&self, column: usize) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Filters can be created from any data column except the synthetic row number.
    #[must_use]
    pub fn is_filterable_column(&self, column: usize) -> bool {
        !self.is_error()
            && self
                .column_name(column)
                .is_some_and(|name| name != ROW_NUMBER_COLUMN && name != ERROR_COLUMN)
    }

    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(String::as_str)
    }

    #[must_use]
    pub fn column_values(&self, column: usize) -> Option<Vec<&str>> {
        if column >= self.columns.len() {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(column).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Values of one column joined with `,`.
    #[must_use]
    pub fn column_csv(&self, column: usize) -> Option<String> {
        self.column_values(column).map(|values| values.join(","))
    }

    /// Plain-text table: padded header, `-+-` separator line, padded rows.
    #[must_use]
    pub fn to_text_table(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut widths = self
            .columns
            .iter()
            .map(|column| column.chars().count())
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(pad_cells(&widths, self.columns.iter().map(String::as_str)));
        lines.push(
            widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &self.rows {
            lines.push(pad_cells(&widths, row.iter().map(String::as_str)));
        }
        lines.join("\n")
    }

    /// Query text, the text table and a `(N rows)` footer. `None` when there is nothing to copy.
    #[must_use]
    pub fn query_and_results_text(&self, query: &str) -> Option<String> {
        if !self.has_rows() {
            return None;
        }
        Some(format!(
            "{}\n{}\n({} rows)",
            query.trim(),
            self.to_text_table(),
            self.rows.len()
        ))
    }
}

fn pad_cells<'a>(widths: &[usize], mut cells: impl Iterator<Item = &'a str>) -> String {
    widths
        .iter()
        .map(|&width| format!("{:<width$}", cells.next().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(" | ")
}
