use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::filter::Filter;
use crate::sorting::SortCriterion;

#[derive(Debug, Error)]
pub enum AppStateError {
    #[error("failed to parse session snapshot: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize session snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("row limit must be a positive integer")]
    InvalidRowLimit,
}

/// Immutable snapshot of the browsing session.
///
/// Equality compares every field except `timestamp`, so two captures of the same state
/// taken at different instants are considered duplicates by the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    #[serde(
        default,
        serialize_with = "selection_to_text",
        deserialize_with = "selection_from_text"
    )]
    pub schema: Option<String>,
    #[serde(
        default,
        serialize_with = "selection_to_text",
        deserialize_with = "selection_from_text"
    )]
    pub table: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorting: Vec<SortCriterion>,
    pub row_limit: u32,
    #[serde(default)]
    pub is_manual_mode: bool,
    #[serde(default)]
    pub manual_query_text: String,
    pub timestamp: NaiveDateTime,
}

impl AppState {
    #[must_use]
    pub fn capture(
        schema: Option<String>,
        table: Option<String>,
        filters: Vec<Filter>,
        sorting: Vec<SortCriterion>,
        row_limit: u32,
        is_manual_mode: bool,
        manual_query_text: String,
    ) -> Self {
        Self {
            schema,
            table,
            filters,
            sorting,
            row_limit,
            is_manual_mode,
            manual_query_text,
            timestamp: Local::now().naive_local(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `schema.table` when both are set.
    #[must_use]
    pub fn qualified_table(&self) -> Option<String> {
        match (&self.schema, &self.table) {
            (Some(schema), Some(table)) => Some(format!("{schema}.{table}")),
            _ => None,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, AppStateError> {
        serde_json::to_string_pretty(self).map_err(AppStateError::Serialize)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppStateError> {
        let state: Self = serde_json::from_str(raw).map_err(AppStateError::Parse)?;
        if state.row_limit == 0 {
            return Err(AppStateError::InvalidRowLimit);
        }
        Ok(state)
    }
}

// No selection is written as an empty string; empty strings and nulls read back as `None`.
#[allow(clippy::ref_option)]
fn selection_to_text<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

fn selection_from_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.is_empty()))
}

impl PartialEq for AppState {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.table == other.table
            && self.filters == other.filters
            && self.sorting == other.sorting
            && self.row_limit == other.row_limit
            && self.is_manual_mode == other.is_manual_mode
            && self.manual_query_text == other.manual_query_text
    }
}

impl Eq for AppState {}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{AppState, AppStateError};
    use crate::filter::{Filter, FilterOperator, FilterState};
    use crate::sorting::{SortCriterion, SortDirection};

    fn sample_state() -> AppState {
        AppState::capture(
            Some("public".to_string()),
            Some("users".to_string()),
            vec![
                Filter::new(0, "id", FilterOperator::Greater, "10"),
                Filter::new(1, "email", FilterOperator::ILike, "example")
                    .with_state(FilterState::Inactive),
            ],
            vec![SortCriterion::new("id", SortDirection::Desc)],
            25,
            false,
            String::new(),
        )
    }

    #[test]
    fn equality_ignores_timestamp() {
        let first = sample_state();
        let later = first.clone().with_timestamp(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .expect("valid timestamp"),
        );
        assert_eq!(first, later);

        let mut changed = first.clone();
        changed.row_limit = 26;
        assert_ne!(first, changed);
    }

    #[test]
    fn json_round_trip_preserves_value() {
        let state = sample_state();
        let raw = state.to_json_pretty().expect("state should serialize");
        let parsed = AppState::from_json(&raw).expect("state should parse");

        assert_eq!(parsed, state);
        assert_eq!(parsed.timestamp, state.timestamp);
    }

    #[test]
    fn parses_snapshot_written_with_naive_iso_timestamp() {
        let raw = r#"{
            "schema": "rnacen",
            "table": "rna",
            "filters": [
                {"id": 0, "column": "len", "operator": "<", "value": 100, "force_string": false, "state": "Active"}
            ],
            "sorting": [{"column": "row", "direction": "DESC"}],
            "row_limit": 50,
            "is_manual_mode": true,
            "manual_query_text": "SELECT 1;",
            "timestamp": "2024-03-05T14:07:09.123456"
        }"#;

        let state = AppState::from_json(raw).expect("snapshot should parse");
        assert_eq!(state.qualified_table().as_deref(), Some("rnacen.rna"));
        assert_eq!(state.filters[0].to_sql(), "\"len\" < 100");
        assert_eq!(state.sorting[0].direction, SortDirection::Desc);
        assert!(state.is_manual_mode);
    }

    #[test]
    fn unset_selection_is_written_and_read_as_empty_text() {
        let state = AppState::capture(
            None,
            None,
            Vec::new(),
            Vec::new(),
            50,
            true,
            "SELECT 1".to_string(),
        );
        let rendered = state.to_json_pretty().expect("serialize failed");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("invalid json");
        assert_eq!(value["schema"], "");
        assert!(value["table"].is_string());

        let restored = AppState::from_json(&rendered).expect("parse failed");
        assert_eq!(restored, state);

        let raw = r#"{
            "schema": "public",
            "table": "",
            "filters": [],
            "sorting": [],
            "row_limit": 10,
            "is_manual_mode": false,
            "manual_query_text": "",
            "timestamp": "2024-05-01T10:00:00"
        }"#;
        let loaded = AppState::from_json(raw).expect("parse failed");
        assert_eq!(loaded.schema.as_deref(), Some("public"));
        assert_eq!(loaded.table, None);
        assert_eq!(loaded.qualified_table(), None);
    }

    #[test]
    fn rejects_zero_row_limit() {
        let mut state = sample_state();
        state.row_limit = 0;
        let raw = state.to_json_pretty().expect("state should serialize");

        assert!(matches!(
            AppState::from_json(&raw),
            Err(AppStateError::InvalidRowLimit)
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            AppState::from_json("{\"schema\": "),
            Err(AppStateError::Parse(_))
        ));
    }
}
