use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql_generator::quote_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortCriterion {
    #[must_use]
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("{} {}", quote_identifier(&self.column), self.direction.as_sql())
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Flips the direction of an existing criterion on `column`, or appends an ascending one.
pub fn toggle_sort(sorting: &mut Vec<SortCriterion>, column: &str) -> SortDirection {
    if let Some(existing) = sorting
        .iter_mut()
        .find(|criterion| criterion.column == column)
    {
        existing.direction = existing.direction.flipped();
        return existing.direction;
    }

    sorting.push(SortCriterion::asc(column));
    SortDirection::Asc
}
