use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::sql_generator::{is_numeric_literal, quote_identifier, quote_sql_string};

pub type FilterId = u64;

const NULL_KEYWORD: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "NOT ILIKE")]
    NotILike,
}

impl FilterOperator {
    /// Dialog order: equality and pattern/list operators first, then range comparisons.
    pub const ALL: [Self; 10] = [
        Self::Equal,
        Self::NotEqual,
        Self::ILike,
        Self::NotILike,
        Self::In,
        Self::NotIn,
        Self::Greater,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
    ];

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::ILike => "ILIKE",
            Self::NotILike => "NOT ILIKE",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Equal => "Equal to",
            Self::NotEqual => "Not equal to",
            Self::Greater => "Greater than",
            Self::Less => "Less than",
            Self::GreaterOrEqual => "Greater than or equal to",
            Self::LessOrEqual => "Less than or equal to",
            Self::In => "In list (comma-sep)",
            Self::NotIn => "Not in list",
            Self::ILike => "Contains (ilike)",
            Self::NotILike => "Does not contain (not ilike)",
        }
    }

    /// Short form used in filter labels.
    #[must_use]
    pub fn display_symbol(self) -> &'static str {
        match self {
            Self::ILike => "contains",
            Self::NotILike => "not contains",
            other => other.as_sql(),
        }
    }

    #[must_use]
    pub fn supports_null(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    #[must_use]
    pub fn is_pattern(self) -> bool {
        matches!(self, Self::ILike | Self::NotILike)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter operator `{0}`")]
pub struct UnknownOperator(pub String);

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::ALL
            .into_iter()
            .find(|operator| operator.as_sql().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownOperator(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterState {
    #[default]
    Active,
    Inactive,
}

impl FilterState {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: FilterId,
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default, deserialize_with = "deserialize_filter_value")]
    pub value: Option<String>,
    #[serde(default)]
    pub force_string: bool,
    #[serde(default)]
    pub state: FilterState,
}

impl Filter {
    #[must_use]
    pub fn new(
        id: FilterId,
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id,
            column: column.into(),
            operator,
            value: Some(value.into()),
            force_string: false,
            state: FilterState::Active,
        }
    }

    #[must_use]
    pub fn with_force_string(mut self, force_string: bool) -> Self {
        self.force_string = force_string;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: FilterState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == FilterState::Active
    }

    #[must_use]
    pub fn is_null_value(&self) -> bool {
        self.value.as_deref().map_or(true, is_null_keyword)
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        let column = quote_identifier(&self.column);
        let operator = self.operator.as_sql();

        let Some(value) = self.value.as_deref().filter(|value| !is_null_keyword(value)) else {
            return match self.operator {
                FilterOperator::Equal => format!("{column} IS NULL"),
                FilterOperator::NotEqual => format!("{column} IS NOT NULL"),
                _ => "1=1 /* Invalid NULL filter */".to_string(),
            };
        };

        if self.operator.is_list() {
            let items = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(list_item_sql)
                .collect::<Vec<_>>();
            if items.is_empty() {
                return "1=0".to_string();
            }
            return format!("{column} {operator} ({})", items.join(", "));
        }

        if self.operator.is_pattern() {
            return format!("{column} {operator} {}", quote_sql_string(&format!("%{value}%")));
        }

        let literal = if !self.force_string && is_numeric_literal(value) {
            value.trim().to_string()
        } else {
            quote_sql_string(value)
        };
        format!("{column} {operator} {literal}")
    }

    /// Human label such as `name contains bob`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {} {}",
            self.column,
            self.operator.display_symbol(),
            self.value.as_deref().unwrap_or(NULL_KEYWORD)
        )
    }
}

const MAX_LABEL_CHARS: usize = 49;
const TRUNCATED_LABEL_CHARS: usize = 47;

impl Filter {
    /// Label shortened for filter chips: over 49 characters becomes 47 plus `...`.
    #[must_use]
    pub fn short_label(&self) -> String {
        let label = self.label();
        if label.chars().count() <= MAX_LABEL_CHARS {
            return label;
        }
        let mut truncated = label.chars().take(TRUNCATED_LABEL_CHARS).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[must_use]
pub fn is_null_keyword(value: &str) -> bool {
    value.eq_ignore_ascii_case(NULL_KEYWORD)
}

fn list_item_sql(item: &str) -> String {
    let cleaned = strip_quote_layer(item);
    if is_numeric_literal(cleaned) {
        cleaned.to_string()
    } else {
        quote_sql_string(cleaned)
    }
}

fn strip_quote_layer(item: &str) -> &str {
    let item = item.strip_prefix('\'').unwrap_or(item);
    let item = item.strip_suffix('\'').unwrap_or(item);
    let item = item.strip_prefix('"').unwrap_or(item);
    item.strip_suffix('"').unwrap_or(item)
}

fn deserialize_filter_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(json_value_to_text(value))
}

fn json_value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(json_value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}
