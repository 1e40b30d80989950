use serde_json::Value;
use thiserror::Error;

const INDENT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonTokenKind {
    Key,
    String,
    Number,
    Boolean,
    Null,
    Punctuation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonToken {
    pub kind: JsonTokenKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid JSON:\n\n{message}")]
pub struct JsonInspectError {
    message: String,
}

/// A pretty-printed document split into highlightable tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighlightedJson {
    tokens: Vec<JsonToken>,
}

impl HighlightedJson {
    #[must_use]
    pub fn tokens(&self) -> &[JsonToken] {
        &self.tokens
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.tokens.iter().map(|token| token.text.as_str()).collect()
    }

    /// Tokens grouped per output line, splitting punctuation tokens on newlines.
    #[must_use]
    pub fn lines(&self) -> Vec<Vec<JsonToken>> {
        let mut lines = vec![Vec::new()];
        for token in &self.tokens {
            let mut parts = token.text.split('\n');
            if let Some(first) = parts.next() {
                push_piece(&mut lines, token.kind, first);
            }
            for part in parts {
                lines.push(Vec::new());
                push_piece(&mut lines, token.kind, part);
            }
        }
        lines
    }

    fn push(&mut self, kind: JsonTokenKind, text: impl Into<String>) {
        self.tokens.push(JsonToken {
            kind,
            text: text.into(),
        });
    }

    fn render(&mut self, value: &Value, indent: usize) {
        let inner_pad = " ".repeat(indent + INDENT_WIDTH);
        let closing_pad = " ".repeat(indent);
        match value {
            Value::Object(entries) => {
                if entries.is_empty() {
                    self.push(JsonTokenKind::Punctuation, "{}");
                    return;
                }
                self.push(JsonTokenKind::Punctuation, "{\n");
                for (index, (key, item)) in entries.iter().enumerate() {
                    self.push(JsonTokenKind::Punctuation, inner_pad.clone());
                    self.push(JsonTokenKind::Key, Value::String(key.clone()).to_string());
                    self.push(JsonTokenKind::Punctuation, ": ");
                    self.render(item, indent + INDENT_WIDTH);
                    if index + 1 < entries.len() {
                        self.push(JsonTokenKind::Punctuation, ",\n");
                    }
                }
                self.push(JsonTokenKind::Punctuation, format!("\n{closing_pad}}}"));
            }
            Value::Array(items) => {
                if items.is_empty() {
                    self.push(JsonTokenKind::Punctuation, "[]");
                    return;
                }
                self.push(JsonTokenKind::Punctuation, "[\n");
                for (index, item) in items.iter().enumerate() {
                    self.push(JsonTokenKind::Punctuation, inner_pad.clone());
                    self.render(item, indent + INDENT_WIDTH);
                    if index + 1 < items.len() {
                        self.push(JsonTokenKind::Punctuation, ",\n");
                    }
                }
                self.push(JsonTokenKind::Punctuation, format!("\n{closing_pad}]"));
            }
            Value::String(_) => self.push(JsonTokenKind::String, value.to_string()),
            Value::Number(number) => self.push(JsonTokenKind::Number, number.to_string()),
            Value::Bool(flag) => self.push(JsonTokenKind::Boolean, flag.to_string()),
            Value::Null => self.push(JsonTokenKind::Null, "null"),
        }
    }
}

fn push_piece(lines: &mut [Vec<JsonToken>], kind: JsonTokenKind, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(line) = lines.last_mut() {
        line.push(JsonToken {
            kind,
            text: text.to_string(),
        });
    }
}

/// Parses `input` and pretty-prints it with 4-space indentation, keeping key order.
pub fn pretty_print(input: &str) -> Result<HighlightedJson, JsonInspectError> {
    let value: Value = serde_json::from_str(input.trim()).map_err(|err| JsonInspectError {
        message: err.to_string(),
    })?;
    Ok(highlight(&value))
}

#[must_use]
pub fn highlight(value: &Value) -> HighlightedJson {
    let mut document = HighlightedJson::default();
    document.render(value, 0);
    document
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellInspection {
    /// Blank or `NULL` cell; nothing to inspect.
    Empty,
    Document(HighlightedJson),
    Primitive,
    NotJson,
}

impl CellInspection {
    #[must_use]
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Document(_) => Some("JSON detected and formatted."),
            Self::Primitive => {
                Some("Cell value is valid primitive JSON, but not an object or array.")
            }
            Self::NotJson => Some("Cell content is not valid JSON."),
        }
    }
}

#[must_use]
pub fn inspect_cell(cell: &str) -> CellInspection {
    if cell.is_empty() || cell == "NULL" {
        return CellInspection::Empty;
    }
    match serde_json::from_str::<Value>(cell) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            CellInspection::Document(highlight(&value))
        }
        Ok(_) => CellInspection::Primitive,
        Err(_) => CellInspection::NotJson,
    }
}
