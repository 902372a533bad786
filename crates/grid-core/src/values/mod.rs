pub mod id;

pub use id::{generate_id, is_uuid};

use crate::schema::ColumnType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Cell map of a row, keyed by column id. An absent key reads as `Null`.
pub type Cells = BTreeMap<String, CellValue>;

/// Numeric cell format. The number index uses the same pattern to guard its
/// cast, so whatever parses here is exactly what the index covers.
pub const NUMERIC_PATTERN: &str = r"^-?\d+(\.\d+)?$";

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(NUMERIC_PATTERN).unwrap_or_else(|err| panic!("numeric pattern: {err}"))
});

/// Largest magnitude at which every integer is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single cell value.
///
/// Rows are schema-optional, so a number column may still hold text that was
/// written before the column type mattered; readers degrade instead of failing.
///
/// Whole numbers serialize as JSON integers, so the text PostgreSQL reads back
/// with `->>` is the same as [`CellValue::display_text`].
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Empty means null or whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading of the cell. Text cells count only when they match
    /// [`NUMERIC_PATTERN`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Text rendering used by search and text filters.
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }

    /// Turn raw user input into a cell for a column of the given type.
    ///
    /// Blank input clears the cell. Number columns store a number when the
    /// input parses and keep the text otherwise.
    pub fn coerce(raw: &str, column_type: ColumnType) -> Self {
        if raw.trim().is_empty() {
            return Self::Null;
        }
        match column_type {
            ColumnType::Text => Self::Text(raw.to_owned()),
            ColumnType::Number => match parse_number(raw) {
                Some(n) => Self::Number(n),
                None => Self::Text(raw.to_owned()),
            },
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Number(n) => match whole_number(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

fn whole_number(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER).then_some(n as i64)
}

/// Parse a number in the strict cell format (`-12`, `3.5`; no exponent,
/// no thousands separators). Surrounding whitespace is ignored.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !NUMERIC_RE.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a number for display: integers without a fraction, no trailing
/// zeros, `-0` shown as `0`. Non-finite values render empty.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    format!("{n}")
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ---------------------------------------------------------------------------
// JSON interop
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for CellValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::Bool(b) => Self::Text(b.to_string()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<CellValue> for serde_json::Value {
    fn from(v: CellValue) -> Self {
        match v {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Number(n) => match whole_number(n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(n)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number),
            },
            CellValue::Text(s) => serde_json::Value::String(s),
        }
    }
}

/// Build a cell map from `(column id, value)` pairs.
pub fn cells<K, V, I>(pairs: I) -> Cells
where
    K: Into<String>,
    V: Into<CellValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
