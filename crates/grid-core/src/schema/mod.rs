use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a column. Fixed once the column exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
        }
    }

    /// The operator catalog valid for filter conditions on this column type.
    pub fn operators(self) -> &'static [FilterOperator] {
        match self {
            Self::Text => TEXT_OPERATORS,
            Self::Number => NUMBER_OPERATORS,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field definition within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Display width in pixels.
    pub size: u32,
    pub order: i64,
}

/// Default display width for new columns.
pub const DEFAULT_COLUMN_SIZE: u32 = 200;

/// Filter operators, split into a text and a number catalog.
///
/// Conditions carry the operator as a raw string; it only becomes one of
/// these once it has been checked against the column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    // text
    Contains,
    DoesNotContain,
    Is,
    IsNot,
    // number
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    // both
    IsEmpty,
    IsNotEmpty,
}

const TEXT_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Contains,
    FilterOperator::DoesNotContain,
    FilterOperator::Is,
    FilterOperator::IsNot,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

const NUMBER_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::GreaterThan,
    FilterOperator::GreaterThanOrEqual,
    FilterOperator::LessThan,
    FilterOperator::LessThanOrEqual,
    FilterOperator::IsEmpty,
    FilterOperator::IsNotEmpty,
];

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::DoesNotContain => "doesNotContain",
            Self::Is => "is",
            Self::IsNot => "isNot",
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEqual => "greaterThanOrEqual",
            Self::LessThan => "lessThan",
            Self::LessThanOrEqual => "lessThanOrEqual",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }

    /// Resolve a raw operator against a column type's catalog.
    /// Returns `None` for unknown operators and for operators of the other type.
    pub fn parse(raw: &str, column_type: ColumnType) -> Option<Self> {
        column_type
            .operators()
            .iter()
            .copied()
            .find(|op| op.as_str() == raw)
    }

    pub fn requires_value(self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find a column by id.
pub fn find_column<'a>(columns: &'a [Column], column_id: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.id == column_id)
}
