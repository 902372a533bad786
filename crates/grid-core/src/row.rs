use crate::values::{CellValue, Cells};
use serde::{Deserialize, Serialize};

static NULL_CELL: CellValue = CellValue::Null;

/// A record in a table.
///
/// `cells` has no fixed schema: it is keyed by column id and a missing key
/// reads the same as an explicit null. `order` sequences rows for display;
/// ties are broken by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    pub table_id: String,
    pub cells: Cells,
    pub order: i64,
}

impl Row {
    pub fn new(
        id: impl Into<String>,
        table_id: impl Into<String>,
        cells: Cells,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            table_id: table_id.into(),
            cells,
            order,
        }
    }

    /// Cell value for a column; absent keys read as `Null`.
    pub fn cell(&self, column_id: &str) -> &CellValue {
        self.cells.get(column_id).unwrap_or(&NULL_CELL)
    }

    /// Merge a partial cell map: named keys are overwritten, others are left alone.
    pub fn merge_cells(&mut self, partial: Cells) {
        for (column_id, value) in partial {
            self.cells.insert(column_id, value);
        }
    }
}
