use crate::error::{CoreError, CoreResult};
use crate::row::Row;
use crate::schema::{Column, ColumnType, DEFAULT_COLUMN_SIZE};
use crate::values::{generate_id, Cells};
use std::collections::BTreeMap;

/// A user table: typed columns plus rows keyed by id.
///
/// Rows live in a BTreeMap so iteration is deterministic; display order
/// comes from `Row::order`, assigned densely on insert.
#[derive(Debug)]
pub struct Table {
    id: String,
    name: String,
    columns: Vec<Column>,
    rows: BTreeMap<String, Row>,
    next_row_order: i64,
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            columns: Vec::new(),
            rows: BTreeMap::new(),
            next_row_order: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, column_id: &str) -> CoreResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.id == column_id)
            .ok_or_else(|| CoreError::ColumnNotFound(format!("{}:{}", self.id, column_id)))
    }

    /// Add a column. Names are unique per table, ignoring case.
    pub fn add_column(&mut self, name: &str, column_type: ColumnType) -> CoreResult<Column> {
        let name = name.trim();
        if self
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(CoreError::DuplicateColumn(name.to_owned()));
        }
        let column = Column {
            id: generate_id(),
            table_id: self.id.clone(),
            name: name.to_owned(),
            column_type,
            size: DEFAULT_COLUMN_SIZE,
            order: self.columns.len() as i64,
        };
        self.columns.push(column.clone());
        Ok(column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row with the next display order.
    pub fn insert(&mut self, id: String, cells: Cells) -> &Row {
        let order = self.next_row_order;
        self.next_row_order += 1;
        let row = Row::new(id.clone(), self.id.clone(), cells, order);
        self.rows.entry(id).or_insert(row)
    }

    pub fn get(&self, row_id: &str) -> CoreResult<&Row> {
        self.rows
            .get(row_id)
            .ok_or_else(|| CoreError::RowNotFound(format!("{}:{}", self.id, row_id)))
    }

    /// Merge cells into an existing row.
    pub fn patch(&mut self, row_id: &str, partial: Cells) -> CoreResult<&Row> {
        let row = self
            .rows
            .get_mut(row_id)
            .ok_or_else(|| CoreError::RowNotFound(format!("{}:{}", self.id, row_id)))?;
        row.merge_cells(partial);
        Ok(row)
    }

    pub fn delete(&mut self, row_id: &str) -> CoreResult<Row> {
        self.rows
            .remove(row_id)
            .ok_or_else(|| CoreError::RowNotFound(format!("{}:{}", self.id, row_id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }
}
