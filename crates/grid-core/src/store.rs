use crate::config::QueryConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexProvisioner;
use crate::query::{plan_scan, PageRequest, RowPage, ScanSpec};
use crate::row::Row;
use crate::schema::{Column, ColumnType};
use crate::table::Table;
use crate::values::{generate_id, CellValue, Cells};
use crate::view::{
    are_view_scoped_states_equal, canonical_view_scoped_state, with_view_kind, View, ViewKind,
    ViewScopedState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Name of the view every new table starts with.
pub const DEFAULT_VIEW_NAME: &str = "Grid view";

/// Row storage as seen by the query layer.
pub trait RowStore {
    /// One page of a scan over a table, plus the matching total.
    fn list_rows(&self, table_id: &str, scan: &ScanSpec) -> CoreResult<RowPage>;
    fn get_row(&self, row_id: &str) -> CoreResult<Row>;
    /// Merge `partial` into the row: named cells are overwritten, the rest kept.
    fn update_row_cells(&mut self, row_id: &str, partial: Cells) -> CoreResult<Row>;
    fn count_rows(&self, table_id: &str) -> CoreResult<usize>;
}

/// What a client needs to render a table right away. Index provisioning
/// runs behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBootstrap {
    pub table_id: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub views: Vec<View>,
    pub row_count: usize,
}

/// In-memory tables, rows and views.
///
/// Callers are expected to have authorized access to the ids they pass.
#[derive(Debug, Default)]
pub struct Database {
    tables: HashMap<String, Table>,
    views: BTreeMap<String, View>,
    /// row id -> table id
    row_tables: HashMap<String, String>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table together with its default grid view.
    pub fn create_table(&mut self, name: &str) -> String {
        let table_id = generate_id();
        self.tables
            .insert(table_id.clone(), Table::new(table_id.clone(), name.trim()));
        self.insert_view(&table_id, DEFAULT_VIEW_NAME, ViewKind::Grid);
        table_id
    }

    pub fn table(&self, table_id: &str) -> CoreResult<&Table> {
        self.tables
            .get(table_id)
            .ok_or_else(|| CoreError::TableNotFound(table_id.to_owned()))
    }

    fn table_mut(&mut self, table_id: &str) -> CoreResult<&mut Table> {
        self.tables
            .get_mut(table_id)
            .ok_or_else(|| CoreError::TableNotFound(table_id.to_owned()))
    }

    fn table_of_row(&self, row_id: &str) -> CoreResult<&str> {
        self.row_tables
            .get(row_id)
            .map(String::as_str)
            .ok_or_else(|| CoreError::RowNotFound(row_id.to_owned()))
    }

    pub fn add_column(
        &mut self,
        table_id: &str,
        name: &str,
        column_type: ColumnType,
    ) -> CoreResult<Column> {
        self.table_mut(table_id)?.add_column(name, column_type)
    }

    pub fn columns(&self, table_id: &str) -> CoreResult<&[Column]> {
        Ok(self.table(table_id)?.columns())
    }

    pub fn insert_row(&mut self, table_id: &str, cells: Cells) -> CoreResult<String> {
        let row_id = generate_id();
        self.table_mut(table_id)?.insert(row_id.clone(), cells);
        self.row_tables.insert(row_id.clone(), table_id.to_owned());
        Ok(row_id)
    }

    /// Write raw user input into one cell, coerced to the column's type.
    pub fn set_cell(&mut self, row_id: &str, column_id: &str, raw: &str) -> CoreResult<Row> {
        let table_id = self.table_of_row(row_id)?.to_owned();
        let column_type = self.table(&table_id)?.column(column_id)?.column_type;
        let mut partial = Cells::new();
        partial.insert(column_id.to_owned(), CellValue::coerce(raw, column_type));
        self.update_row_cells(row_id, partial)
    }

    pub fn delete_row(&mut self, row_id: &str) -> CoreResult<Row> {
        let table_id = self.table_of_row(row_id)?.to_owned();
        let row = self.table_mut(&table_id)?.delete(row_id)?;
        self.row_tables.remove(row_id);
        Ok(row)
    }

    // --- views ---

    fn insert_view(&mut self, table_id: &str, name: &str, kind: ViewKind) -> View {
        let order = self
            .views
            .values()
            .filter(|v| v.table_id == table_id)
            .map(|v| v.order + 1)
            .max()
            .unwrap_or(0);
        let view = View {
            id: generate_id(),
            table_id: table_id.to_owned(),
            name: name.trim().to_owned(),
            order,
            filters: with_view_kind(&serde_json::Value::Null, kind),
        };
        self.views.insert(view.id.clone(), view.clone());
        view
    }

    pub fn create_view(&mut self, table_id: &str, name: &str, kind: ViewKind) -> CoreResult<View> {
        self.table(table_id)?;
        Ok(self.insert_view(table_id, name, kind))
    }

    pub fn view(&self, view_id: &str) -> CoreResult<&View> {
        self.views
            .get(view_id)
            .ok_or_else(|| CoreError::ViewNotFound(view_id.to_owned()))
    }

    /// Views of a table in display order.
    pub fn views(&self, table_id: &str) -> Vec<&View> {
        let mut views: Vec<&View> = self
            .views
            .values()
            .filter(|v| v.table_id == table_id)
            .collect();
        views.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        views
    }

    /// Persist a view's scoped state. Last write wins.
    ///
    /// The state is canonicalized before it is compared or stored. Returns
    /// `None` when the view no longer exists, so an autosave racing a delete
    /// is a no-op. An unchanged state is not rewritten.
    pub fn update_view_state(&mut self, view_id: &str, state: &ViewScopedState) -> Option<View> {
        let Some(view) = self.views.get_mut(view_id) else {
            tracing::debug!(view_id, "ignoring state update for deleted view");
            return None;
        };
        let canonical = canonical_view_scoped_state(state);
        if are_view_scoped_states_equal(Some(&view.scoped_state()), &canonical) {
            tracing::debug!(view_id, "view state unchanged");
            return Some(view.clone());
        }
        view.set_scoped_state(&canonical);
        Some(view.clone())
    }

    /// Delete a view, refusing to remove the last grid view of its table.
    pub fn delete_view(&mut self, view_id: &str) -> CoreResult<View> {
        let view = self.view(view_id)?;
        if view.kind() == ViewKind::Grid {
            let grid_views = self
                .views
                .values()
                .filter(|v| v.table_id == view.table_id && v.kind() == ViewKind::Grid)
                .count();
            if grid_views <= 1 {
                return Err(CoreError::LastGridView(view.table_id.clone()));
            }
        }
        self.views
            .remove(view_id)
            .ok_or_else(|| CoreError::ViewNotFound(view_id.to_owned()))
    }

    /// List rows through a view's saved search, filters and sort.
    pub fn list_view_rows(
        &self,
        view_id: &str,
        page: PageRequest,
        config: &QueryConfig,
    ) -> CoreResult<RowPage> {
        let view = self.view(view_id)?;
        let columns = self.columns(&view.table_id)?;
        let scan = plan_scan(&view.table_id, &view.scoped_state(), columns, page, config);
        self.list_rows(&view.table_id, &scan)
    }

    /// Table metadata for the first render. Index provisioning for every
    /// column is dispatched as detached tasks and never delays or fails this
    /// call; without a tokio runtime it is skipped.
    pub fn bootstrap_table(
        &self,
        table_id: &str,
        provisioner: &Arc<IndexProvisioner>,
    ) -> CoreResult<TableBootstrap> {
        let table = self.table(table_id)?;
        let columns = table.columns().to_vec();

        if tokio::runtime::Handle::try_current().is_ok() {
            // detached; provisioning outlives this call
            drop(provisioner.spawn_table_indexes(&columns));
        } else {
            tracing::warn!(table_id, "no async runtime; skipping index provisioning");
        }

        Ok(TableBootstrap {
            table_id: table.id().to_owned(),
            name: table.name().to_owned(),
            columns,
            views: self.views(table_id).into_iter().cloned().collect(),
            row_count: table.len(),
        })
    }
}

impl RowStore for Database {
    fn list_rows(&self, table_id: &str, scan: &ScanSpec) -> CoreResult<RowPage> {
        Ok(scan.execute(self.table(table_id)?.iter()))
    }

    fn get_row(&self, row_id: &str) -> CoreResult<Row> {
        let table_id = self.table_of_row(row_id)?;
        self.table(table_id)?.get(row_id).cloned()
    }

    fn update_row_cells(&mut self, row_id: &str, partial: Cells) -> CoreResult<Row> {
        let table_id = self.table_of_row(row_id)?.to_owned();
        self.table_mut(&table_id)?.patch(row_id, partial).cloned()
    }

    fn count_rows(&self, table_id: &str) -> CoreResult<usize> {
        Ok(self.table(table_id)?.len())
    }
}
