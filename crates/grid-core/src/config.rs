use crate::error::{CoreError, CoreResult};

/// Physical layout of the shared row store (one JSONB row table for all
/// user tables).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowTableLayout {
    /// Schema holding the row table.
    pub schema: String,
    /// Row table name.
    pub table: String,
    /// JSONB column holding the cell map.
    pub cells_column: String,
    /// Column holding the owning table id.
    pub table_id_column: String,
    /// Row id column.
    pub id_column: String,
    /// Display order column.
    pub order_column: String,
}

impl Default for RowTableLayout {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            table: "rows".to_string(),
            cells_column: "cells".to_string(),
            table_id_column: "table_id".to_string(),
            id_column: "id".to_string(),
            order_column: "order".to_string(),
        }
    }
}

/// Index provisioner settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Issue index DDL at all.
    pub enabled: bool,
    /// Build indexes with `CREATE INDEX CONCURRENTLY`.
    pub concurrently: bool,
    pub layout: RowTableLayout,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrently: true,
            layout: RowTableLayout::default(),
        }
    }
}

/// Scan planning limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    /// Page size used when the caller does not ask for one.
    pub default_page_size: usize,
    /// Hard cap on rows returned by one scan.
    pub max_page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
        }
    }
}

/// Runtime configuration for the grid core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridConfig {
    pub provisioner: ProvisionerConfig,
    pub query: QueryConfig,
}

impl GridConfig {
    /// Loads configuration from `GRID_*` environment variables with defaults.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let layout_defaults = defaults.provisioner.layout;

        let layout = RowTableLayout {
            schema: lookup("GRID_ROWS_SCHEMA").unwrap_or(layout_defaults.schema),
            table: lookup("GRID_ROWS_TABLE").unwrap_or(layout_defaults.table),
            cells_column: lookup("GRID_ROWS_CELLS_COLUMN").unwrap_or(layout_defaults.cells_column),
            table_id_column: lookup("GRID_ROWS_TABLE_ID_COLUMN")
                .unwrap_or(layout_defaults.table_id_column),
            id_column: lookup("GRID_ROWS_ID_COLUMN").unwrap_or(layout_defaults.id_column),
            order_column: lookup("GRID_ROWS_ORDER_COLUMN").unwrap_or(layout_defaults.order_column),
        };
        for (key, value) in [
            ("GRID_ROWS_SCHEMA", &layout.schema),
            ("GRID_ROWS_TABLE", &layout.table),
            ("GRID_ROWS_CELLS_COLUMN", &layout.cells_column),
            ("GRID_ROWS_TABLE_ID_COLUMN", &layout.table_id_column),
            ("GRID_ROWS_ID_COLUMN", &layout.id_column),
            ("GRID_ROWS_ORDER_COLUMN", &layout.order_column),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Config(format!("{key} must not be empty")));
            }
        }

        let provisioner = ProvisionerConfig {
            enabled: parse_bool(
                "GRID_INDEX_PROVISIONING",
                lookup("GRID_INDEX_PROVISIONING"),
                defaults.provisioner.enabled,
            )?,
            concurrently: parse_bool(
                "GRID_INDEX_CONCURRENTLY",
                lookup("GRID_INDEX_CONCURRENTLY"),
                defaults.provisioner.concurrently,
            )?,
            layout,
        };

        let max_page_size = parse_usize(
            "GRID_MAX_PAGE_SIZE",
            lookup("GRID_MAX_PAGE_SIZE"),
            defaults.query.max_page_size,
        )?
        .max(1);
        let default_page_size = parse_usize(
            "GRID_DEFAULT_PAGE_SIZE",
            lookup("GRID_DEFAULT_PAGE_SIZE"),
            defaults.query.default_page_size,
        )?
        .clamp(1, max_page_size);

        Ok(Self {
            provisioner,
            query: QueryConfig {
                default_page_size,
                max_page_size,
            },
        })
    }
}

fn parse_bool(key: &str, value: Option<String>, default_value: bool) -> CoreResult<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(default_value),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(CoreError::Config(format!("{key}: invalid bool value: {raw}"))),
        },
    }
}

fn parse_usize(key: &str, value: Option<String>, default_value: usize) -> CoreResult<usize> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|err| CoreError::Config(format!("{key}: invalid usize value {raw}: {err}"))),
        None => Ok(default_value),
    }
}
