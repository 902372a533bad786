//! SQL text for per-column index provisioning on the JSONB row store.
//!
//! Ids are checked by the caller to be hyphenated UUIDs before they get here;
//! they are still always emitted through [`quote_literal`], and every
//! identifier goes through [`quote_ident`].

use crate::config::RowTableLayout;
use crate::schema::ColumnType;
use crate::values::NUMERIC_PATTERN;
use sha2::{Digest, Sha256};

/// Hex characters of the id hash kept in index names.
const SHORT_HASH_LEN: usize = 8;

pub const ENABLE_TRIGRAM_SQL: &str = "CREATE EXTENSION IF NOT EXISTS pg_trgm";

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// First hex characters of the SHA-256 of `value`.
pub fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(SHORT_HASH_LEN);
    for byte in digest.iter().take(SHORT_HASH_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// GIN trigram index on the case-folded text, for substring filters.
    Trigram,
    /// B-tree on the case-folded text, for equality and sort.
    TextSort,
    /// B-tree on the guarded numeric cast.
    Number,
}

impl IndexKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Trigram => "trgm",
            Self::TextSort => "text",
            Self::Number => "num",
        }
    }

    /// Index kinds backing a column of the given type.
    pub fn for_column_type(column_type: ColumnType) -> &'static [IndexKind] {
        match column_type {
            ColumnType::Text => &[IndexKind::Trigram, IndexKind::TextSort],
            ColumnType::Number => &[IndexKind::Number],
        }
    }
}

/// Stable index name, well under the 63 byte identifier limit.
pub fn index_name(kind: IndexKind, table_id: &str, column_id: &str) -> String {
    format!(
        "grid_{}_{}_{}",
        kind.prefix(),
        short_hash(table_id),
        short_hash(column_id)
    )
}

/// `"schema"."table"`
pub fn qualified_table(layout: &RowTableLayout) -> String {
    format!("{}.{}", quote_ident(&layout.schema), quote_ident(&layout.table))
}

/// Raw text of a cell: `("cells" ->> 'col')`.
pub fn cell_text_raw(layout: &RowTableLayout, column_id: &str) -> String {
    format!(
        "({} ->> {})",
        quote_ident(&layout.cells_column),
        quote_literal(column_id)
    )
}

/// Case-folded cell text. Queries must use this exact expression for the
/// planner to match the text indexes.
pub fn cell_text_expr(layout: &RowTableLayout, column_id: &str) -> String {
    format!("lower{}", cell_text_raw(layout, column_id))
}

/// Numeric cell value, NULL when the text does not look like a number, so a
/// stray value never aborts the index build.
pub fn cell_number_expr(layout: &RowTableLayout, column_id: &str) -> String {
    let raw = cell_text_raw(layout, column_id);
    format!(
        "(CASE WHEN {raw} ~ {pattern} THEN {raw}::numeric ELSE NULL END)",
        pattern = quote_literal(NUMERIC_PATTERN)
    )
}

/// Partial-index predicate restricting rows to one user table.
pub fn table_predicate(layout: &RowTableLayout, table_id: &str) -> String {
    format!(
        "{} = {}",
        quote_ident(&layout.table_id_column),
        quote_literal(table_id)
    )
}

/// Builds `CREATE INDEX` statements for one row store layout.
#[derive(Debug, Clone, Copy)]
pub struct DdlBuilder<'a> {
    layout: &'a RowTableLayout,
    concurrently: bool,
}

impl<'a> DdlBuilder<'a> {
    pub fn new(layout: &'a RowTableLayout, concurrently: bool) -> Self {
        Self {
            layout,
            concurrently,
        }
    }

    pub fn create_index(&self, kind: IndexKind, table_id: &str, column_id: &str) -> String {
        let (method, key) = match kind {
            IndexKind::Trigram => (
                " USING gin",
                format!("({}) gin_trgm_ops", cell_text_expr(self.layout, column_id)),
            ),
            IndexKind::TextSort => ("", format!("({})", cell_text_expr(self.layout, column_id))),
            IndexKind::Number => ("", format!("({})", cell_number_expr(self.layout, column_id))),
        };
        format!(
            "CREATE INDEX {concurrently}IF NOT EXISTS {name} ON {table}{method} ({key}) \
             WHERE {predicate}",
            concurrently = if self.concurrently { "CONCURRENTLY " } else { "" },
            name = quote_ident(&index_name(kind, table_id, column_id)),
            table = qualified_table(self.layout),
            predicate = table_predicate(self.layout, table_id),
        )
    }

    /// All index statements for a column, in execution order.
    pub fn statements_for(
        &self,
        column_type: ColumnType,
        table_id: &str,
        column_id: &str,
    ) -> Vec<String> {
        IndexKind::for_column_type(column_type)
            .iter()
            .map(|kind| self.create_index(*kind, table_id, column_id))
            .collect()
    }
}
