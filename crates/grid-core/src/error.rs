use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("row not found: {0}")]
    RowNotFound(String),
    #[error("view not found: {0}")]
    ViewNotFound(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("table {0} must keep at least one grid view")]
    LastGridView(String),
    #[error("ddl failed: {0}")]
    Ddl(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}
