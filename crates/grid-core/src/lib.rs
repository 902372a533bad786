pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod query;
pub mod row;
pub mod schema;
pub mod store;
pub mod table;
pub mod values;
pub mod view;

pub use config::{GridConfig, ProvisionerConfig, QueryConfig, RowTableLayout};
pub use error::{CoreError, CoreResult};
pub use filter::{
    normalize_filter_groups, normalize_filter_groups_for_query, normalize_sorting_state,
    FilterCondition, FilterConditionGroup, FilterJoin, GroupMode, QueryFilterCondition,
    QueryFilterGroup, SortingEntry,
};
pub use index::{DdlExecutor, IndexKey, IndexProvisioner, ProvisionOutcome, ProvisionState};
pub use query::{plan_scan, PageRequest, RowPage, ScanSpec, SqlQuery};
pub use row::Row;
pub use schema::{Column, ColumnType, FilterOperator};
pub use store::{Database, RowStore, TableBootstrap};
pub use table::Table;
pub use values::{CellValue, Cells};
pub use view::{
    are_view_scoped_states_equal, parse_view_scoped_state_from_filters,
    write_view_scoped_state_to_filters, View, ViewKind, ViewScopedState,
};
