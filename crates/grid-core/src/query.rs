//! Scan planning: turn a view's canonical state plus column metadata into a
//! bounded, deterministic scan over one table's rows.

use crate::config::{QueryConfig, RowTableLayout};
use crate::filter::{normalize_filter_groups_for_query, FilterJoin, QueryFilterCondition};
use crate::index::ddl::{
    cell_number_expr, cell_text_expr, cell_text_raw, qualified_table, quote_ident, quote_literal,
};
use crate::row::Row;
use crate::schema::{find_column, Column, ColumnType, FilterOperator};
use crate::values::{format_number, parse_number, CellValue};
use crate::view::ViewScopedState;
use serde::Serialize;
use std::cmp::Ordering;

/// Requested window; `limit` falls back to the configured default page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Resolved operand of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// Case-folded text.
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCondition {
    pub column_id: String,
    pub column_type: ColumnType,
    pub operator: FilterOperator,
    pub operand: Operand,
    pub join: FilterJoin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGroup {
    pub join: FilterJoin,
    pub conditions: Vec<PlannedCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column_id: String,
    pub column_type: ColumnType,
    pub desc: bool,
}

/// Everything a row store needs to answer one listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSpec {
    pub table_id: String,
    pub filter: Vec<PlannedGroup>,
    pub sort: Option<SortSpec>,
    /// Case-folded search text, `None` when the search box is blank.
    pub search: Option<String>,
    /// Columns searched: every column not hidden by the view.
    pub search_columns: Vec<String>,
    pub offset: usize,
    pub limit: usize,
}

/// One page of a scan plus the number of rows matching before paging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowPage {
    pub rows: Vec<Row>,
    pub total: usize,
}

/// SQL text plus its positional (`$n`) text parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Plan a scan for a view.
///
/// Conditions that do not fit the table (unknown column, operator outside
/// the column's catalog, number operand that does not parse) are dropped
/// like any other malformed filter; a sort on an unknown column is ignored.
pub fn plan_scan(
    table_id: &str,
    state: &ViewScopedState,
    columns: &[Column],
    page: PageRequest,
    config: &QueryConfig,
) -> ScanSpec {
    let filter: Vec<PlannedGroup> = normalize_filter_groups_for_query(&state.filter_groups)
        .into_iter()
        .filter_map(|group| {
            let conditions: Vec<PlannedCondition> = group
                .conditions
                .iter()
                .filter_map(|condition| plan_condition(condition, columns))
                .collect();
            (!conditions.is_empty()).then_some(PlannedGroup {
                join: group.join,
                conditions,
            })
        })
        .collect();

    let sort = state.sorting.first().and_then(|entry| {
        let column = find_column(columns, &entry.id)?;
        Some(SortSpec {
            column_id: column.id.clone(),
            column_type: column.column_type,
            desc: entry.desc,
        })
    });

    let search = Some(state.search_query.trim().to_lowercase()).filter(|q| !q.is_empty());
    let search_columns = columns
        .iter()
        .filter(|column| !state.hidden_field_ids.contains(&column.id))
        .map(|column| column.id.clone())
        .collect();

    let limit = page
        .limit
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size.max(1));

    ScanSpec {
        table_id: table_id.to_owned(),
        filter: force_leading_joins(filter),
        sort,
        search,
        search_columns,
        offset: page.offset,
        limit,
    }
}

fn plan_condition(
    condition: &QueryFilterCondition,
    columns: &[Column],
) -> Option<PlannedCondition> {
    let Some(column) = find_column(columns, &condition.column_id) else {
        tracing::debug!(column_id = %condition.column_id, "dropping filter on unknown column");
        return None;
    };
    let Some(operator) = FilterOperator::parse(&condition.operator, column.column_type) else {
        tracing::debug!(
            column_id = %condition.column_id,
            operator = %condition.operator,
            "dropping filter with operator outside the column catalog"
        );
        return None;
    };
    let operand = match (operator.requires_value(), condition.value.as_deref()) {
        (false, _) => Operand::None,
        (true, None) => return None,
        (true, Some(value)) => match column.column_type {
            ColumnType::Text => Operand::Text(value.to_lowercase()),
            ColumnType::Number => Operand::Number(parse_number(value)?),
        },
    };
    Some(PlannedCondition {
        column_id: column.id.clone(),
        column_type: column.column_type,
        operator,
        operand,
        join: condition.join,
    })
}

/// Re-apply the first-element rule after conditions or groups were dropped.
fn force_leading_joins(mut groups: Vec<PlannedGroup>) -> Vec<PlannedGroup> {
    for (index, group) in groups.iter_mut().enumerate() {
        if index == 0 {
            group.join = FilterJoin::And;
        }
        if let Some(first) = group.conditions.first_mut() {
            first.join = FilterJoin::And;
        }
    }
    groups
}

fn combine(acc: bool, join: FilterJoin, next: bool) -> bool {
    match join {
        FilterJoin::And => acc && next,
        FilterJoin::Or => acc || next,
    }
}

impl PlannedCondition {
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.cell(&self.column_id);
        match self.operator {
            FilterOperator::IsEmpty => cell.is_empty(),
            FilterOperator::IsNotEmpty => !cell.is_empty(),
            FilterOperator::Contains
            | FilterOperator::DoesNotContain
            | FilterOperator::Is
            | FilterOperator::IsNot => {
                let Operand::Text(needle) = &self.operand else {
                    return false;
                };
                let text = cell.display_text().to_lowercase();
                match self.operator {
                    FilterOperator::Contains => text.contains(needle.as_str()),
                    FilterOperator::DoesNotContain => !text.contains(needle.as_str()),
                    FilterOperator::Is => !cell.is_null() && &text == needle,
                    _ => &text != needle,
                }
            }
            _ => {
                let (Operand::Number(rhs), Some(lhs)) = (&self.operand, cell.as_number()) else {
                    return false;
                };
                match self.operator {
                    FilterOperator::Equals => lhs == *rhs,
                    FilterOperator::NotEquals => lhs != *rhs,
                    FilterOperator::GreaterThan => lhs > *rhs,
                    FilterOperator::GreaterThanOrEqual => lhs >= *rhs,
                    FilterOperator::LessThan => lhs < *rhs,
                    FilterOperator::LessThanOrEqual => lhs <= *rhs,
                    _ => false,
                }
            }
        }
    }
}

impl PlannedGroup {
    /// Left fold: `((c0 j1 c1) j2 c2) ...`.
    pub fn matches(&self, row: &Row) -> bool {
        let mut conditions = self.conditions.iter();
        let Some(first) = conditions.next() else {
            return true;
        };
        conditions.fold(first.matches(row), |acc, condition| {
            combine(acc, condition.join, condition.matches(row))
        })
    }
}

impl SortSpec {
    /// Nulls sort last ascending and first descending.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = match self.column_type {
            ColumnType::Text => cmp_nulls_last(
                sort_text(a.cell(&self.column_id)),
                sort_text(b.cell(&self.column_id)),
                |x, y| x.cmp(y),
            ),
            ColumnType::Number => cmp_nulls_last(
                a.cell(&self.column_id).as_number(),
                b.cell(&self.column_id).as_number(),
                |x, y| x.total_cmp(y),
            ),
        };
        if self.desc {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn sort_text(cell: &CellValue) -> Option<String> {
    (!cell.is_null()).then(|| cell.display_text().to_lowercase())
}

fn cmp_nulls_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl ScanSpec {
    /// Filter and search predicate for one row.
    pub fn matches(&self, row: &Row) -> bool {
        if row.table_id != self.table_id {
            return false;
        }
        let mut groups = self.filter.iter();
        let filtered = match groups.next() {
            None => true,
            Some(first) => groups.fold(first.matches(row), |acc, group| {
                combine(acc, group.join, group.matches(row))
            }),
        };
        filtered && self.matches_search(row)
    }

    fn matches_search(&self, row: &Row) -> bool {
        let Some(needle) = &self.search else {
            return true;
        };
        self.search_columns.iter().any(|column_id| {
            row.cell(column_id)
                .display_text()
                .to_lowercase()
                .contains(needle.as_str())
        })
    }

    /// Total order: sort column, then row order, then row id.
    pub fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        self.sort
            .as_ref()
            .map_or(Ordering::Equal, |sort| sort.compare(a, b))
            .then_with(|| a.order.cmp(&b.order))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Run the scan over an in-memory row set.
    pub fn execute<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> RowPage {
        let mut matched: Vec<&Row> = rows.into_iter().filter(|row| self.matches(row)).collect();
        matched.sort_by(|a, b| self.compare_rows(a, b));
        let total = matched.len();
        let rows = matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect();
        RowPage { rows, total }
    }

    /// Render the page query for PostgreSQL.
    ///
    /// Cell expressions are spelled exactly like the provisioned index
    /// expressions, and the table id is inlined so partial indexes qualify.
    pub fn to_sql(&self, layout: &RowTableLayout) -> SqlQuery {
        let mut writer = SqlWriter::default();
        let predicate = self.where_clause(layout, &mut writer);
        let sort_key = self.sort.as_ref().map(|sort| {
            let expr = match sort.column_type {
                ColumnType::Text => cell_text_expr(layout, &sort.column_id),
                ColumnType::Number => cell_number_expr(layout, &sort.column_id),
            };
            format!("{expr} {}, ", if sort.desc { "DESC" } else { "ASC" })
        });
        let sql = format!(
            "SELECT {id}, {table_id}, {cells}, {order} FROM {table} WHERE {predicate} \
             ORDER BY {sort_key}{order} ASC, {id} ASC LIMIT {limit} OFFSET {offset}",
            id = quote_ident(&layout.id_column),
            table_id = quote_ident(&layout.table_id_column),
            cells = quote_ident(&layout.cells_column),
            order = quote_ident(&layout.order_column),
            table = qualified_table(layout),
            sort_key = sort_key.unwrap_or_default(),
            limit = self.limit,
            offset = self.offset,
        );
        SqlQuery {
            sql,
            params: writer.params,
        }
    }

    /// Render the matching-row count for PostgreSQL.
    pub fn to_count_sql(&self, layout: &RowTableLayout) -> SqlQuery {
        let mut writer = SqlWriter::default();
        let predicate = self.where_clause(layout, &mut writer);
        SqlQuery {
            sql: format!("SELECT count(*) FROM {} WHERE {predicate}", qualified_table(layout)),
            params: writer.params,
        }
    }

    fn where_clause(&self, layout: &RowTableLayout, writer: &mut SqlWriter) -> String {
        let mut clauses = vec![format!(
            "{} = {}",
            quote_ident(&layout.table_id_column),
            quote_literal(&self.table_id)
        )];

        let mut groups = self.filter.iter();
        if let Some(first) = groups.next() {
            let first_sql = group_sql(first, layout, writer);
            clauses.push(groups.fold(first_sql, |acc, group| {
                let next = group_sql(group, layout, writer);
                format!("({acc} {} {next})", join_keyword(group.join))
            }));
        }

        if let Some(needle) = &self.search {
            if self.search_columns.is_empty() {
                clauses.push("FALSE".to_owned());
            } else {
                let placeholder = writer.push(like_pattern(needle));
                let any: Vec<String> = self
                    .search_columns
                    .iter()
                    .map(|column_id| {
                        format!("{} LIKE {placeholder}", cell_text_expr(layout, column_id))
                    })
                    .collect();
                clauses.push(format!("({})", any.join(" OR ")));
            }
        }

        clauses.join(" AND ")
    }
}

fn join_keyword(join: FilterJoin) -> &'static str {
    match join {
        FilterJoin::And => "AND",
        FilterJoin::Or => "OR",
    }
}

fn group_sql(group: &PlannedGroup, layout: &RowTableLayout, writer: &mut SqlWriter) -> String {
    let mut conditions = group.conditions.iter();
    let Some(first) = conditions.next() else {
        return "TRUE".to_owned();
    };
    let first_sql = condition_sql(first, layout, writer);
    conditions.fold(first_sql, |acc, condition| {
        let next = condition_sql(condition, layout, writer);
        format!("({acc} {} {next})", join_keyword(condition.join))
    })
}

fn condition_sql(
    condition: &PlannedCondition,
    layout: &RowTableLayout,
    writer: &mut SqlWriter,
) -> String {
    let column_id = condition.column_id.as_str();
    let text = cell_text_expr(layout, column_id);
    let blank = format!("COALESCE(btrim({}), '')", cell_text_raw(layout, column_id));
    match (&condition.operator, &condition.operand) {
        (FilterOperator::IsEmpty, _) => format!("({blank} = '')"),
        (FilterOperator::IsNotEmpty, _) => format!("({blank} <> '')"),
        (FilterOperator::Contains, Operand::Text(needle)) => {
            format!("({text} LIKE {})", writer.push(like_pattern(needle)))
        }
        (FilterOperator::DoesNotContain, Operand::Text(needle)) => {
            format!("(COALESCE({text}, '') NOT LIKE {})", writer.push(like_pattern(needle)))
        }
        (FilterOperator::Is, Operand::Text(needle)) => {
            format!("({text} = {})", writer.push(needle.clone()))
        }
        (FilterOperator::IsNot, Operand::Text(needle)) => {
            format!("(COALESCE({text}, '') <> {})", writer.push(needle.clone()))
        }
        (operator, Operand::Number(n)) => {
            let symbol = match operator {
                FilterOperator::Equals => "=",
                FilterOperator::NotEquals => "<>",
                FilterOperator::GreaterThan => ">",
                FilterOperator::GreaterThanOrEqual => ">=",
                FilterOperator::LessThan => "<",
                FilterOperator::LessThanOrEqual => "<=",
                _ => return "FALSE".to_owned(),
            };
            format!(
                "({} {symbol} {}::numeric)",
                cell_number_expr(layout, column_id),
                writer.push(format_number(*n))
            )
        }
        _ => "FALSE".to_owned(),
    }
}

/// `%needle%` with LIKE metacharacters escaped (default `\` escape).
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Default)]
struct SqlWriter {
    params: Vec<String>,
}

impl SqlWriter {
    fn push(&mut self, value: String) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterCondition, FilterConditionGroup, GroupMode, SortingEntry};
    use crate::values::cells;

    fn column(id: &str, column_type: ColumnType) -> Column {
        Column {
            id: id.into(),
            table_id: "t".into(),
            name: id.into(),
            column_type,
            size: 200,
            order: 0,
        }
    }

    fn columns() -> Vec<Column> {
        vec![column("name", ColumnType::Text), column("qty", ColumnType::Number)]
    }

    fn cond(column_id: &str, operator: &str, value: &str, join: FilterJoin) -> FilterCondition {
        FilterCondition {
            id: format!("{column_id}-{operator}"),
            column_id: column_id.into(),
            operator: operator.into(),
            value: value.into(),
            join,
        }
    }

    fn state_with(groups: Vec<Vec<FilterCondition>>, joins: &[FilterJoin]) -> ViewScopedState {
        ViewScopedState {
            filter_groups: groups
                .into_iter()
                .enumerate()
                .map(|(i, conditions)| FilterConditionGroup {
                    id: format!("g{i}"),
                    mode: GroupMode::Group,
                    join: joins.get(i).copied().unwrap_or_default(),
                    conditions,
                })
                .collect(),
            ..ViewScopedState::default()
        }
    }

    fn row(id: &str, order: i64, name: &str, qty: CellValue) -> Row {
        Row::new(id, "t", cells([("name", CellValue::from(name)), ("qty", qty)]), order)
    }

    fn rows() -> Vec<Row> {
        vec![
            row("r1", 0, "Apple", CellValue::from(5i64)),
            row("r2", 1, "Banana", CellValue::from("12")),
            row("r3", 2, "cherry", CellValue::from("lots")),
            Row::new("r4", "t", cells([("qty", CellValue::from(40i64))]), 3),
            Row::new("x1", "other", cells([("name", CellValue::from("Apple"))]), 0),
        ]
    }

    fn ids(page: &RowPage) -> Vec<&str> {
        page.rows.iter().map(|r| r.id.as_str()).collect()
    }

    fn plan(state: &ViewScopedState) -> ScanSpec {
        plan_scan("t", state, &columns(), PageRequest::default(), &QueryConfig::default())
    }

    #[test]
    fn empty_state_lists_table_in_order() {
        let scan = plan(&ViewScopedState::default());
        let page = scan.execute(&rows());
        assert_eq!(ids(&page), vec!["r1", "r2", "r3", "r4"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn text_contains_is_case_insensitive() {
        let state = state_with(vec![vec![cond("name", "contains", "AN", FilterJoin::And)]], &[]);
        let page = plan(&state).execute(&rows());
        assert_eq!(ids(&page), vec!["r2"]);
    }

    #[test]
    fn number_comparison_skips_non_numeric_cells() {
        let state = state_with(vec![vec![cond("qty", "greaterThan", "4", FilterJoin::And)]], &[]);
        let page = plan(&state).execute(&rows());
        assert_eq!(ids(&page), vec!["r1", "r2", "r4"]);
    }

    #[test]
    fn conditions_fold_left_to_right() {
        // (name contains a OR qty >= 40) AND qty < 10
        let state = state_with(
            vec![vec![
                cond("name", "contains", "a", FilterJoin::And),
                cond("qty", "greaterThanOrEqual", "40", FilterJoin::Or),
                cond("qty", "lessThan", "10", FilterJoin::And),
            ]],
            &[],
        );
        let page = plan(&state).execute(&rows());
        assert_eq!(ids(&page), vec!["r1"]);
    }

    #[test]
    fn groups_combine_with_their_join() {
        let state = state_with(
            vec![
                vec![cond("name", "is", "apple", FilterJoin::And)],
                vec![cond("name", "isEmpty", "", FilterJoin::And)],
            ],
            &[FilterJoin::Or, FilterJoin::Or],
        );
        let scan = plan(&state);
        assert_eq!(scan.filter[0].join, FilterJoin::And);
        assert_eq!(ids(&scan.execute(&rows())), vec!["r1", "r4"]);
    }

    #[test]
    fn conditions_that_do_not_fit_are_dropped() {
        let state = state_with(
            vec![
                vec![
                    cond("ghost", "contains", "x", FilterJoin::And),
                    cond("name", "greaterThan", "3", FilterJoin::And),
                    cond("qty", "equals", "many", FilterJoin::And),
                ],
                vec![
                    cond("ghost", "is", "x", FilterJoin::And),
                    cond("name", "contains", "err", FilterJoin::Or),
                ],
            ],
            &[FilterJoin::And, FilterJoin::Or],
        );
        let scan = plan(&state);
        assert_eq!(scan.filter.len(), 1);
        assert_eq!(scan.filter[0].join, FilterJoin::And);
        assert_eq!(scan.filter[0].conditions.len(), 1);
        assert_eq!(scan.filter[0].conditions[0].join, FilterJoin::And);
        assert_eq!(ids(&scan.execute(&rows())), vec!["r3"]);
    }

    #[test]
    fn negative_text_operators_include_empty_cells() {
        let state = state_with(
            vec![vec![cond("name", "doesNotContain", "a", FilterJoin::And)]],
            &[],
        );
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r3", "r4"]);

        let state = state_with(vec![vec![cond("name", "isNot", "apple", FilterJoin::And)]], &[]);
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r2", "r3", "r4"]);
    }

    #[test]
    fn sorting_numbers_with_nulls() {
        let mut state = ViewScopedState {
            sorting: vec![SortingEntry {
                id: "qty".into(),
                desc: false,
            }],
            ..ViewScopedState::default()
        };
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r1", "r2", "r4", "r3"]);

        state.sorting[0].desc = true;
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r3", "r4", "r2", "r1"]);
    }

    #[test]
    fn sorting_text_case_folded() {
        let state = ViewScopedState {
            sorting: vec![SortingEntry {
                id: "name".into(),
                desc: true,
            }],
            ..ViewScopedState::default()
        };
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r4", "r3", "r2", "r1"]);
    }

    #[test]
    fn sort_on_unknown_column_is_ignored() {
        let state = ViewScopedState {
            sorting: vec![SortingEntry {
                id: "ghost".into(),
                desc: true,
            }],
            ..ViewScopedState::default()
        };
        assert_eq!(plan(&state).sort, None);
    }

    #[test]
    fn search_skips_hidden_columns() {
        let mut state = ViewScopedState {
            search_query: "  12 ".into(),
            ..ViewScopedState::default()
        };
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r2"]);

        state.hidden_field_ids = vec!["qty".into()];
        assert!(plan(&state).execute(&rows()).rows.is_empty());
    }

    #[test]
    fn paging_is_bounded() {
        let config = QueryConfig {
            default_page_size: 2,
            max_page_size: 3,
        };
        let state = ViewScopedState::default();
        let scan = plan_scan("t", &state, &columns(), PageRequest::default(), &config);
        assert_eq!(scan.limit, 2);

        let scan = plan_scan(
            "t",
            &state,
            &columns(),
            PageRequest {
                offset: 1,
                limit: Some(10_000),
            },
            &config,
        );
        assert_eq!(scan.limit, 3);
        let page = scan.execute(&rows());
        assert_eq!(ids(&page), vec!["r2", "r3", "r4"]);
        assert_eq!(page.total, 4);

        let page = PageRequest {
            offset: 0,
            limit: Some(0),
        };
        let scan = plan_scan("t", &state, &columns(), page, &config);
        assert_eq!(scan.limit, 1);
    }

    #[test]
    fn sql_uses_index_expressions_and_params() {
        let mut state = state_with(
            vec![vec![
                cond("name", "contains", "50%_off", FilterJoin::And),
                cond("qty", "lessThan", "10", FilterJoin::Or),
            ]],
            &[],
        );
        state.sorting = vec![SortingEntry {
            id: "qty".into(),
            desc: true,
        }];
        let layout = RowTableLayout::default();
        let query = plan(&state).to_sql(&layout);

        let select = r#"SELECT "id", "table_id", "cells", "order" FROM "public"."rows""#;
        assert!(query.sql.starts_with(select));
        assert!(query.sql.contains("\"table_id\" = 't'"));
        assert!(query.sql.contains(&format!("({} LIKE $1", cell_text_expr(&layout, "name"))));
        assert!(query.sql.contains(" OR "));
        assert!(query.sql.contains("$2::numeric"));
        let order_by = format!(
            "ORDER BY {} DESC, \"order\" ASC, \"id\" ASC",
            cell_number_expr(&layout, "qty")
        );
        assert!(query.sql.contains(&order_by));
        assert!(query.sql.ends_with("LIMIT 100 OFFSET 0"));
        assert_eq!(query.params, vec!["%50\\%\\_off%".to_owned(), "10".to_owned()]);
    }

    #[test]
    fn sql_groups_fold_left_with_negative_and_empty_operators() {
        let state = state_with(
            vec![
                vec![cond("name", "isEmpty", "", FilterJoin::And)],
                vec![
                    cond("name", "doesNotContain", "x", FilterJoin::And),
                    cond("name", "isNot", "Kiwi", FilterJoin::Or),
                ],
                vec![cond("qty", "isNotEmpty", "", FilterJoin::And)],
            ],
            &[FilterJoin::And, FilterJoin::Or, FilterJoin::And],
        );
        let layout = RowTableLayout::default();
        let query = plan(&state).to_sql(&layout);

        let name_raw = cell_text_raw(&layout, "name");
        let name_text = cell_text_expr(&layout, "name");
        let is_empty = format!("(COALESCE(btrim({name_raw}), '') = '')");
        let not_contains = format!("(COALESCE({name_text}, '') NOT LIKE $1)");
        let is_not = format!("(COALESCE({name_text}, '') <> $2)");
        let qty_not_empty = format!(
            "(COALESCE(btrim({}), '') <> '')",
            cell_text_raw(&layout, "qty")
        );
        let expected = format!(
            "WHERE \"table_id\" = 't' AND \
             (({is_empty} OR ({not_contains} OR {is_not})) AND {qty_not_empty}) ORDER BY"
        );
        assert!(query.sql.contains(&expected), "{}", query.sql);
        assert_eq!(query.params, vec!["%x%".to_owned(), "kiwi".to_owned()]);

        // same predicate in memory: r4 has no name, r1..r3 are neither "x" nor "kiwi"
        assert_eq!(ids(&plan(&state).execute(&rows())), vec!["r1", "r2", "r3", "r4"]);
    }

    #[test]
    fn count_sql_shares_predicate() {
        let state = ViewScopedState {
            search_query: "app".into(),
            ..ViewScopedState::default()
        };
        let layout = RowTableLayout::default();
        let scan = plan(&state);
        let count = scan.to_count_sql(&layout);
        assert!(count.sql.starts_with("SELECT count(*) FROM \"public\".\"rows\" WHERE"));
        assert!(count.sql.contains(" OR "));
        assert_eq!(count.params, vec!["%app%".to_owned()]);
        assert_eq!(count.params, scan.to_sql(&layout).params);
    }
}
