use crate::filter::{
    normalize_filter_groups, normalize_sorting_state, FilterConditionGroup, SortingEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved keys inside a view's `filters` blob. Any other key is carried
/// along untouched.
pub const VIEW_KIND_KEY: &str = "__viewKind";
pub const VIEW_SEARCH_QUERY_KEY: &str = "__viewSearchQuery";
pub const VIEW_SORTING_KEY: &str = "__viewSorting";
pub const VIEW_FILTER_GROUPS_KEY: &str = "__viewFilterGroups";
pub const VIEW_HIDDEN_FIELDS_KEY: &str = "__viewHiddenFields";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Grid,
    Form,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Form => "form",
        }
    }
}

/// Search, sort, filter and column visibility of one view, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewScopedState {
    pub search_query: String,
    pub sorting: Vec<SortingEntry>,
    pub filter_groups: Vec<FilterConditionGroup>,
    pub hidden_field_ids: Vec<String>,
}

/// A saved view over one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub order: i64,
    /// Opaque configuration bag; see the `VIEW_*_KEY` constants.
    pub filters: Value,
}

impl View {
    pub fn kind(&self) -> ViewKind {
        resolve_view_kind(&self.name, &self.filters)
    }

    pub fn scoped_state(&self) -> ViewScopedState {
        parse_view_scoped_state_from_filters(&self.filters)
    }

    /// Store `state` in canonical form; see [`canonical_view_scoped_state`].
    pub fn set_scoped_state(&mut self, state: &ViewScopedState) {
        let canonical = canonical_view_scoped_state(state);
        self.filters = write_view_scoped_state_to_filters(&self.filters, &canonical);
    }
}

/// Read the typed state out of a filters blob.
///
/// Each field degrades on its own: a broken sort leaves search, filters and
/// hidden columns intact.
pub fn parse_view_scoped_state_from_filters(raw: &Value) -> ViewScopedState {
    let Some(obj) = raw.as_object() else {
        return ViewScopedState::default();
    };
    ViewScopedState {
        search_query: obj
            .get(VIEW_SEARCH_QUERY_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        sorting: obj
            .get(VIEW_SORTING_KEY)
            .map(normalize_sorting_state)
            .unwrap_or_default(),
        filter_groups: obj
            .get(VIEW_FILTER_GROUPS_KEY)
            .map(normalize_filter_groups)
            .unwrap_or_default(),
        hidden_field_ids: obj
            .get(VIEW_HIDDEN_FIELDS_KEY)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Write the state under the reserved keys, keeping every other key of
/// `filters`. A non-object `filters` is replaced by a fresh object.
pub fn write_view_scoped_state_to_filters(filters: &Value, state: &ViewScopedState) -> Value {
    let mut obj = filters.as_object().cloned().unwrap_or_default();
    obj.insert(
        VIEW_SEARCH_QUERY_KEY.to_owned(),
        Value::String(state.search_query.clone()),
    );
    obj.insert(VIEW_SORTING_KEY.to_owned(), to_json(&state.sorting));
    obj.insert(VIEW_FILTER_GROUPS_KEY.to_owned(), to_json(&state.filter_groups));
    obj.insert(
        VIEW_HIDDEN_FIELDS_KEY.to_owned(),
        Value::Array(
            state
                .hidden_field_ids
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    Value::Object(obj)
}

fn to_json<T: Serialize>(value: &T) -> Value {
    // These types only hold strings, bools and enums, which always serialize.
    serde_json::to_value(value).unwrap_or(Value::Array(Vec::new()))
}

/// The form a state takes once persisted and read back: empty groups and
/// unusable conditions dropped, fallback ids filled in, at most one sort.
pub fn canonical_view_scoped_state(state: &ViewScopedState) -> ViewScopedState {
    parse_view_scoped_state_from_filters(&write_view_scoped_state_to_filters(&Value::Null, state))
}

/// Explicit kind tag of a view, or `None` when absent or unrecognized.
pub fn get_view_kind_from_filters(raw: &Value) -> Option<ViewKind> {
    match raw.get(VIEW_KIND_KEY).and_then(Value::as_str) {
        Some("grid") => Some(ViewKind::Grid),
        Some("form") => Some(ViewKind::Form),
        _ => None,
    }
}

/// Kind of a view: explicit tag, then a name starting with "form"
/// (any case), then grid.
pub fn resolve_view_kind(name: &str, filters: &Value) -> ViewKind {
    if let Some(kind) = get_view_kind_from_filters(filters) {
        return kind;
    }
    if name.to_lowercase().starts_with("form") {
        ViewKind::Form
    } else {
        ViewKind::Grid
    }
}

/// Set the kind tag, keeping every other key.
pub fn with_view_kind(filters: &Value, kind: ViewKind) -> Value {
    let mut obj: Map<String, Value> = filters.as_object().cloned().unwrap_or_default();
    obj.insert(VIEW_KIND_KEY.to_owned(), Value::String(kind.as_str().to_owned()));
    Value::Object(obj)
}

/// Compare by canonical serialization. A missing previous state is never
/// equal, so the first write always goes through.
pub fn are_view_scoped_states_equal(a: Option<&ViewScopedState>, b: &ViewScopedState) -> bool {
    let Some(a) = a else {
        return false;
    };
    match (serde_json::to_string(a), serde_json::to_string(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}
