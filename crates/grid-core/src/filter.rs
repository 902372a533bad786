//! Validation and canonicalization of view filter trees and sort specs.
//!
//! Input here is untrusted: it comes from persisted view configuration or
//! straight from a client edit. Every function degrades malformed pieces to
//! nothing instead of failing, so a partially corrupted view still opens.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Single-column sort only.
pub const MAX_SORT_ENTRIES: usize = 1;

/// How an element combines with the element before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterJoin {
    #[default]
    And,
    Or,
}

impl FilterJoin {
    /// Anything other than the exact string `"or"` reads as `And`.
    fn from_json(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("or") => Self::Or,
            _ => Self::And,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    #[default]
    Group,
    Single,
}

impl GroupMode {
    fn from_json(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("single") => Self::Single,
            _ => Self::Group,
        }
    }
}

/// One filter condition as stored and edited.
///
/// `join` relates this condition to the previous one in its group. The first
/// condition's join is kept as the user left it and only ignored when a query
/// is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub id: String,
    pub column_id: String,
    pub operator: String,
    pub value: String,
    pub join: FilterJoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConditionGroup {
    pub id: String,
    pub mode: GroupMode,
    pub join: FilterJoin,
    pub conditions: Vec<FilterCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingEntry {
    pub id: String,
    pub desc: bool,
}

/// A condition ready for query building. `value` is present exactly when
/// the operator needs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilterCondition {
    pub column_id: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub join: FilterJoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilterGroup {
    pub join: FilterJoin,
    pub conditions: Vec<QueryFilterCondition>,
}

/// `isEmpty` and `isNotEmpty` take no operand; every other operator does.
pub fn operator_requires_value(operator: &str) -> bool {
    !matches!(operator, "isEmpty" | "isNotEmpty")
}

/// Parse an arbitrary JSON value into filter groups.
///
/// Non-arrays give an empty list. Non-object groups and conditions are
/// skipped, as are conditions without a string `columnId` and `operator`.
/// Missing ids get positional fallbacks (`group-{g}`, `condition-{g}-{c}`,
/// indices taken from the input) so re-normalizing is stable. Groups left
/// with no conditions are dropped.
pub fn normalize_filter_groups(raw: &Value) -> Vec<FilterConditionGroup> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(group_index, item)| normalize_group(group_index, item.as_object()?))
        .collect()
}

fn normalize_group(group_index: usize, obj: &Map<String, Value>) -> Option<FilterConditionGroup> {
    let conditions: Vec<FilterCondition> = obj
        .get("conditions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(condition_index, item)| {
                    normalize_condition(group_index, condition_index, item.as_object()?)
                })
                .collect()
        })
        .unwrap_or_default();

    if conditions.is_empty() {
        return None;
    }

    Some(FilterConditionGroup {
        id: non_blank_str(obj.get("id"))
            .map_or_else(|| format!("group-{group_index}"), str::to_owned),
        mode: GroupMode::from_json(obj.get("mode")),
        join: FilterJoin::from_json(obj.get("join")),
        conditions,
    })
}

fn normalize_condition(
    group_index: usize,
    condition_index: usize,
    obj: &Map<String, Value>,
) -> Option<FilterCondition> {
    let column_id = obj.get("columnId")?.as_str()?;
    let operator = obj.get("operator")?.as_str()?;
    Some(FilterCondition {
        id: non_blank_str(obj.get("id")).map_or_else(
            || format!("condition-{group_index}-{condition_index}"),
            str::to_owned,
        ),
        column_id: column_id.to_owned(),
        operator: operator.to_owned(),
        value: obj
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        join: FilterJoin::from_json(obj.get("join")),
    })
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Reduce stored filter groups to what a query needs.
///
/// Drops conditions with no column and conditions whose operator needs a
/// value but has only whitespace; groups left empty are dropped. The first
/// surviving group and the first surviving condition of every group get
/// `join = And`: they have no predecessor, so a stored `Or` there means
/// nothing. Order is otherwise preserved.
pub fn normalize_filter_groups_for_query(groups: &[FilterConditionGroup]) -> Vec<QueryFilterGroup> {
    groups
        .iter()
        .filter_map(|group| {
            let conditions: Vec<QueryFilterCondition> = group
                .conditions
                .iter()
                .filter_map(query_condition)
                .enumerate()
                .map(|(index, mut condition)| {
                    if index == 0 {
                        condition.join = FilterJoin::And;
                    }
                    condition
                })
                .collect();
            if conditions.is_empty() {
                return None;
            }
            Some(QueryFilterGroup {
                join: group.join,
                conditions,
            })
        })
        .enumerate()
        .map(|(index, mut group)| {
            if index == 0 {
                group.join = FilterJoin::And;
            }
            group
        })
        .collect()
}

fn query_condition(condition: &FilterCondition) -> Option<QueryFilterCondition> {
    if condition.column_id.trim().is_empty() {
        return None;
    }
    let value = if operator_requires_value(&condition.operator) {
        let trimmed = condition.value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_owned())
    } else {
        None
    };
    Some(QueryFilterCondition {
        column_id: condition.column_id.clone(),
        operator: condition.operator.clone(),
        value,
        join: condition.join,
    })
}

/// Parse an arbitrary JSON value into a sort list of at most one entry.
///
/// Entries need an object with a string `id`; `desc` is read by JSON
/// truthiness. Everything past the first valid entry is discarded.
pub fn normalize_sorting_state(raw: &Value) -> Vec<SortingEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let id = obj.get("id")?.as_str()?;
            Some(SortingEntry {
                id: id.to_owned(),
                desc: is_truthy(obj.get("desc")),
            })
        })
        .take(MAX_SORT_ENTRIES)
        .collect()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(
        id: &str,
        column_id: &str,
        operator: &str,
        value: &str,
        join: FilterJoin,
    ) -> FilterCondition {
        FilterCondition {
            id: id.into(),
            column_id: column_id.into(),
            operator: operator.into(),
            value: value.into(),
            join,
        }
    }

    fn group(id: &str, join: FilterJoin, conditions: Vec<FilterCondition>) -> FilterConditionGroup {
        FilterConditionGroup {
            id: id.into(),
            mode: GroupMode::Group,
            join,
            conditions,
        }
    }

    #[test]
    fn normalizing_valid_groups_is_identity() {
        let groups = vec![
            group(
                "g1",
                FilterJoin::Or, // leading join is kept in the stored form
                vec![
                    condition("c1", "col-a", "contains", "foo", FilterJoin::And),
                    condition("c2", "col-b", "isEmpty", "", FilterJoin::Or),
                ],
            ),
            FilterConditionGroup {
                mode: GroupMode::Single,
                ..group(
                    "g2",
                    FilterJoin::Or,
                    vec![condition("c3", "col-c", "greaterThan", "10", FilterJoin::And)],
                )
            },
        ];

        let raw = serde_json::to_value(&groups).unwrap();
        assert_eq!(normalize_filter_groups(&raw), groups);

        let text = serde_json::to_string(&groups).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(normalize_filter_groups(&reparsed), groups);
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(normalize_filter_groups(&Value::Null).is_empty());
        assert!(normalize_filter_groups(&json!("groups")).is_empty());
        assert!(normalize_filter_groups(&json!({"conditions": []})).is_empty());
        assert!(normalize_filter_groups(&json!([{"conditions": "nope"}])).is_empty());
        assert!(normalize_filter_groups(&json!([1, "x", null, []])).is_empty());
        let junk = json!([{"conditions": [1, {"columnId": 5, "operator": "is"}]}]);
        assert!(normalize_filter_groups(&junk).is_empty());
    }

    #[test]
    fn malformed_conditions_are_skipped_not_fatal() {
        let raw = json!([{
            "id": "g",
            "conditions": [
                {"columnId": "a"},
                "junk",
                {"id": "keep", "columnId": "b", "operator": "is", "value": "x"},
            ]
        }]);
        let groups = normalize_filter_groups(&raw);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].conditions.len(), 1);
        assert_eq!(groups[0].conditions[0].id, "keep");
    }

    #[test]
    fn defaults_and_fallback_ids() {
        let raw = json!([
            "skipped",
            {
                "id": "   ",
                "mode": "weird",
                "join": "OR",
                "conditions": [
                    {"columnId": "a", "operator": "contains", "value": 42, "join": "xor"},
                    {"id": "", "columnId": "b", "operator": "isEmpty", "join": "or"},
                ]
            }
        ]);
        let groups = normalize_filter_groups(&raw);
        assert_eq!(groups.len(), 1);

        let g = &groups[0];
        assert_eq!(g.id, "group-1");
        assert_eq!(g.mode, GroupMode::Group);
        assert_eq!(g.join, FilterJoin::And);
        assert_eq!(g.conditions[0].id, "condition-1-0");
        assert_eq!(g.conditions[0].value, "");
        assert_eq!(g.conditions[0].join, FilterJoin::And);
        assert_eq!(g.conditions[1].id, "condition-1-1");
        assert_eq!(g.conditions[1].join, FilterJoin::Or);

        // fallback ids survive a second pass unchanged
        let again = normalize_filter_groups(&serde_json::to_value(&groups).unwrap());
        assert_eq!(again, groups);
    }

    #[test]
    fn query_form_forces_leading_joins() {
        let groups = vec![
            group(
                "g1",
                FilterJoin::Or,
                vec![
                    condition("c1", "a", "contains", "x", FilterJoin::Or),
                    condition("c2", "b", "contains", "y", FilterJoin::Or),
                ],
            ),
            group(
                "g2",
                FilterJoin::Or,
                vec![condition("c3", "c", "is", "z", FilterJoin::Or)],
            ),
        ];
        let query = normalize_filter_groups_for_query(&groups);

        assert_eq!(query[0].join, FilterJoin::And);
        assert_eq!(query[1].join, FilterJoin::Or);
        for g in &query {
            assert_eq!(g.conditions[0].join, FilterJoin::And);
        }
        assert_eq!(query[0].conditions[1].join, FilterJoin::Or);

        // stored copy untouched
        assert_eq!(groups[0].join, FilterJoin::Or);
    }

    #[test]
    fn leading_join_forced_after_drops() {
        let groups = vec![
            group("g0", FilterJoin::And, vec![condition("c0", "a", "is", " ", FilterJoin::And)]),
            group(
                "g1",
                FilterJoin::Or,
                vec![
                    condition("c1", "", "is", "x", FilterJoin::And),
                    condition("c2", "b", "is", "y", FilterJoin::Or),
                ],
            ),
        ];
        let query = normalize_filter_groups_for_query(&groups);
        assert_eq!(query.len(), 1);
        assert_eq!(query[0].join, FilterJoin::And);
        assert_eq!(query[0].conditions.len(), 1);
        assert_eq!(query[0].conditions[0].column_id, "b");
        assert_eq!(query[0].conditions[0].join, FilterJoin::And);
    }

    #[test]
    fn value_requirements() {
        let keep = vec![group(
            "g",
            FilterJoin::And,
            vec![condition("c", "c1", "isEmpty", "", FilterJoin::And)],
        )];
        let query = normalize_filter_groups_for_query(&keep);
        assert_eq!(query.len(), 1);
        assert_eq!(query[0].conditions[0].value, None);

        let dropped = vec![group(
            "g",
            FilterJoin::And,
            vec![condition("c", "c1", "contains", "  ", FilterJoin::And)],
        )];
        assert!(normalize_filter_groups_for_query(&dropped).is_empty());
    }

    #[test]
    fn query_condition_omits_value_when_not_applicable() {
        let groups = vec![group(
            "g",
            FilterJoin::And,
            vec![
                condition("c1", "a", "isNotEmpty", "leftover", FilterJoin::And),
                condition("c2", "b", "contains", "  hi ", FilterJoin::And),
            ],
        )];
        let query = normalize_filter_groups_for_query(&groups);
        let json = serde_json::to_value(&query).unwrap();
        assert!(json[0]["conditions"][0].get("value").is_none());
        assert_eq!(json[0]["conditions"][1]["value"], "hi");
    }

    #[test]
    fn operator_value_predicate() {
        assert!(!operator_requires_value("isEmpty"));
        assert!(!operator_requires_value("isNotEmpty"));
        assert!(operator_requires_value("contains"));
        assert!(operator_requires_value("greaterThan"));
        assert!(operator_requires_value("anything-else"));
    }

    #[test]
    fn sorting_capped_to_one_entry() {
        let sorting = normalize_sorting_state(&json!([
            {"id": "a", "desc": false},
            {"id": "b", "desc": true},
        ]));
        assert_eq!(
            sorting,
            vec![SortingEntry {
                id: "a".into(),
                desc: false
            }]
        );
    }

    #[test]
    fn sorting_skips_invalid_and_coerces_desc() {
        let sorting = normalize_sorting_state(&json!([
            "x",
            {"id": 4},
            {"id": "price", "desc": 1},
        ]));
        assert_eq!(
            sorting,
            vec![SortingEntry {
                id: "price".into(),
                desc: true
            }]
        );

        assert!(normalize_sorting_state(&json!({"id": "a"})).is_empty());
        assert!(!normalize_sorting_state(&json!([{"id": "a"}]))[0].desc);
        assert!(!normalize_sorting_state(&json!([{"id": "a", "desc": ""}]))[0].desc);
        assert!(normalize_sorting_state(&json!([{"id": "a", "desc": "yes"}]))[0].desc);
    }
}
