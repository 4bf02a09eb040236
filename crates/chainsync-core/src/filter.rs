//! Filter AST over dot-addressed model fields.
//!
//! Both construction styles used by callers (the fluent [`crate::query::QueryBuilder`]
//! and literal filter trees) produce the same [`Filter`] values.

use std::cmp::Ordering;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Scalar ───────────────────────────────────────────────────────────────────

/// A filter operand.
///
/// Integers and `0x` hex strings compare numerically with each other; other
/// strings compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for Scalar {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl Scalar {
    fn as_u256(&self) -> Option<U256> {
        match self {
            Self::Int(i) if *i >= 0 => Some(U256::from(*i as u64)),
            Self::Str(s) => hex_u256(s),
            _ => None,
        }
    }

    /// Order a stored field value against this operand.
    ///
    /// Returns `None` when the two are not comparable (type mismatch).
    pub fn compare_field(&self, field: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (value_u256(field), self.as_u256()) {
            return Some(a.cmp(&b));
        }
        match (field, self) {
            (Value::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(n), Self::Int(b)) => n.as_f64().and_then(|a| a.partial_cmp(&(*b as f64))),
            (Value::String(a), Self::Str(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => None,
        }
    }
}

fn hex_u256(s: &str) -> Option<U256> {
    let digits = s.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Numeric view of a stored field: unsigned JSON integers and `0x` strings.
pub(crate) fn value_u256(v: &Value) -> Option<U256> {
    match v {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => hex_u256(s),
        _ => None,
    }
}

/// Total order over field values, used when sorting results by a member.
///
/// Mismatched types order as: missing/null < bool < number < string < other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (value_u256(a), value_u256(b)) {
        return x.cmp(&y);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Follow a dot-addressed path (`"schedule.game.start"`) into a record.
pub fn field_at<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |cur, key| cur.get(key))
}

// ─── Filter ───────────────────────────────────────────────────────────────────

/// Boolean expression tree over a model record's fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Eq { path: String, value: Scalar },
    Neq { path: String, value: Scalar },
    Gt { path: String, value: Scalar },
    Gte { path: String, value: Scalar },
    Lt { path: String, value: Scalar },
    Lte { path: String, value: Scalar },
    In { path: String, values: Vec<Scalar> },
    NotIn { path: String, values: Vec<Scalar> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Eq { path: path.into(), value: value.into() }
    }

    pub fn neq(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Neq { path: path.into(), value: value.into() }
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Gt { path: path.into(), value: value.into() }
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Gte { path: path.into(), value: value.into() }
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Lt { path: path.into(), value: value.into() }
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Lte { path: path.into(), value: value.into() }
    }

    pub fn is_in<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::In {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::NotIn {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    /// Combine top-level predicates with AND.
    ///
    /// An empty list yields `None` (no filter); a single predicate is returned as-is.
    pub fn all_of(mut predicates: Vec<Filter>) -> Option<Filter> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Self::And(predicates)),
        }
    }

    /// Evaluate this filter against a model record.
    ///
    /// A predicate over a missing field is false, `Neq` and `NotIn` included.
    pub fn matches(&self, record: &Value) -> bool {
        let cmp = |path: &str, value: &Scalar| {
            field_at(record, path).and_then(|field| value.compare_field(field))
        };
        match self {
            Self::Eq { path, value } => cmp(path, value) == Some(Ordering::Equal),
            Self::Neq { path, value } => matches!(cmp(path, value), Some(o) if o != Ordering::Equal),
            Self::Gt { path, value } => cmp(path, value) == Some(Ordering::Greater),
            Self::Gte { path, value } => {
                matches!(cmp(path, value), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::Lt { path, value } => cmp(path, value) == Some(Ordering::Less),
            Self::Lte { path, value } => {
                matches!(cmp(path, value), Some(Ordering::Less | Ordering::Equal))
            }
            Self::In { path, values } => field_at(record, path).is_some_and(|field| {
                values
                    .iter()
                    .any(|v| v.compare_field(field) == Some(Ordering::Equal))
            }),
            Self::NotIn { path, values } => field_at(record, path).is_some_and(|field| {
                values
                    .iter()
                    .all(|v| v.compare_field(field) != Some(Ordering::Equal))
            }),
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tournament(start: &str, end: &str) -> Value {
        json!({
            "id": "0x01",
            "name": "Spring Cup",
            "schedule": { "game": { "start": start, "end": end } },
            "entry_count": 12,
            "finalized": false
        })
    }

    #[test]
    fn field_at_walks_nested_paths() {
        let t = tournament("0x10", "0x20");
        assert_eq!(field_at(&t, "schedule.game.start"), Some(&json!("0x10")));
        assert_eq!(field_at(&t, "name"), Some(&json!("Spring Cup")));
        assert!(field_at(&t, "schedule.registration.start").is_none());
    }

    #[test]
    fn hex_strings_compare_numerically() {
        // "0x9" > "0x10" lexicographically, but not numerically
        let t = tournament("0x9", "0x20");
        assert!(Filter::lt("schedule.game.start", "0x10").matches(&t));
        assert!(!Filter::gt("schedule.game.start", "0x10").matches(&t));
        assert!(Filter::eq("schedule.game.start", "0x0009").matches(&t));
    }

    #[test]
    fn window_filter() {
        let live = Filter::and(vec![
            Filter::lte("schedule.game.start", "0x15"),
            Filter::gt("schedule.game.end", "0x15"),
        ]);
        assert!(live.matches(&tournament("0x10", "0x20")));
        assert!(!live.matches(&tournament("0x16", "0x20")));
        assert!(!live.matches(&tournament("0x10", "0x15")));
    }

    #[test]
    fn membership() {
        let t = tournament("0x10", "0x20");
        assert!(Filter::is_in("id", ["0x1", "0x2"]).matches(&t));
        assert!(!Filter::is_in("id", ["0x3"]).matches(&t));
        assert!(Filter::not_in("id", ["0x3"]).matches(&t));
        assert!(!Filter::is_in("missing", ["0x1"]).matches(&t));
    }

    #[test]
    fn plain_values() {
        let t = tournament("0x10", "0x20");
        assert!(Filter::eq("name", "Spring Cup").matches(&t));
        assert!(Filter::neq("name", "Autumn Cup").matches(&t));
        assert!(Filter::gte("entry_count", 12).matches(&t));
        assert!(Filter::eq("finalized", false).matches(&t));
        assert!(!Filter::neq("missing", "x").matches(&t));
    }

    #[test]
    fn or_composition() {
        let t = tournament("0x10", "0x20");
        let f = Filter::or(vec![Filter::eq("name", "nope"), Filter::eq("id", "0x1")]);
        assert!(f.matches(&t));
    }

    #[test]
    fn sort_order() {
        assert_eq!(compare_values(&json!("0x9"), &json!("0x10")), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &json!(1)), Ordering::Less);
    }

    #[test]
    fn all_of_collapses() {
        assert!(Filter::all_of(vec![]).is_none());
        let single = Filter::eq("id", "0x1");
        assert_eq!(Filter::all_of(vec![single.clone()]), Some(single));
        assert!(matches!(
            Filter::all_of(vec![Filter::eq("a", 1), Filter::eq("b", 2)]),
            Some(Filter::And(v)) if v.len() == 2
        ));
    }
}
