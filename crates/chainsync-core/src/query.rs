//! Namespaced entity queries and the builder that produces them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::filter::{Filter, Scalar};

// ─── Query ────────────────────────────────────────────────────────────────────

/// A structured query: one namespace, one or more model clauses.
///
/// A model clause without a filter matches every entity carrying that model.
/// Equal inputs always build equal (and equally hashed) queries, so callers
/// can key caches on the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    namespace: String,
    models: BTreeMap<String, Option<Filter>>,
}

impl Query {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Model clauses in model-name order.
    pub fn models(&self) -> impl Iterator<Item = (&str, Option<&Filter>)> {
        self.models.iter().map(|(m, f)| (m.as_str(), f.as_ref()))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Filter for `model`; `None` if the model is unfiltered or not part of the query.
    pub fn filter_for(&self, model: &str) -> Option<&Filter> {
        self.models.get(model)?.as_ref()
    }

    pub fn contains_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Namespaced model key as used by sort targets: `"<namespace>-<model>"`.
    pub fn model_key(&self, model: &str) -> String {
        model_key(&self.namespace, model)
    }

    /// Returns `true` if any model clause matches a record carried by `entity`.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.models.iter().any(|(model, filter)| {
            match entity.model(&self.namespace, model) {
                None => false,
                Some(record) => filter.as_ref().map_or(true, |f| f.matches(record)),
            }
        })
    }
}

/// `"<namespace>-<model>"`.
pub fn model_key(namespace: &str, model: &str) -> String {
    format!("{namespace}-{model}")
}

/// Build a query from `(model, predicates)` clauses.
///
/// Predicates of one model are combined with AND; an empty list leaves the
/// model unfiltered. A model named twice keeps its last clause.
pub fn build<I, M>(namespace: impl Into<String>, clauses: I) -> Query
where
    I: IntoIterator<Item = (M, Vec<Filter>)>,
    M: Into<String>,
{
    Query {
        namespace: namespace.into(),
        models: clauses
            .into_iter()
            .map(|(model, predicates)| (model.into(), Filter::all_of(predicates)))
            .collect(),
    }
}

// ─── Fluent builder ──────────────────────────────────────────────────────────

/// Fluent construction of a [`Query`].
///
/// ```
/// use chainsync_core::query::QueryBuilder;
///
/// let query = QueryBuilder::new("budokan")
///     .entity("PlatformMetrics", |e| e.eq("key", "0x1"))
///     .build();
/// assert!(query.contains_model("PlatformMetrics"));
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    namespace: String,
    clauses: Vec<(String, Vec<Filter>)>,
}

impl QueryBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            clauses: Vec::new(),
        }
    }

    /// Add a model clause configured by `f`.
    pub fn entity(
        mut self,
        model: impl Into<String>,
        f: impl FnOnce(EntityClause) -> EntityClause,
    ) -> Self {
        let clause = f(EntityClause::default());
        self.clauses.push((model.into(), clause.predicates));
        self
    }

    /// Add an unfiltered model clause.
    pub fn model(self, model: impl Into<String>) -> Self {
        self.entity(model, |e| e)
    }

    pub fn build(self) -> Query {
        build(self.namespace, self.clauses)
    }
}

/// Predicates for one model, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct EntityClause {
    predicates: Vec<Filter>,
}

impl EntityClause {
    pub fn eq(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::eq(path, value))
    }

    pub fn neq(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::neq(path, value))
    }

    pub fn gt(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::gt(path, value))
    }

    pub fn gte(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::gte(path, value))
    }

    pub fn lt(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::lt(path, value))
    }

    pub fn lte(self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.and(Filter::lte(path, value))
    }

    pub fn is_in<I, V>(self, path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        self.and(Filter::is_in(path, values))
    }

    pub fn not_in<I, V>(self, path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        self.and(Filter::not_in(path, values))
    }

    /// Add an arbitrary filter tree.
    pub fn and(mut self, filter: Filter) -> Self {
        self.predicates.push(filter);
        self
    }
}

// ─── Fetch options ───────────────────────────────────────────────────────────

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort target: a member of a namespaced model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    /// `"<namespace>-<model>"`.
    pub model: String,
    /// Dot-addressed field path.
    pub member: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(namespace: &str, model: &str, member: impl Into<String>) -> Self {
        Self {
            model: model_key(namespace, model),
            member: member.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(namespace: &str, model: &str, member: impl Into<String>) -> Self {
        Self {
            model: model_key(namespace, model),
            member: member.into(),
            direction: Direction::Desc,
        }
    }

    /// Split the namespaced model key back into `(namespace, model)`.
    ///
    /// Namespaces may contain `-`; the model name never does.
    pub fn target(&self) -> Option<(&str, &str)> {
        self.model.rsplit_once('-')
    }
}

/// Pagination and ordering for one-shot queries.
///
/// Live subscriptions take no options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchOptions {
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    const NS: &str = "budokan";

    fn hash_of(q: &Query) -> u64 {
        let mut h = DefaultHasher::new();
        q.hash(&mut h);
        h.finish()
    }

    #[test]
    fn fluent_and_literal_agree() {
        let fluent = QueryBuilder::new(NS)
            .entity("Tournament", |e| e.eq("id", "0x1"))
            .entity("Prize", |e| e.eq("tournament_id", "0x1"))
            .build();
        let literal = build(
            NS,
            [
                ("Tournament", vec![Filter::eq("id", "0x1")]),
                ("Prize", vec![Filter::eq("tournament_id", "0x1")]),
            ],
        );
        assert_eq!(fluent, literal);
        assert_eq!(hash_of(&fluent), hash_of(&literal));
    }

    #[test]
    fn pure_for_identical_inputs() {
        let make = || {
            QueryBuilder::new(NS)
                .entity("Tournament", |e| {
                    e.lte("schedule.game.start", "0x5").gt("schedule.game.end", "0x5")
                })
                .build()
        };
        assert_eq!(make(), make());
        assert_eq!(hash_of(&make()), hash_of(&make()));
    }

    #[test]
    fn empty_predicates_match_all() {
        let q = QueryBuilder::new(NS).model("Token").build();
        assert!(q.contains_model("Token"));
        assert!(q.filter_for("Token").is_none());

        let token = Entity::new("0x1").with_model(NS, "Token", json!({"symbol": "LORDS"}));
        assert!(q.matches(&token));
    }

    #[test]
    fn multiple_predicates_are_anded() {
        let q = QueryBuilder::new(NS)
            .entity("Tournament", |e| e.gt("a", 1).lte("b", 2))
            .build();
        assert!(matches!(q.filter_for("Tournament"), Some(Filter::And(v)) if v.len() == 2));
    }

    #[test]
    fn matches_requires_model_in_namespace() {
        let q = QueryBuilder::new(NS)
            .entity("Prize", |e| e.eq("tournament_id", "0x1"))
            .build();
        let wrong_ns = Entity::new("0x1").with_model("other", "Prize", json!({"tournament_id": "0x1"}));
        let right = Entity::new("0x1").with_model(NS, "Prize", json!({"tournament_id": "0x01"}));
        assert!(!q.matches(&wrong_ns));
        assert!(q.matches(&right));
    }

    #[test]
    fn order_by_uses_namespaced_key() {
        let o = OrderBy::asc("budokan-v1", "Tournament", "schedule.game.start");
        assert_eq!(o.model, "budokan-v1-Tournament");
        assert_eq!(o.target(), Some(("budokan-v1", "Tournament")));

        let opts = FetchOptions::new().order_by(o).limit(10).offset(0);
        assert_eq!(opts.limit, Some(10));
        assert_eq!(opts.offset, Some(0));
    }
}
