//! Entity records as delivered by the indexer.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::filter::field_at;

/// Identifier the endpoint uses for keep-alive records that carry no data.
pub const SENTINEL_ENTITY_ID: &str = "0x0";

// ─── EntityId ─────────────────────────────────────────────────────────────────

/// Opaque entity key (a padded hex felt in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the heartbeat identifier.
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_ENTITY_ID
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Entity ───────────────────────────────────────────────────────────────────

/// Model records of one namespace: model name → record (a JSON object).
pub type NamespaceModels = BTreeMap<String, Value>;

/// One entity: an identifier plus model records grouped by namespace.
///
/// A delta carries only the models that changed; see [`Entity::merge_from`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_id: EntityId,
    #[serde(default)]
    pub models: BTreeMap<String, NamespaceModels>,
}

impl Entity {
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            models: BTreeMap::new(),
        }
    }

    /// Heartbeat record (`entityId == "0x0"`).
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_ENTITY_ID)
    }

    /// Attach (or replace) one model record.
    pub fn with_model(
        mut self,
        namespace: impl Into<String>,
        model: impl Into<String>,
        record: Value,
    ) -> Self {
        self.models
            .entry(namespace.into())
            .or_default()
            .insert(model.into(), record);
        self
    }

    pub fn is_sentinel(&self) -> bool {
        self.entity_id.is_sentinel()
    }

    /// The record of `model` in `namespace`, if present.
    pub fn model(&self, namespace: &str, model: &str) -> Option<&Value> {
        self.models.get(namespace)?.get(model)
    }

    /// A dot-addressed field of a model record.
    pub fn field(&self, namespace: &str, model: &str, path: &str) -> Option<&Value> {
        field_at(self.model(namespace, model)?, path)
    }

    /// Overlay `delta` onto `self` at model granularity.
    ///
    /// Every `(namespace, model)` record present in `delta` replaces the stored
    /// record wholesale; models absent from `delta` are kept untouched.
    pub fn merge_from(&mut self, delta: &Entity) {
        for (namespace, models) in &delta.models {
            let target = self.models.entry(namespace.clone()).or_default();
            for (model, record) in models {
                target.insert(model.clone(), record.clone());
            }
        }
    }

    /// Project this entity onto one namespace.
    pub fn view(&self, namespace: &str) -> EntityView {
        EntityView {
            entity_id: self.entity_id.clone(),
            models: self.models.get(namespace).cloned().unwrap_or_default(),
        }
    }
}

// ─── EntityView ───────────────────────────────────────────────────────────────

/// `{ entityId, ...models }` for a single namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub models: NamespaceModels,
}

impl EntityView {
    pub fn model(&self, model: &str) -> Option<&Value> {
        self.models.get(model)
    }

    pub fn field(&self, model: &str, path: &str) -> Option<&Value> {
        field_at(self.models.get(model)?, path)
    }

    /// Decode a model record into a typed struct.
    ///
    /// `Ok(None)` when the model is not present on this entity.
    pub fn model_as<T: DeserializeOwned>(&self, model: &str) -> Result<Option<T>, SyncError> {
        self.models
            .get(model)
            .map(|record| serde_json::from_value(record.clone()).map_err(SyncError::from))
            .transpose()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
