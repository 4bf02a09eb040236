//! Process-wide entity store.
//!
//! One `Arc<EntityStore>` is created at startup and handed to every
//! subscription. Mutation is merge-only; nothing is ever deleted.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::entity::{Entity, EntityId};

const DEFAULT_CHANGE_CAPACITY: usize = 1_024;

/// Shared identifier → entity map with model-granular merge.
pub struct EntityStore {
    entities: RwLock<HashMap<EntityId, Entity>>,
    changes: broadcast::Sender<EntityId>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::with_change_capacity(DEFAULT_CHANGE_CAPACITY)
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose change feed buffers up to `capacity` identifiers per receiver.
    pub fn with_change_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            entities: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Create a store sized by `config.change_capacity`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_change_capacity(config.change_capacity)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EntityId, Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EntityId, Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert `delta`: models it carries replace the stored ones, all others are kept.
    pub fn merge(&self, delta: &Entity) {
        self.write()
            .entry(delta.entity_id.clone())
            .or_insert_with(|| Entity::new(delta.entity_id.clone()))
            .merge_from(delta);
        // no receivers is fine
        let _ = self.changes.send(delta.entity_id.clone());
    }

    /// Merge every record of a batch, in order.
    pub fn merge_batch(&self, batch: &[Entity]) {
        {
            let mut entities = self.write();
            for delta in batch {
                entities
                    .entry(delta.entity_id.clone())
                    .or_insert_with(|| Entity::new(delta.entity_id.clone()))
                    .merge_from(delta);
            }
        }
        for delta in batch {
            let _ = self.changes.send(delta.entity_id.clone());
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.read().contains_key(id)
    }

    /// Every entity carrying a record of `model` in `namespace`, ordered by identifier.
    pub fn entities_by_model(&self, namespace: &str, model: &str) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .read()
            .values()
            .filter(|e| e.model(namespace, model).is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        found
    }

    /// All entities, ordered by identifier.
    pub fn snapshot(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        all
    }

    /// Feed of identifiers touched by each merge.
    pub fn watch_changes(&self) -> broadcast::Receiver<EntityId> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.len())
            .finish()
    }
}
