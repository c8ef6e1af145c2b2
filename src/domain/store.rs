//! Entity Storage Seam
//!
//! The `EntityStore` trait is where the exactly-once guarantee lives: the
//! conditional update in `finalize_if_active` must be atomic at the storage
//! layer, and "zero rows affected" is a no-op rather than an error. The
//! scheduler and managers never hold a lock across their awaits; this
//! check-and-set is what prevents a double-finalize race.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{EntityKind, EntityStatus, ExpirableEntity};
use crate::error::{CoreError, Result};

// == Entity Store ==
/// Storage operations the domain managers rely on.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Active entities of `kind` in `guild_id` due at or before `now`.
    async fn list_expiring(
        &self,
        kind: EntityKind,
        guild_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpirableEntity>>;

    /// Conditionally transitions an entity to `to`, guarded by
    /// `status == Active`. Returns `true` when a row changed, `false` when
    /// the entity was missing or already finalized.
    async fn finalize_if_active(
        &self,
        kind: EntityKind,
        id: &str,
        to: EntityStatus,
    ) -> Result<bool>;

    /// Number of active entities of `kind` in the guild.
    async fn active_count(&self, kind: EntityKind, guild_id: &str) -> Result<u64>;

    /// Inserts a new entity. Used by the command layer and by tests.
    async fn insert(&self, entity: ExpirableEntity) -> Result<()>;

    /// Looks up a single entity.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<ExpirableEntity>>;
}

// == Memory Store ==
/// In-memory reference implementation. The write lock around the
/// check-and-set in [`finalize_if_active`](EntityStore::finalize_if_active)
/// plays the role a conditional `UPDATE ... WHERE status = 'active'` plays
/// against a real database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<(EntityKind, String), ExpirableEntity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list_expiring(
        &self,
        kind: EntityKind,
        guild_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpirableEntity>> {
        let entities = self.entities.read().await;
        let mut due: Vec<ExpirableEntity> = entities
            .values()
            .filter(|e| e.kind == kind && e.guild_id == guild_id && e.is_due(now))
            .cloned()
            .collect();
        // Oldest deadline first, so retries keep a stable order.
        due.sort_by_key(|e| e.ends_at);
        Ok(due)
    }

    async fn finalize_if_active(
        &self,
        kind: EntityKind,
        id: &str,
        to: EntityStatus,
    ) -> Result<bool> {
        if to == EntityStatus::Active {
            return Err(CoreError::Storage(
                "cannot finalize an entity back to active".to_string(),
            ));
        }

        let mut entities = self.entities.write().await;
        match entities.get_mut(&(kind, id.to_string())) {
            Some(entity) if entity.status == EntityStatus::Active => {
                entity.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn active_count(&self, kind: EntityKind, guild_id: &str) -> Result<u64> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| {
                e.kind == kind && e.guild_id == guild_id && e.status == EntityStatus::Active
            })
            .count() as u64)
    }

    async fn insert(&self, entity: ExpirableEntity) -> Result<()> {
        let mut entities = self.entities.write().await;
        entities.insert((entity.kind, entity.id.clone()), entity);
        Ok(())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<ExpirableEntity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&(kind, id.to_string())).cloned())
    }
}
