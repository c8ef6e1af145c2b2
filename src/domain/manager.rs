//! Store-Backed Domain Manager
//!
//! Reference `DomainManager` implementation over any [`EntityStore`]. The
//! scheduler drives `finalize` for expired entities; the router delegates
//! `cancel` and `status` interactions here. Kind-specific business rules
//! (winner selection and the like) belong to concrete managers layered on
//! top and are out of scope for the core.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::{
    DomainManager, EntityKind, EntityStatus, EntityStore, ExpirableEntity, FinalState,
};
use crate::error::{CoreError, Result};
use crate::events::{EventBus, RealtimeEvent};
use crate::router::{Action, Interaction};
use crate::scheduler::{candidate_key, CandidateCache};

// == Store-Backed Manager ==
/// A domain manager for one entity kind, backed by shared storage.
pub struct StoreBackedManager {
    kind: EntityKind,
    store: Arc<dyn EntityStore>,
    bus: EventBus,
    candidates: Option<CandidateCache>,
}

impl StoreBackedManager {
    pub fn new(kind: EntityKind, store: Arc<dyn EntityStore>, bus: EventBus) -> Self {
        Self {
            kind,
            store,
            bus,
            candidates: None,
        }
    }

    /// Shares the scheduler's candidate cache with this manager, so an
    /// interactive cancel drops the guild's cached scan view instead of
    /// leaving the stale list to burn batch budget until its TTL.
    pub fn with_candidate_cache(mut self, cache: CandidateCache) -> Self {
        self.candidates = Some(cache);
        self
    }

    async fn lookup(&self, id: &str) -> Result<ExpirableEntity> {
        self.store.get(self.kind, id).await?.ok_or_else(|| {
            CoreError::Interaction(format!("no such {}: {}", self.kind, id))
        })
    }

    /// Cancels an entity on behalf of a user interaction. Publishes a
    /// `"{kind}:cancelled"` event only when this call performed the
    /// transition.
    async fn cancel(&self, id: &str, interaction: &mut dyn Interaction) -> Result<()> {
        let entity = self.lookup(id).await?;
        let changed = self
            .store
            .finalize_if_active(self.kind, id, EntityStatus::Cancelled)
            .await?;

        if changed {
            if let Some(cache) = &self.candidates {
                cache
                    .invalidate(&candidate_key(&entity.guild_id, self.kind))
                    .await;
            }
            self.bus.publish(RealtimeEvent::now(
                format!("{}:cancelled", self.kind),
                entity.guild_id,
                json!({ "id": id }),
            ));
            interaction
                .reply_ephemeral(&format!("The {} has been cancelled.", self.kind))
                .await?;
        } else {
            interaction
                .reply_ephemeral(&format!("That {} is already closed.", self.kind))
                .await?;
        }
        Ok(())
    }

    async fn status(&self, id: &str, interaction: &mut dyn Interaction) -> Result<()> {
        let entity = self.lookup(id).await?;
        let text = match entity.status {
            EntityStatus::Active => format!(
                "This {} is active and ends at {}.",
                self.kind,
                entity.ends_at.to_rfc3339()
            ),
            EntityStatus::Ended => format!("This {} has ended.", self.kind),
            EntityStatus::Cancelled => format!("This {} was cancelled.", self.kind),
        };
        interaction.reply_ephemeral(&text).await
    }
}

#[async_trait]
impl DomainManager for StoreBackedManager {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn expiring(&self, guild_id: &str, now: DateTime<Utc>) -> Result<Vec<ExpirableEntity>> {
        self.store.list_expiring(self.kind, guild_id, now).await
    }

    async fn finalize(&self, id: &str) -> Result<FinalState> {
        let changed = self
            .store
            .finalize_if_active(self.kind, id, EntityStatus::Ended)
            .await?;
        if changed {
            Ok(FinalState::Ended)
        } else {
            // Already finalized by an earlier cycle or an interactive
            // cancel; zero rows affected is a no-op, not an error.
            Ok(FinalState::AlreadyFinal)
        }
    }

    async fn active_count(&self, guild_id: &str) -> Result<u64> {
        self.store.active_count(self.kind, guild_id).await
    }

    async fn handle_interaction(
        &self,
        action: &Action,
        interaction: &mut dyn Interaction,
    ) -> Result<()> {
        let id = action
            .args
            .first()
            .ok_or_else(|| CoreError::Interaction("missing entity id".to_string()))?
            .clone();

        match action.verb.as_str() {
            "cancel" => self.cancel(&id, interaction).await,
            "status" => self.status(&id, interaction).await,
            other => Err(CoreError::Interaction(format!(
                "unsupported {} action: {}",
                self.kind, other
            ))),
        }
    }
}
