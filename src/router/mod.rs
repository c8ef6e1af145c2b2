//! Interaction Router Module
//!
//! Dispatches incoming UI interactions (button presses and the like) to the
//! owning domain manager by the typed action prefix. The router is a hard
//! error boundary: unknown prefixes and manager failures become exactly one
//! ephemeral notice to the user, and no exception escapes into the gateway
//! loop.

mod action;

pub use action::{Action, ActionDecodeError};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::domain::{DomainManager, EntityKind, ManagerRef};
use crate::error::Result;

/// Notice shown when a custom id cannot be routed.
const UNKNOWN_NOTICE: &str = "This control is unknown or has expired.";
/// Notice shown when a manager fails while handling an interaction.
const FAILURE_NOTICE: &str = "Something went wrong handling that action. Please try again.";

// == Interaction ==
/// The surface the router needs from a UI interaction. The Discord client
/// adapter implementing this lives in the command layer; tests use a fake.
#[async_trait]
pub trait Interaction: Send {
    /// The raw custom id carried by the component.
    fn custom_id(&self) -> &str;

    /// The guild the interaction originated from.
    fn guild_id(&self) -> &str;

    /// Whether an initial response has already been sent.
    fn responded(&self) -> bool;

    /// Sends the initial ephemeral response.
    async fn reply_ephemeral(&mut self, text: &str) -> Result<()>;

    /// Sends an ephemeral follow-up after the initial response.
    async fn followup_ephemeral(&mut self, text: &str) -> Result<()>;
}

// == Interaction Router ==
/// Fixed dispatch table from action prefix to domain manager.
pub struct InteractionRouter {
    table: HashMap<EntityKind, ManagerRef>,
}

impl InteractionRouter {
    /// Builds the dispatch table from the given managers, keyed by their
    /// declared kind.
    pub fn new(managers: impl IntoIterator<Item = ManagerRef>) -> Self {
        let table = managers.into_iter().map(|m| (m.kind(), m)).collect();
        Self { table }
    }

    /// Looks up the manager for a kind, mainly for wiring assertions.
    pub fn manager(&self, kind: EntityKind) -> Option<&ManagerRef> {
        self.table.get(&kind)
    }

    // == Route ==
    /// Routes one interaction. Never returns an error and never panics on
    /// manager failure; every outcome the user can cause is answered with
    /// at most one ephemeral notice.
    pub async fn route(&self, interaction: &mut dyn Interaction) {
        let custom_id = interaction.custom_id().to_string();

        let action = match Action::decode(&custom_id) {
            Ok(action) => action,
            Err(decode_error) => {
                warn!(%custom_id, %decode_error, "unroutable interaction");
                self.notify(interaction, UNKNOWN_NOTICE).await;
                return;
            }
        };

        let Some(manager) = self.table.get(&action.kind) else {
            warn!(%custom_id, kind = %action.kind, "no manager registered for prefix");
            self.notify(interaction, UNKNOWN_NOTICE).await;
            return;
        };

        if let Err(handler_error) = manager.handle_interaction(&action, interaction).await {
            error!(
                %custom_id,
                guild_id = %interaction.guild_id(),
                %handler_error,
                "interaction handler failed"
            );
            self.notify(interaction, FAILURE_NOTICE).await;
        }
    }

    /// Sends a notice as a reply or a follow-up depending on whether the
    /// interaction has already been responded to. A failed send is logged
    /// and swallowed; there is nobody further up to tell.
    async fn notify(&self, interaction: &mut dyn Interaction, text: &str) {
        let result = if interaction.responded() {
            interaction.followup_ephemeral(text).await
        } else {
            interaction.reply_ephemeral(text).await
        };
        if let Err(send_error) = result {
            warn!(%send_error, "failed to deliver interaction notice");
        }
    }
}
