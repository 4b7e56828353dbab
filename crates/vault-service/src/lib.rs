use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;
use vault_chain::PermissionSigner;
use vault_core::{
    Address, ContentStore, EventEnvelope, EventStore, NonceTracker, PermissionStore, RecordStore,
    VaultEvent, VaultEventKind,
};
use vault_economy::Treasury;

mod economy;
mod permissions;
mod records;

#[async_trait]
pub trait ServiceLoop {
    async fn tick(&self, now: DateTime<Utc>) -> Result<()>;
}

/// Records, permissions and payment agreements for one vault deployment.
pub struct VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    pub store: TStore,
    pub content: TContent,
    pub events: TEvents,
    pub signer: PermissionSigner,
    treasury: RwLock<Treasury>,
}

impl<TStore, TContent, TEvents> VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    pub fn new(store: TStore, content: TContent, events: TEvents, signer: PermissionSigner) -> Self {
        Self {
            store,
            content,
            events,
            signer,
            treasury: RwLock::new(Treasury::new()),
        }
    }

    /// Events recorded for `actor`, oldest first.
    pub async fn activity(&self, actor: Address) -> Result<Vec<EventEnvelope>> {
        self.events.stream(actor).await
    }

    // The state change has already happened, so a failed append is logged
    // rather than surfaced.
    async fn record_event(
        &self,
        actor: Address,
        kind: VaultEventKind,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) {
        let event = VaultEvent::new(actor, kind, occurred_at, payload);
        if let Err(err) = self.events.append(event).await {
            warn!(%actor, ?kind, error = %err, "failed to append vault event");
        }
    }
}

#[async_trait]
impl<TStore, TContent, TEvents> ServiceLoop for VaultService<TStore, TContent, TEvents>
where
    TStore: RecordStore + PermissionStore + NonceTracker,
    TContent: ContentStore,
    TEvents: EventStore,
{
    async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        self.accrue(now).await?;
        Ok(())
    }
}
