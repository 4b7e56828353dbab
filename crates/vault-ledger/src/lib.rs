use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use vault_core::{
    Address, DataRecord, EventEnvelope, EventStore, NewPermission, NewRecord, NonceTracker,
    Permission, PermissionStore, RecordStore, VaultError, VaultEvent,
};

#[derive(Default)]
struct EventLog {
    streams: HashMap<Address, Vec<EventEnvelope>>,
    last_sequence: i64,
}

/// Append-only audit log. Sequence numbers are global and assigned under the
/// same lock as the append, so each stream is ordered by sequence.
#[derive(Default)]
pub struct InMemoryEventStore {
    log: RwLock<EventLog>,
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: VaultEvent) -> anyhow::Result<EventEnvelope> {
        let mut log = self.log.write().await;
        log.last_sequence += 1;

        let envelope = EventEnvelope {
            sequence: log.last_sequence,
            stream: event.actor,
            event,
            stored_at: Utc::now(),
        };
        log.streams
            .entry(envelope.stream)
            .or_default()
            .push(envelope.clone());

        Ok(envelope)
    }

    async fn stream(&self, actor: Address) -> anyhow::Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log.streams.get(&actor).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct Tables {
    records: BTreeMap<u64, DataRecord>,
    permissions: BTreeMap<u64, Permission>,
    next_record_id: u64,
    next_permission_id: u64,
}

/// Records, permissions and nonces held in process memory.
#[derive(Default)]
pub struct InMemoryLedger {
    tables: RwLock<Tables>,
    nonces: RwLock<HashMap<Address, u64>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryLedger {
    async fn insert_record(&self, record: NewRecord) -> anyhow::Result<DataRecord> {
        let mut tables = self.tables.write().await;
        tables.next_record_id += 1;
        let id = tables.next_record_id;

        let stored = DataRecord {
            id,
            uploader: record.uploader,
            cid: record.cid,
            data_type: record.data_type,
            file_name: record.file_name,
            upload_time: record.upload_time,
        };
        tables.records.insert(id, stored.clone());
        debug!(record_id = id, "record stored");

        Ok(stored)
    }

    async fn record(&self, id: u64) -> anyhow::Result<Option<DataRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.get(&id).cloned())
    }

    async fn records_by_uploader(&self, uploader: Address) -> anyhow::Result<Vec<DataRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .values()
            .filter(|record| record.uploader == uploader)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PermissionStore for InMemoryLedger {
    async fn insert_permission(&self, permission: NewPermission) -> anyhow::Result<Permission> {
        let mut tables = self.tables.write().await;
        if !tables.records.contains_key(&permission.record_id) {
            return Err(VaultError::RecordNotFound(permission.record_id).into());
        }

        tables.next_permission_id += 1;
        let id = tables.next_permission_id;

        let stored = Permission {
            id,
            record_id: permission.record_id,
            owner: permission.owner,
            grantee: permission.grantee,
            permission_type: permission.permission_type,
            expiry_time: permission.expiry_time,
            nonce: permission.nonce,
            signature: permission.signature,
            granted_at: permission.granted_at,
            revoked_at: None,
        };
        tables.permissions.insert(id, stored.clone());
        debug!(permission_id = id, "permission stored");

        Ok(stored)
    }

    async fn permission(&self, id: u64) -> anyhow::Result<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.get(&id).cloned())
    }

    async fn mark_revoked(&self, id: u64, at: DateTime<Utc>) -> anyhow::Result<Permission> {
        let mut tables = self.tables.write().await;
        let permission = tables
            .permissions
            .get_mut(&id)
            .ok_or(VaultError::PermissionNotFound(id))?;

        if permission.revoked_at.is_some() {
            return Err(VaultError::AlreadyRevoked(id).into());
        }
        permission.revoked_at = Some(at);

        Ok(permission.clone())
    }

    async fn permissions_by_owner(&self, owner: Address) -> anyhow::Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .values()
            .filter(|permission| permission.owner == owner)
            .cloned()
            .collect())
    }

    async fn permissions_for_record(&self, record_id: u64) -> anyhow::Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .values()
            .filter(|permission| permission.record_id == record_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NonceTracker for InMemoryLedger {
    async fn next_nonce(&self, owner: Address) -> anyhow::Result<u64> {
        let mut nonces = self.nonces.write().await;
        let slot = nonces.entry(owner).or_insert(0);
        let nonce = *slot;
        *slot = slot
            .checked_add(1)
            .with_context(|| format!("nonce space exhausted for {owner}"))?;
        Ok(nonce)
    }

    async fn current_nonce(&self, owner: Address) -> anyhow::Result<u64> {
        let nonces = self.nonces.read().await;
        Ok(nonces.get(&owner).copied().unwrap_or(0))
    }
}
