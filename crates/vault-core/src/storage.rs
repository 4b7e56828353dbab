use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::events::VaultEvent;
use crate::models::{DataRecord, DataType, Permission, PermissionType};
use crate::signature::Signature;

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub sequence: i64,
    pub stream: Address,
    pub event: VaultEvent,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub uploader: Address,
    pub cid: String,
    pub data_type: DataType,
    pub file_name: String,
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub record_id: u64,
    pub owner: Address,
    pub grantee: Address,
    pub permission_type: PermissionType,
    pub expiry_time: DateTime<Utc>,
    pub nonce: u64,
    pub signature: Signature,
    pub granted_at: DateTime<Utc>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: VaultEvent) -> anyhow::Result<EventEnvelope>;
    async fn stream(&self, actor: Address) -> anyhow::Result<Vec<EventEnvelope>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_record(&self, record: NewRecord) -> anyhow::Result<DataRecord>;
    async fn record(&self, id: u64) -> anyhow::Result<Option<DataRecord>>;
    async fn records_by_uploader(&self, uploader: Address) -> anyhow::Result<Vec<DataRecord>>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn insert_permission(&self, permission: NewPermission) -> anyhow::Result<Permission>;
    async fn permission(&self, id: u64) -> anyhow::Result<Option<Permission>>;
    async fn mark_revoked(&self, id: u64, at: DateTime<Utc>) -> anyhow::Result<Permission>;
    async fn permissions_by_owner(&self, owner: Address) -> anyhow::Result<Vec<Permission>>;
    async fn permissions_for_record(&self, record_id: u64) -> anyhow::Result<Vec<Permission>>;
}

/// Per-owner replay counters for signed grants.
#[async_trait]
pub trait NonceTracker: Send + Sync {
    /// Returns the owner's current nonce and advances it.
    async fn next_nonce(&self, owner: Address) -> anyhow::Result<u64>;
    async fn current_nonce(&self, owner: Address) -> anyhow::Result<u64>;
}

/// Content-addressed blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, name: &str, data: &[u8]) -> anyhow::Result<String>;
    async fn get(&self, cid: &str) -> anyhow::Result<Vec<u8>>;
    fn gateway_url(&self, cid: &str) -> String;
}
