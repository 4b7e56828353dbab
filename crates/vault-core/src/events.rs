use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VaultEventKind {
    RecordUploaded,
    PermissionGranted,
    PermissionRevoked,
    AgreementOpened,
    PaymentAccrued,
    BalanceWithdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEvent {
    pub id: Uuid,
    pub actor: Address,
    pub kind: VaultEventKind,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl VaultEvent {
    pub fn new(
        actor: Address,
        kind: VaultEventKind,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            kind,
            occurred_at,
            payload,
        }
    }
}
