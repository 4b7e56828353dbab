use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vault_chain::Signature;
use vault_core::{
    Address, DataRecord, DataType, PaymentAgreement, Permission, PermissionStatus, PermissionType,
};
use vault_economy::{EconomyError, wei_to_ether};

pub const DEFAULT_DURATION_DAYS: u32 = 7;
pub const MAX_DURATION_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecordRequest {
    pub owner: Address,
    pub file_name: String,
    #[serde(default)]
    pub data_type: DataType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecordResponse {
    pub record: DataRecord,
    pub gateway_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPermissionRequest {
    pub owner: Address,
    pub grantee: Address,
    pub record_id: u64,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    #[serde(default)]
    pub permission_type: PermissionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPermissionResponse {
    pub permission_id: u64,
    pub expiry_time: DateTime<Utc>,
    pub nonce: u64,
    pub message_hash: String,
    pub signature: Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokePermissionRequest {
    pub owner: Address,
    pub permission_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionView {
    #[serde(flatten)]
    pub permission: Permission,
    pub status: PermissionStatus,
}

impl PermissionView {
    pub fn new(permission: Permission, now: DateTime<Utc>) -> Self {
        let status = permission.status(now);
        Self { permission, status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAgreementRequest {
    pub record_id: u64,
    pub payer: Address,
    pub payee: Address,
    pub total_amount: u128,
    pub payment_per_interval: u128,
    pub interval_secs: u64,
    pub duration_days: u32,
}

/// Agreement with amounts rendered in ether.
#[derive(Debug, Clone, Serialize)]
pub struct AgreementView {
    #[serde(flatten)]
    pub agreement: PaymentAgreement,
    pub total_ether: Decimal,
    pub paid_ether: Decimal,
    pub rate_ether: Decimal,
    pub expired: bool,
}

impl AgreementView {
    pub fn new(agreement: PaymentAgreement, now: DateTime<Utc>) -> Result<Self, EconomyError> {
        Ok(Self {
            total_ether: wei_to_ether(agreement.total_amount)?,
            paid_ether: wei_to_ether(agreement.paid_amount)?,
            rate_ether: wei_to_ether(agreement.payment_per_interval)?,
            expired: agreement.is_expired(now),
            agreement,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub payee: Address,
    pub balance_wei: u128,
    pub balance_ether: Decimal,
}

fn default_duration_days() -> u32 {
    DEFAULT_DURATION_DAYS
}
