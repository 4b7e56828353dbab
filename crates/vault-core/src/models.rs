use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::VaultError;
use crate::signature::Signature;

pub const EXPIRING_SOON_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    MedicalRecord,
    LabResult,
    Prescription,
    PersonalFile,
    Other,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::MedicalRecord => "medical_record",
            DataType::LabResult => "lab_result",
            DataType::Prescription => "prescription",
            DataType::PersonalFile => "personal_file",
            DataType::Other => "other",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medical_record" => Ok(DataType::MedicalRecord),
            "lab_result" => Ok(DataType::LabResult),
            "prescription" => Ok(DataType::Prescription),
            "personal_file" => Ok(DataType::PersonalFile),
            "other" => Ok(DataType::Other),
            _ => Err(VaultError::UnknownDataType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataRecord {
    pub id: u64,
    pub uploader: Address,
    pub cid: String,
    pub data_type: DataType,
    pub file_name: String,
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    #[default]
    Read,
    Write,
    AiAccess,
}

impl PermissionType {
    /// The label that goes into the signed permission message.
    pub fn label(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::AiAccess => "ai_access",
        }
    }

    pub fn grants(&self, requested: PermissionType) -> bool {
        *self == requested || (*self == PermissionType::Write && requested == PermissionType::Read)
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PermissionType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PermissionType::Read),
            "write" => Ok(PermissionType::Write),
            "ai_access" => Ok(PermissionType::AiAccess),
            _ => Err(VaultError::UnknownPermissionType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub id: u64,
    pub record_id: u64,
    pub owner: Address,
    pub grantee: Address,
    pub permission_type: PermissionType,
    pub expiry_time: DateTime<Utc>,
    pub nonce: u64,
    pub signature: Signature,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_time
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.is_expired(now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> PermissionStatus {
        if self.revoked_at.is_some() {
            PermissionStatus::Revoked
        } else if self.is_expired(now) {
            PermissionStatus::Expired
        } else if self.expiry_time - now < Duration::seconds(EXPIRING_SOON_WINDOW_SECS) {
            PermissionStatus::ExpiringSoon
        } else {
            PermissionStatus::Active
        }
    }

    pub fn allows(&self, grantee: Address, requested: PermissionType, now: DateTime<Utc>) -> bool {
        self.grantee == grantee && self.is_active(now) && self.permission_type.grants(requested)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentAgreement {
    pub id: u64,
    pub record_id: u64,
    pub payer: Address,
    pub payee: Address,
    pub total_amount: u128,
    pub paid_amount: u128,
    pub payment_per_interval: u128,
    pub interval_secs: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl PaymentAgreement {
    pub fn remaining(&self) -> u128 {
        self.total_amount.saturating_sub(self.paid_amount)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

/// Seconds since the epoch, clamped at zero.
pub fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn permission(expiry_time: DateTime<Utc>) -> Permission {
        Permission {
            id: 1,
            record_id: 7,
            owner: Address::from_bytes([1u8; 20]),
            grantee: Address::from_bytes([2u8; 20]),
            permission_type: PermissionType::Write,
            expiry_time,
            nonce: 0,
            signature: Signature::from_bytes([0; 65]),
            granted_at: expiry_time - Duration::days(7),
            revoked_at: None,
        }
    }

    #[test]
    fn permission_labels_parse_back() {
        for kind in [PermissionType::Read, PermissionType::Write, PermissionType::AiAccess] {
            assert_eq!(kind.label().parse::<PermissionType>().unwrap(), kind);
        }
        assert!("admin".parse::<PermissionType>().is_err());
    }

    #[test]
    fn data_type_serializes_snake_case() {
        let json = serde_json::to_string(&DataType::LabResult).unwrap();
        assert_eq!(json, "\"lab_result\"");
        assert_eq!("personal_file".parse::<DataType>().unwrap(), DataType::PersonalFile);
    }

    #[test]
    fn status_follows_expiry_window_and_revocation() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(permission(now + Duration::days(3)).status(now), PermissionStatus::Active);
        assert_eq!(
            permission(now + Duration::hours(23)).status(now),
            PermissionStatus::ExpiringSoon
        );
        assert_eq!(permission(now).status(now), PermissionStatus::Expired);

        let mut revoked = permission(now + Duration::days(3));
        revoked.revoked_at = Some(now);
        assert_eq!(revoked.status(now), PermissionStatus::Revoked);
    }

    #[test]
    fn write_implies_read_but_not_ai_access() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let perm = permission(now + Duration::days(1));
        let grantee = perm.grantee;

        assert!(perm.allows(grantee, PermissionType::Read, now));
        assert!(perm.allows(grantee, PermissionType::Write, now));
        assert!(!perm.allows(grantee, PermissionType::AiAccess, now));
        assert!(!perm.allows(perm.owner, PermissionType::Read, now));
        assert!(!perm.allows(grantee, PermissionType::Read, now + Duration::days(2)));
    }

    #[test]
    fn unix_seconds_clamps_pre_epoch() {
        let before = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_seconds(before), 0);
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(unix_seconds(at), 1_700_000_000);
    }
}
