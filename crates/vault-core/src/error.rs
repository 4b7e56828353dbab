use thiserror::Error;

use crate::address::Address;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("address checksum mismatch: {0}")]
    InvalidChecksum(String),

    #[error("unknown permission type: {0}")]
    UnknownPermissionType(String),

    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    #[error("record {0} not found")]
    RecordNotFound(u64),

    #[error("permission {0} not found")]
    PermissionNotFound(u64),

    #[error("{caller} does not own record {record_id}")]
    NotRecordOwner { caller: Address, record_id: u64 },

    #[error("{caller} did not grant permission {permission_id}")]
    NotPermissionOwner { caller: Address, permission_id: u64 },

    #[error("cannot grant a permission to the record owner")]
    SelfGrant,

    #[error("permission duration must be between 1 and 365 days, got {0}")]
    InvalidDuration(u32),

    #[error("permission {0} is already revoked")]
    AlreadyRevoked(u64),

    #[error("permission {0} has already expired")]
    AlreadyExpired(u64),

    #[error("{grantee} holds no active permission on record {record_id}")]
    NoAccess { grantee: Address, record_id: u64 },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("refusing to store an empty payload")]
    EmptyPayload,
}
