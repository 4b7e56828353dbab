pub mod address;
pub mod error;
pub mod events;
pub mod hash;
pub mod models;
pub mod signature;
pub mod storage;

pub use address::Address;
pub use error::VaultError;
pub use events::{VaultEvent, VaultEventKind};
pub use hash::{Hash, keccak256, to_hex_prefixed};
pub use models::{
    DataRecord, DataType, EXPIRING_SOON_WINDOW_SECS, PaymentAgreement, Permission,
    PermissionStatus, PermissionType, unix_seconds,
};
pub use signature::Signature;
pub use storage::{
    ContentStore, EventEnvelope, EventStore, NewPermission, NewRecord, NonceTracker,
    PermissionStore, RecordStore,
};
