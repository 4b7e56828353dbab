pub mod config;
pub mod contracts;
pub mod deployment;

pub use config::{ContractAddresses, VaultConfig, address_variable};
pub use contracts::{
    AgreementView, BalanceResponse, DEFAULT_DURATION_DAYS, GrantPermissionRequest,
    GrantPermissionResponse, MAX_DURATION_DAYS, OpenAgreementRequest, PermissionView,
    RevokePermissionRequest, UploadRecordRequest, UploadRecordResponse,
};
pub use deployment::Deployment;
