pub mod contract;
pub mod error;
pub mod permission;
pub mod wallet;

pub use contract::{
    Abi, AbiItem, AbiParam, ContractHandle, ContractName, ContractRegistry, load_artifact,
};
pub use error::{ChainError, Result};
pub use permission::{
    PermissionGrant, PermissionSigner, SignedPermission, create_permission_signature,
    encode_packed, permission_message_hash, verify_permission_signature,
};
pub use vault_core::Signature;
pub use wallet::{
    ConfiguredWallet, LocalWallet, Signer, WalletProvider, hash_personal_message,
    recover_personal_signer,
};
