use thiserror::Error;
use vault_core::{Address, VaultError};

use crate::contract::ContractName;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("{0} address not configured")]
    AddressNotConfigured(ContractName),

    #[error("{0} ABI not available - please compile contracts first")]
    AbiUnavailable(ContractName),

    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    #[error("{name} address is invalid: {source}")]
    InvalidContractAddress {
        name: ContractName,
        #[source]
        source: VaultError,
    },

    #[error("{contract} has no function named {function}")]
    UnknownFunction {
        contract: ContractName,
        function: String,
    },

    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no wallet is available to sign")]
    NoWallet,

    #[error("signature request rejected by the user")]
    SigningRejected,

    #[error("connected wallet {signer} is not the permission owner {owner}")]
    OwnerMismatch { owner: Address, signer: Address },

    #[error("signature was produced by {recovered}, expected {expected}")]
    SignerMismatch {
        expected: Address,
        recovered: Address,
    },

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signing failed: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
