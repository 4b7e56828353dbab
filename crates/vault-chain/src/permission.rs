//! Owner-signed permission grants.
//!
//! The message is the keccak-256 of the Solidity packed encoding of
//! `(address owner, address grantee, uint256 recordId, uint256 expiryTime,
//! string permissionType, uint256 nonce, address permissionManager)`, and the
//! owner signs it as a 32-byte personal message. The PermissionManager
//! contract recomputes the same digest and recovers the signer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vault_core::{Address, Hash, PermissionType, Signature, keccak256, to_hex_prefixed};

use crate::contract::{ContractName, ContractRegistry};
use crate::error::{ChainError, Result};
use crate::wallet::{WalletProvider, recover_personal_signer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub owner: Address,
    pub grantee: Address,
    pub record_id: u64,
    /// Unix seconds.
    pub expiry_time: u64,
    pub permission_type: PermissionType,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPermission {
    pub grant: PermissionGrant,
    pub permission_manager: Address,
    #[serde(with = "hash_hex")]
    pub message_hash: Hash,
    pub signature: Signature,
}

fn push_uint256(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&[0u8; 24]);
    out.extend_from_slice(&value.to_be_bytes());
}

/// Solidity `abi.encodePacked` of the grant tuple.
pub fn encode_packed(grant: &PermissionGrant, permission_manager: &Address) -> Vec<u8> {
    let label = grant.permission_type.label();
    let mut out = Vec::with_capacity(20 * 3 + 32 * 3 + label.len());
    out.extend_from_slice(grant.owner.as_bytes());
    out.extend_from_slice(grant.grantee.as_bytes());
    push_uint256(&mut out, grant.record_id);
    push_uint256(&mut out, grant.expiry_time);
    out.extend_from_slice(label.as_bytes());
    push_uint256(&mut out, grant.nonce);
    out.extend_from_slice(permission_manager.as_bytes());
    out
}

pub fn permission_message_hash(grant: &PermissionGrant, permission_manager: &Address) -> Hash {
    keccak256(&encode_packed(grant, permission_manager))
}

/// Signs grants against the configured PermissionManager.
#[derive(Clone)]
pub struct PermissionSigner {
    wallet: Arc<dyn WalletProvider>,
    permission_manager: Address,
}

impl PermissionSigner {
    pub fn new(wallet: Arc<dyn WalletProvider>, permission_manager: Address) -> Self {
        Self {
            wallet,
            permission_manager,
        }
    }

    pub fn from_registry(
        wallet: Arc<dyn WalletProvider>,
        registry: &ContractRegistry,
    ) -> Result<Self> {
        let permission_manager = registry.parsed_address(ContractName::PermissionManager)?;
        Ok(Self::new(wallet, permission_manager))
    }

    pub fn permission_manager(&self) -> Address {
        self.permission_manager
    }

    pub async fn sign(&self, grant: &PermissionGrant) -> Result<SignedPermission> {
        let signer = self.wallet.signer().await?;
        if signer.address() != grant.owner {
            return Err(ChainError::OwnerMismatch {
                owner: grant.owner,
                signer: signer.address(),
            });
        }

        let message_hash = permission_message_hash(grant, &self.permission_manager);
        debug!(
            owner = %grant.owner,
            record_id = grant.record_id,
            nonce = grant.nonce,
            hash = %to_hex_prefixed(&message_hash),
            "requesting permission signature"
        );
        let signature = signer.sign_message(&message_hash).await?;

        Ok(SignedPermission {
            grant: grant.clone(),
            permission_manager: self.permission_manager,
            message_hash,
            signature,
        })
    }
}

pub async fn create_permission_signature(
    wallet: Arc<dyn WalletProvider>,
    registry: &ContractRegistry,
    grant: &PermissionGrant,
) -> Result<SignedPermission> {
    PermissionSigner::from_registry(wallet, registry)?
        .sign(grant)
        .await
}

/// Recomputes the digest from the grant and checks the owner signed it.
pub fn verify_permission_signature(signed: &SignedPermission) -> Result<()> {
    let message_hash = permission_message_hash(&signed.grant, &signed.permission_manager);
    let recovered = recover_personal_signer(&message_hash, &signed.signature)?;
    if recovered != signed.grant.owner {
        return Err(ChainError::SignerMismatch {
            expected: signed.grant.owner,
            recovered,
        });
    }
    Ok(())
}

mod hash_hex {
    use serde::{Deserialize, Deserializer, Serializer};
    use vault_core::{Hash, to_hex_prefixed};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex_prefixed(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut hash = [0u8; 32];
        hex::decode_to_slice(raw.strip_prefix("0x").unwrap_or(&raw), &mut hash)
            .map_err(serde::de::Error::custom)?;
        Ok(hash)
    }
}
