use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use vault_core::{Address, Hash, Signature, keccak256};

use crate::error::{ChainError, Result};

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

fn recovery_id(signature: &Signature) -> Result<RecoveryId> {
    let v = match signature.v() {
        27 | 28 => signature.v() - 27,
        0 | 1 => signature.v(),
        other => {
            return Err(ChainError::InvalidSignature(format!(
                "unexpected recovery byte {other}"
            )));
        }
    };
    RecoveryId::from_byte(v)
        .ok_or_else(|| ChainError::InvalidSignature(format!("unexpected recovery byte {v}")))
}

/// EIP-191 digest of a personal message.
pub fn hash_personal_message(message: &[u8]) -> Hash {
    let mut framed = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    framed.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    framed.extend_from_slice(message.len().to_string().as_bytes());
    framed.extend_from_slice(message);
    keccak256(&framed)
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

/// Recovers the account that signed `message` as a personal message.
pub fn recover_personal_signer(message: &[u8], signature: &Signature) -> Result<Address> {
    let prehash = hash_personal_message(message);
    let ecdsa = EcdsaSignature::from_slice(&signature.as_bytes()[..64])
        .map_err(|err| ChainError::InvalidSignature(err.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(&prehash, &ecdsa, recovery_id(signature)?)
        .map_err(|err| ChainError::InvalidSignature(err.to_string()))?;
    Ok(address_of(&key))
}

/// A connected identity able to sign personal messages.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_message(&self, message: &[u8]) -> Result<Signature>;
}

/// Supplies the currently connected signer, if any.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn signer(&self) -> Result<Arc<dyn Signer>>;
}

/// A signer backed by a secp256k1 key held in process.
pub struct LocalWallet {
    key: SigningKey,
    address: Address,
}

impl LocalWallet {
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key =
            SigningKey::from_slice(secret).map_err(|err| ChainError::InvalidKey(err.to_string()))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let digits = secret.trim().strip_prefix("0x").unwrap_or(secret.trim());
        let bytes = hex::decode(digits).map_err(|err| ChainError::InvalidKey(err.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for LocalWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let prehash = hash_personal_message(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&prehash)
            .map_err(|err| ChainError::Crypto(err.to_string()))?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Ok(Signature::from_bytes(bytes))
    }
}

/// Wallet fixed at startup; `None` means no wallet is connected.
#[derive(Clone, Default)]
pub struct ConfiguredWallet {
    signer: Option<Arc<dyn Signer>>,
}

impl ConfiguredWallet {
    pub fn new(signer: Option<Arc<dyn Signer>>) -> Self {
        Self { signer }
    }

    pub fn disconnected() -> Self {
        Self { signer: None }
    }

    pub fn from_key(secret: Option<&str>) -> Result<Self> {
        let signer = match secret {
            Some(secret) => Some(Arc::new(LocalWallet::from_hex(secret)?) as Arc<dyn Signer>),
            None => None,
        };
        Ok(Self { signer })
    }
}

#[async_trait]
impl WalletProvider for ConfiguredWallet {
    async fn signer(&self) -> Result<Arc<dyn Signer>> {
        self.signer.clone().ok_or(ChainError::NoWallet)
    }
}
