use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vault_core::{Address, keccak256};

use crate::error::{ChainError, Result};
use crate::wallet::Signer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractName {
    DataVault,
    PermissionManager,
    MicroEconomy,
    AccessControl,
}

impl ContractName {
    pub const ALL: [ContractName; 4] = [
        ContractName::DataVault,
        ContractName::PermissionManager,
        ContractName::MicroEconomy,
        ContractName::AccessControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::DataVault => "DataVault",
            ContractName::PermissionManager => "PermissionManager",
            ContractName::MicroEconomy => "MicroEconomy",
            ContractName::AccessControl => "AccessControl",
        }
    }

    /// Hardhat artifact location relative to the artifacts root.
    pub fn artifact_path(&self, artifacts_dir: &Path) -> PathBuf {
        artifacts_dir
            .join("contracts")
            .join(format!("{}.sol", self.as_str()))
            .join(format!("{}.json", self.as_str()))
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractName {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        ContractName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ChainError::UnknownContract(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl AbiParam {
    /// Canonical type as used in function signatures; tuples are expanded.
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> = self.components.iter().map(Self::canonical_type).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<String>,
}

impl AbiItem {
    pub fn is_function(&self) -> bool {
        self.kind == "function"
    }

    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(AbiParam::canonical_type).collect();
        format!(
            "{}({})",
            self.name.as_deref().unwrap_or_default(),
            inputs.join(",")
        )
    }

    pub fn selector(&self) -> [u8; 4] {
        let digest = keccak256(self.signature().as_bytes());
        [digest[0], digest[1], digest[2], digest[3]]
    }
}

pub type Abi = Vec<AbiItem>;

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(default)]
    abi: Abi,
}

pub fn load_artifact(path: &Path) -> Result<Abi> {
    let raw = std::fs::read_to_string(path)?;
    let artifact: Artifact = serde_json::from_str(&raw)?;
    Ok(artifact.abi)
}

#[derive(Debug, Clone, Default)]
struct ContractEntry {
    address: String,
    abi: Arc<Abi>,
}

/// Statically configured addresses and ABIs for the vault contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    entries: HashMap<ContractName, ContractEntry>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, name: ContractName, address: impl Into<String>) -> Self {
        self.set_address(name, address);
        self
    }

    pub fn with_abi(mut self, name: ContractName, abi: Abi) -> Self {
        self.set_abi(name, abi);
        self
    }

    pub fn set_address(&mut self, name: ContractName, address: impl Into<String>) {
        self.entries.entry(name).or_default().address = address.into();
    }

    pub fn set_abi(&mut self, name: ContractName, abi: Abi) {
        self.entries.entry(name).or_default().abi = Arc::new(abi);
    }

    /// Loads every contract's ABI from a Hardhat artifacts directory. A
    /// missing or malformed artifact leaves that ABI empty.
    pub fn load_artifacts(&mut self, artifacts_dir: &Path) {
        for name in ContractName::ALL {
            let path = name.artifact_path(artifacts_dir);
            match load_artifact(&path) {
                Ok(abi) => {
                    debug!(contract = %name, items = abi.len(), "loaded contract ABI");
                    self.set_abi(name, abi);
                }
                Err(err) => {
                    warn!(
                        contract = %name,
                        path = %path.display(),
                        "{name} ABI not found - contracts may not be compiled: {err}"
                    );
                    self.set_abi(name, Vec::new());
                }
            }
        }
    }

    /// The configured address, failing when it is unset.
    pub fn address(&self, name: ContractName) -> Result<&str> {
        self.entries
            .get(&name)
            .map(|entry| entry.address.as_str())
            .filter(|address| !address.is_empty())
            .ok_or(ChainError::AddressNotConfigured(name))
    }

    /// The configured address parsed as an account address.
    pub fn parsed_address(&self, name: ContractName) -> Result<Address> {
        let raw = self.address(name)?;
        Address::parse(raw).map_err(|source| ChainError::InvalidContractAddress { name, source })
    }

    pub fn abi(&self, name: ContractName) -> Arc<Abi> {
        self.entries
            .get(&name)
            .map(|entry| Arc::clone(&entry.abi))
            .unwrap_or_default()
    }

    pub fn resolve(&self, name: ContractName, signer: Arc<dyn Signer>) -> Result<ContractHandle> {
        let address = self.address(name)?.to_string();

        let abi = self.abi(name);
        if abi.is_empty() {
            return Err(ChainError::AbiUnavailable(name));
        }

        Ok(ContractHandle {
            name,
            address,
            abi,
            signer,
        })
    }

    pub fn resolve_by_name(&self, name: &str, signer: Arc<dyn Signer>) -> Result<ContractHandle> {
        self.resolve(name.parse()?, signer)
    }
}

/// A contract bound to its address, interface and the signer that will
/// authorize calls.
#[derive(Clone)]
pub struct ContractHandle {
    name: ContractName,
    address: String,
    abi: Arc<Abi>,
    signer: Arc<dyn Signer>,
}

impl ContractHandle {
    pub fn name(&self) -> ContractName {
        self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    pub fn functions(&self) -> impl Iterator<Item = &AbiItem> {
        self.abi.iter().filter(|item| item.is_function())
    }

    pub fn function(&self, function: &str) -> Result<&AbiItem> {
        self.functions()
            .find(|item| item.name.as_deref() == Some(function))
            .ok_or_else(|| ChainError::UnknownFunction {
                contract: self.name,
                function: function.to_string(),
            })
    }

    pub fn selector(&self, function: &str) -> Result<[u8; 4]> {
        Ok(self.function(function)?.selector())
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("abi_items", &self.abi.len())
            .field("signer", &self.signer.address())
            .finish()
    }
}
