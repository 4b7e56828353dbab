use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use vault_chain::ContractName;

/// Addresses written by the deploy script.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    #[serde(rename = "DataVault", default)]
    pub data_vault: String,
    #[serde(rename = "PermissionManager", default)]
    pub permission_manager: String,
    #[serde(rename = "MicroEconomy", default)]
    pub micro_economy: String,
    #[serde(rename = "AccessControl", default)]
    pub access_control: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(
        rename = "chainId",
        default,
        deserialize_with = "chain_id_from_number_or_string"
    )]
    pub chain_id: Option<u64>,
}

impl Deployment {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployment file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse deployment file {}", path.display()))
    }

    pub fn address(&self, name: ContractName) -> &str {
        match name {
            ContractName::DataVault => &self.data_vault,
            ContractName::PermissionManager => &self.permission_manager,
            ContractName::MicroEconomy => &self.micro_economy,
            ContractName::AccessControl => &self.access_control,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainIdRepr {
    Number(u64),
    Text(String),
}

fn chain_id_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ChainIdRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ChainIdRepr::Number(id)) => Ok(Some(id)),
        Some(ChainIdRepr::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
