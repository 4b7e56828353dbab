use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use vault_chain::{ConfiguredWallet, ContractName, ContractRegistry};
use vault_ipfs::{
    DEFAULT_API_URL, DEFAULT_GATEWAY_TEMPLATE, DEFAULT_MAX_DOWNLOAD_BYTES, IpfsClient, IpfsConfig,
};

use crate::deployment::Deployment;

const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

pub fn address_variable(name: ContractName) -> &'static str {
    match name {
        ContractName::DataVault => "DATA_VAULT_ADDRESS",
        ContractName::PermissionManager => "PERMISSION_MANAGER_ADDRESS",
        ContractName::MicroEconomy => "MICRO_ECONOMY_ADDRESS",
        ContractName::AccessControl => "ACCESS_CONTROL_ADDRESS",
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractAddresses {
    pub data_vault: String,
    pub permission_manager: String,
    pub micro_economy: String,
    pub access_control: String,
}

impl ContractAddresses {
    pub fn get(&self, name: ContractName) -> &str {
        match name {
            ContractName::DataVault => &self.data_vault,
            ContractName::PermissionManager => &self.permission_manager,
            ContractName::MicroEconomy => &self.micro_economy,
            ContractName::AccessControl => &self.access_control,
        }
    }

    fn slot(&mut self, name: ContractName) -> &mut String {
        match name {
            ContractName::DataVault => &mut self.data_vault,
            ContractName::PermissionManager => &mut self.permission_manager,
            ContractName::MicroEconomy => &mut self.micro_economy,
            ContractName::AccessControl => &mut self.access_control,
        }
    }
}

#[derive(Clone)]
pub struct VaultConfig {
    pub addresses: ContractAddresses,
    pub artifacts_dir: PathBuf,
    pub deployment_file: Option<PathBuf>,
    pub ipfs: IpfsConfig,
    pub wallet_key: Option<String>,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Addresses
    /// from the environment win over the deployment file.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let deployment_file = var("VAULT_DEPLOYMENT_FILE").map(PathBuf::from);
        let deployment = match &deployment_file {
            Some(path) => Some(Deployment::load(path).context("VAULT_DEPLOYMENT_FILE is invalid")?),
            None => None,
        };

        let mut addresses = ContractAddresses::default();
        for name in ContractName::ALL {
            let from_env = var(address_variable(name));
            let from_file = deployment
                .as_ref()
                .map(|deployment| deployment.address(name).to_string())
                .filter(|address| !address.is_empty());
            *addresses.slot(name) = from_env.or(from_file).unwrap_or_default();
        }

        let timeout_secs = match var("IPFS_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("IPFS_TIMEOUT_SECS must be a number, got {raw:?}"))?,
            None => IpfsConfig::default().timeout_secs,
        };

        let max_download_bytes = match var("IPFS_MAX_DOWNLOAD_BYTES") {
            Some(raw) => raw.parse().with_context(|| {
                format!("IPFS_MAX_DOWNLOAD_BYTES must be a number, got {raw:?}")
            })?,
            None => DEFAULT_MAX_DOWNLOAD_BYTES,
        };

        let ipfs = IpfsConfig {
            api_url: var("IPFS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            gateway_template: var("IPFS_GATEWAY_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_GATEWAY_TEMPLATE.to_string()),
            token: var("WEB3_STORAGE_TOKEN"),
            timeout_secs,
            max_download_bytes,
        };

        Ok(Self {
            addresses,
            artifacts_dir: var("VAULT_ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
            deployment_file,
            ipfs,
            wallet_key: var("VAULT_WALLET_KEY"),
        })
    }

    /// Registry with the configured addresses and the ABIs found on disk.
    pub fn contract_registry(&self) -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        for name in ContractName::ALL {
            registry.set_address(name, self.addresses.get(name));
        }
        registry.load_artifacts(&self.artifacts_dir);
        registry
    }

    pub fn wallet(&self) -> Result<ConfiguredWallet> {
        let wallet = ConfiguredWallet::from_key(self.wallet_key.as_deref())
            .context("VAULT_WALLET_KEY is not a valid secp256k1 key")?;
        if self.wallet_key.is_some() {
            info!("local wallet configured");
        }
        Ok(wallet)
    }

    pub fn ipfs_client(&self) -> Result<IpfsClient> {
        IpfsClient::new(self.ipfs.clone()).context("failed to build IPFS client")
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("addresses", &self.addresses)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("deployment_file", &self.deployment_file)
            .field("ipfs_api_url", &self.ipfs.api_url)
            .field("ipfs_gateway_template", &self.ipfs.gateway_template)
            .field("ipfs_token", &self.ipfs.token.as_ref().map(|_| "<redacted>"))
            .field("wallet_key", &self.wallet_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = VaultConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.addresses, ContractAddresses::default());
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.ipfs.api_url, DEFAULT_API_URL);
        assert_eq!(config.ipfs.gateway_template, DEFAULT_GATEWAY_TEMPLATE);
        assert!(config.ipfs.token.is_none());
        assert!(config.wallet_key.is_none());
        assert_eq!(config.ipfs.max_download_bytes, DEFAULT_MAX_DOWNLOAD_BYTES);
    }

    #[test]
    fn unset_address_fails_resolution_through_registry() {
        let config = VaultConfig::from_lookup(lookup(&[("DATA_VAULT_ADDRESS", "0xabc")])).unwrap();
        let registry = config.contract_registry();

        assert_eq!(registry.address(ContractName::DataVault).unwrap(), "0xabc");
        assert_eq!(
            registry
                .address(ContractName::AccessControl)
                .unwrap_err()
                .to_string(),
            "AccessControl address not configured"
        );
    }

    #[test]
    fn environment_overrides_deployment_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("addresses.json");
        std::fs::write(
            &file,
            r#"{"DataVault": "0x1111111111111111111111111111111111111111",
                "PermissionManager": "0x2222222222222222222222222222222222222222",
                "chainId": 31337}"#,
        )
        .unwrap();
        let file = file.to_string_lossy().into_owned();

        let config = VaultConfig::from_lookup(lookup(&[
            ("VAULT_DEPLOYMENT_FILE", file.as_str()),
            ("DATA_VAULT_ADDRESS", "0x3333333333333333333333333333333333333333"),
        ]))
        .unwrap();

        assert_eq!(
            config.addresses.data_vault,
            "0x3333333333333333333333333333333333333333"
        );
        assert_eq!(
            config.addresses.permission_manager,
            "0x2222222222222222222222222222222222222222"
        );
        assert_eq!(config.addresses.micro_economy, "");
    }

    #[test]
    fn broken_deployment_file_is_an_error() {
        let err = VaultConfig::from_lookup(lookup(&[(
            "VAULT_DEPLOYMENT_FILE",
            "/nonexistent/addresses.json",
        )]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("VAULT_DEPLOYMENT_FILE is invalid"));
    }

    #[test]
    fn download_limit_is_configurable() {
        let config =
            VaultConfig::from_lookup(lookup(&[("IPFS_MAX_DOWNLOAD_BYTES", "1048576")])).unwrap();
        assert_eq!(config.ipfs.max_download_bytes, 1_048_576);

        let err = VaultConfig::from_lookup(lookup(&[("IPFS_MAX_DOWNLOAD_BYTES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("IPFS_MAX_DOWNLOAD_BYTES"));
    }

    #[test]
    fn bad_timeout_is_reported() {
        let err = VaultConfig::from_lookup(lookup(&[("IPFS_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("IPFS_TIMEOUT_SECS"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = VaultConfig::from_lookup(lookup(&[
            ("WEB3_STORAGE_TOKEN", "super-secret"),
            (
                "VAULT_WALLET_KEY",
                "0x0000000000000000000000000000000000000000000000000000000000000001",
            ),
        ]))
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
        assert!(config.ipfs_client().is_ok());
    }

    #[test]
    fn invalid_wallet_key_is_rejected() {
        let config = VaultConfig::from_lookup(lookup(&[("VAULT_WALLET_KEY", "0x00")])).unwrap();
        assert!(config.wallet().is_err());
    }
}
