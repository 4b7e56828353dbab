use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vault_chain::ContractName;
use vault_core::{Address, DataType, PermissionType};
use vault_platform::DEFAULT_DURATION_DAYS;

#[derive(Parser, Debug)]
#[command(name = "vault")]
#[command(version, about = "Personal data vault client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Deployment JSON written by the deploy script
    #[arg(long, global = true, env = "VAULT_DEPLOYMENT_FILE")]
    pub deployment_file: Option<PathBuf>,

    /// Directory holding compiled contract artifacts
    #[arg(long, global = true, env = "VAULT_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a contract handle and list its functions
    Resolve {
        /// DataVault, PermissionManager, MicroEconomy or AccessControl
        contract: ContractName,
    },

    /// Sign a permission grant with the configured wallet
    SignPermission {
        #[arg(long)]
        grantee: Address,

        #[arg(long)]
        record_id: u64,

        #[arg(long, default_value_t = DEFAULT_DURATION_DAYS)]
        days: u32,

        /// read, write or ai_access
        #[arg(long = "type", default_value = "read")]
        permission_type: PermissionType,

        #[arg(long, default_value_t = 0)]
        nonce: u64,
    },

    /// Pin an encrypted file to IPFS
    Upload {
        file: PathBuf,

        #[arg(long, default_value = "medical_record")]
        data_type: DataType,
    },

    /// Download a payload by CID
    Fetch {
        cid: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the gateway URL for a CID
    GatewayUrl { cid: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_permission_defaults() {
        let cli = Cli::try_parse_from([
            "vault",
            "sign-permission",
            "--grantee",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "--record-id",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::SignPermission {
                record_id,
                days,
                permission_type,
                nonce,
                ..
            } => {
                assert_eq!(record_id, 4);
                assert_eq!(days, 7);
                assert_eq!(permission_type, PermissionType::Read);
                assert_eq!(nonce, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn permission_type_and_contract_are_parsed() {
        let cli = Cli::try_parse_from([
            "vault",
            "sign-permission",
            "--grantee",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "--record-id",
            "1",
            "--type",
            "ai_access",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::SignPermission {
                permission_type: PermissionType::AiAccess,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["vault", "resolve", "MicroEconomy"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Resolve {
                contract: ContractName::MicroEconomy
            }
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["vault", "resolve", "Treasury"]).is_err());
        assert!(
            Cli::try_parse_from([
                "vault",
                "sign-permission",
                "--grantee",
                "0x1234",
                "--record-id",
                "1",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["vault", "upload", "scan.pdf", "--data-type", "x-ray"]).is_err()
        );
    }
}
