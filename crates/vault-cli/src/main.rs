use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, SubsecRound, Utc};
use clap::Parser;
use serde_json::json;
use tracing::info;
use vault_chain::{
    ContractName, PermissionGrant, Signer, WalletProvider, create_permission_signature,
};
use vault_core::{Address, DataType, PermissionType, to_hex_prefixed, unix_seconds};
use vault_platform::{MAX_DURATION_DAYS, VaultConfig};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vault_cli=info".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Resolve { contract } => resolve(&config, contract).await,
        Commands::SignPermission {
            grantee,
            record_id,
            days,
            permission_type,
            nonce,
        } => sign_permission(&config, grantee, record_id, days, permission_type, nonce).await,
        Commands::Upload { file, data_type } => upload(&config, &file, data_type).await,
        Commands::Fetch { cid, out } => fetch(&config, &cid, out.as_deref()).await,
        Commands::GatewayUrl { cid } => {
            let url = vault_ipfs::gateway_url(&config.ipfs.gateway_template, &cid);
            print_json(&json!({ "cid": cid, "gateway_url": url }))
        }
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let deployment_file = cli
        .deployment_file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());
    let artifacts_dir = cli
        .artifacts_dir
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());

    VaultConfig::from_lookup(|key| match key {
        "VAULT_DEPLOYMENT_FILE" if deployment_file.is_some() => deployment_file.clone(),
        "VAULT_ARTIFACTS_DIR" if artifacts_dir.is_some() => artifacts_dir.clone(),
        _ => std::env::var(key).ok(),
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn resolve(config: &VaultConfig, contract: ContractName) -> Result<()> {
    let wallet = config.wallet()?;
    let signer = wallet.signer().await?;
    let handle = config.contract_registry().resolve(contract, signer)?;

    let functions: Vec<_> = handle
        .functions()
        .map(|function| {
            json!({
                "signature": function.signature(),
                "selector": to_hex_prefixed(&function.selector()),
                "state_mutability": function.state_mutability,
            })
        })
        .collect();

    info!(contract = %handle.name(), address = handle.address(), "contract resolved");
    print_json(&json!({
        "contract": handle.name(),
        "address": handle.address(),
        "signer": handle.signer().address(),
        "functions": functions,
    }))
}

async fn sign_permission(
    config: &VaultConfig,
    grantee: Address,
    record_id: u64,
    days: u32,
    permission_type: PermissionType,
    nonce: u64,
) -> Result<()> {
    if days == 0 || days > MAX_DURATION_DAYS {
        anyhow::bail!("--days must be between 1 and {MAX_DURATION_DAYS}, got {days}");
    }

    let wallet = Arc::new(config.wallet()?);
    let owner = wallet.signer().await?.address();
    let expiry = Utc::now().trunc_subsecs(0) + Duration::days(i64::from(days));

    let grant = PermissionGrant {
        owner,
        grantee,
        record_id,
        expiry_time: unix_seconds(expiry),
        permission_type,
        nonce,
    };
    let signed = create_permission_signature(wallet, &config.contract_registry(), &grant)
        .await
        .context("failed to create permission signature")?;

    info!(%owner, %grantee, record_id, nonce, "permission signed");
    print_json(&serde_json::to_value(&signed)?)
}

async fn upload(config: &VaultConfig, file: &Path, data_type: DataType) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());

    let client = config.ipfs_client()?;
    let cid = client.upload_encrypted(&data, &file_name).await?;

    print_json(&json!({
        "cid": cid,
        "gateway_url": client.gateway_url(&cid),
        "file_name": file_name,
        "data_type": data_type,
        "size": data.len(),
    }))
}

async fn fetch(config: &VaultConfig, cid: &str, out: Option<&Path>) -> Result<()> {
    let client = config.ipfs_client()?;
    let data = client.get(cid).await?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(cid, path = %path.display(), bytes = data.len(), "payload saved");
            Ok(())
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(&data)
                .context("failed to write payload to stdout")
        }
    }
}
