//! CLI harness for exercising the keyring against a vault file
//!
//! This tool allows:
//! - Creating or restoring a vault
//! - Unlocking and listing accounts
//! - Adding and importing accounts
//! - Signing personal messages
//! - Checking account activity and gas buffering

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyring_controller::KeyringController;
use keyring_core::{Address, MessageParams, SourceKind};
use keyring_ledger::{ActivityChecker, IndexerActivityChecker};
use keyring_params::LedgerSettings;
use keyring_storage::FileVaultStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "keyring-harness")]
#[command(about = "IRChain keyring testing harness", long_about = None)]
struct Cli {
    /// Vault file
    #[arg(short, long, global = true, default_value = "keyring-vault.json")]
    vault: PathBuf,

    /// Hardware bridge settings (JSON, merged over defaults)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a vault with a fresh seed phrase
    Create {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,
    },

    /// Restore a vault from a seed phrase
    Restore {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,

        /// BIP-39 seed phrase
        #[arg(long, env = "KEYRING_MNEMONIC")]
        mnemonic: String,
    },

    /// Unlock the vault and list its accounts
    List {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,
    },

    /// Derive one more account from the first HD key tree
    AddAccount {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,
    },

    /// Import a hex private key
    Import {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,

        /// Private key (hex, with or without 0x)
        #[arg(long, env = "KEYRING_PRIVATE_KEY")]
        key: String,
    },

    /// Sign a personal message
    SignPersonal {
        /// Vault password
        #[arg(long, env = "KEYRING_PASSWORD")]
        password: String,

        /// Signing account
        #[arg(short, long)]
        from: String,

        /// Message text or 0x hex
        #[arg(short, long)]
        message: String,
    },

    /// Check whether an address has on-chain history
    Activity {
        /// Address to look up
        address: String,
    },

    /// Add the gas safety margin to a hex estimate
    GasBuffer {
        /// Gas estimate, e.g. 0x5208
        gas: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => LedgerSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => LedgerSettings::default(),
    };

    let controller = KeyringController::with_store(Arc::new(FileVaultStore::new(&cli.vault)));

    match cli.command {
        Commands::Create { password } => {
            let snapshot = controller.create_new_vault_and_keychain(&password).await?;
            info!("Vault written to {}", cli.vault.display());
            print_accounts(snapshot.accounts());
        }
        Commands::Restore { password, mnemonic } => {
            let snapshot = controller
                .create_new_vault_and_restore(&password, &mnemonic)
                .await?;
            info!("Vault restored to {}", cli.vault.display());
            print_accounts(snapshot.accounts());
        }
        Commands::List { password } => {
            let snapshot = controller.submit_password(&password).await?;
            for keyring in &snapshot.keyrings {
                println!("{} {}", keyring.id, keyring.kind);
                for account in &keyring.accounts {
                    println!("  {}", account);
                }
            }
        }
        Commands::AddAccount { password } => {
            controller.submit_password(&password).await?;
            let hd = controller
                .get_keyrings_by_type(SourceKind::HdTree)
                .await?
                .first()
                .copied()
                .context("Vault has no HD key tree")?;
            let added = controller.add_new_account(hd).await?;
            print_accounts(added.iter());
        }
        Commands::Import { password, key } => {
            controller.submit_password(&password).await?;
            let id = controller
                .add_new_keyring(SourceKind::Simple, json!([key]))
                .await?;
            info!("Imported key into source {}", id);
            print_accounts(controller.snapshot().await?.accounts());
        }
        Commands::SignPersonal {
            password,
            from,
            message,
        } => {
            controller.submit_password(&password).await?;
            let params = MessageParams {
                from: Address::parse(&from)?,
                data: message,
            };
            println!("{}", controller.sign_personal_message(&params).await?);
        }
        Commands::Activity { address } => {
            let address = Address::parse(&address)?;
            let checker = IndexerActivityChecker::new(&settings.network());
            info!("Querying {}", checker.lookup_url(&address));
            println!("{}", checker.has_activity(&address).await);
        }
        Commands::GasBuffer { gas } => {
            println!("{}", controller.add_gas_buffer(&gas)?);
        }
    }

    Ok(())
}

fn print_accounts<'a>(accounts: impl Iterator<Item = &'a Address>) {
    for account in accounts {
        println!("{}", account);
    }
}
