// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! keysctl - administration for the keys vault
//!
//! Opens the configured SQLite database directly. Secret values and API key
//! tokens are read from stdin, never from arguments.

mod api_key;
mod input;
mod secret;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keys_redact::{redact_url, RedactingMakeWriter};
use keys_server_config::{load_config, load_config_with_file, KeysConfig, LogFormat, LoggingConfig};
use keys_server_db::{create_pool, run_migrations};
use keys_vault::{
	generate_root_key, ApiKeyHasher, RootKeyProvider, SqliteApiKeyStore, SqliteSecretStore,
	TenantId, VaultService,
};

use crate::api_key::ApiKeyCommand;
use crate::secret::SecretCommand;

type SqliteVaultService = VaultService<SqliteSecretStore, SqliteApiKeyStore>;

/// keysctl - manage vault secrets and API keys
#[derive(Parser, Debug)]
#[command(name = "keysctl", version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "KEYS_CONFIG_PATH")]
	config: Option<PathBuf>,

	/// Tenant to act as
	#[arg(long, env = "KEYS_OWNER", global = true)]
	owner: Option<TenantId>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print a fresh base64 root key
	GenRootKey,
	/// Validate configuration and the root key
	Check,
	/// Manage secrets
	Secret {
		#[command(subcommand)]
		command: SecretCommand,
	},
	/// Manage API keys
	ApiKey {
		#[command(subcommand)]
		command: ApiKeyCommand,
	},
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

	let redacting_writer = RedactingMakeWriter::new(std::io::stderr);

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(redacting_writer))
				.init();
		}
		LogFormat::Text => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(redacting_writer))
				.init();
		}
	}
}

fn load(path: Option<&Path>) -> Result<KeysConfig> {
	let config = match path {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config.logging);
	Ok(config)
}

pub(crate) fn require_owner(owner: Option<TenantId>) -> Result<TenantId> {
	owner.context("--owner (or KEYS_OWNER) is required for this command")
}

fn check(config: &KeysConfig) -> Result<()> {
	let keys = RootKeyProvider::from_config(&config.vault).context("invalid root key configuration")?;
	ApiKeyHasher::new(keys.current(), config.vault.api_key_hmac)
		.context("failed to derive API key hashing key")?;

	println!("configuration ok");
	println!("root key version: {}", keys.current().version());
	for previous in &config.vault.previous_keys {
		println!("previous key:     {}", previous.version);
	}
	println!("api key hmac:     {}", config.vault.api_key_hmac);
	println!("database:         {}", redact_url(&config.database.url));
	Ok(())
}

async fn open_service(config: &KeysConfig) -> Result<SqliteVaultService> {
	let keys = RootKeyProvider::from_config(&config.vault).context("invalid root key configuration")?;

	let pool = create_pool(&config.database.url)
		.await
		.context("failed to open database")?;
	run_migrations(&pool).await.context("failed to run migrations")?;

	info!(key_version = %keys.current().version(), "opened vault");
	VaultService::sqlite(pool, Arc::new(keys), config.vault.api_key_hmac)
		.context("failed to initialize vault")
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	match args.command {
		Command::GenRootKey => {
			println!("{}", generate_root_key().expose());
			Ok(())
		}
		Command::Check => {
			let config = load(args.config.as_deref())?;
			check(&config)
		}
		Command::Secret { command } => {
			let config = load(args.config.as_deref())?;
			let owner = require_owner(args.owner)?;
			let service = open_service(&config).await?;
			secret::run(&service, &owner, command).await
		}
		Command::ApiKey { command } => {
			let config = load(args.config.as_deref())?;
			let service = open_service(&config).await?;
			api_key::run(&service, args.owner, command).await
		}
	}
}
