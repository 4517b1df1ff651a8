// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the keys vault.
//!
//! Values are layered from, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. A TOML file (`/etc/keys/keys.toml` unless a path is given)
//! 3. Environment variables (`KEYS_*`, with `KEYS_VAULT_MASTER_KEY_FILE`
//!    support for the root secret)
//!
//! ```ignore
//! let config = keys_server_config::load_config()?;
//! let provider = RootKeyProvider::from_config(&config.vault)?;
//! ```
//!
//! The config is built once at process start and passed down explicitly.

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, load_secret_with, SecretEnvError};
pub use error::ConfigError;
pub use layer::KeysConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

const MAX_KEY_VERSION_LEN: usize = 64;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeysConfig {
	pub vault: VaultConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the system TOML file and the environment.
pub fn load_config() -> Result<KeysConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::default()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<KeysConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::default()),
	])
}

/// Load configuration from the environment only.
pub fn load_config_from_env() -> Result<KeysConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource::default())])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<KeysConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = KeysConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: KeysConfigLayer) -> Result<KeysConfig, ConfigError> {
	let vault = layer.vault.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_vault(&vault)?;

	info!(
		key_version = %vault.key_version,
		root_key_configured = vault.root_key.is_some(),
		previous_keys = vault.previous_keys.len(),
		api_key_hmac = %vault.api_key_hmac,
		database = %loggable_url(&database.url),
		log_format = ?logging.format,
		"Keys configuration loaded"
	);

	Ok(KeysConfig {
		vault,
		database,
		logging,
	})
}

/// The database URL without its query string.
fn loggable_url(url: &str) -> &str {
	url.split('?').next().unwrap_or(url)
}

fn validate_key_version(field: &str, version: &str) -> Result<(), ConfigError> {
	if version.is_empty() {
		return Err(ConfigError::Validation(format!("{field} must not be empty")));
	}
	if version.len() > MAX_KEY_VERSION_LEN {
		return Err(ConfigError::Validation(format!(
			"{field} must be at most {MAX_KEY_VERSION_LEN} characters"
		)));
	}
	if version.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(ConfigError::Validation(format!(
			"{field} must not contain whitespace"
		)));
	}
	Ok(())
}

fn validate_vault(vault: &VaultConfig) -> Result<(), ConfigError> {
	validate_key_version("vault.key_version", &vault.key_version)?;
	for previous in &vault.previous_keys {
		validate_key_version("vault.previous_keys.version", &previous.version)?;
	}
	Ok(())
}
