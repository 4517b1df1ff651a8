// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::env::load_secret_with;
use crate::error::ConfigError;
use crate::layer::KeysConfigLayer;
use crate::sections::{
	ApiKeyHmacMode, DatabaseConfigLayer, LogFormat, LoggingConfigLayer, VaultConfigLayer,
};

pub const ENV_MASTER_KEY: &str = "KEYS_VAULT_MASTER_KEY";
pub const ENV_KEY_VERSION: &str = "KEYS_VAULT_KEY_VERSION";
pub const ENV_API_KEY_HMAC: &str = "KEYS_VAULT_API_KEY_HMAC";
pub const ENV_DATABASE_URL: &str = "KEYS_DATABASE_URL";
pub const ENV_LOG_LEVEL: &str = "KEYS_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "KEYS_LOG_FORMAT";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<KeysConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<KeysConfigLayer, ConfigError> {
		Ok(KeysConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/keys/keys.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<KeysConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(KeysConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: KeysConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: `KEYS_<SECTION>_<FIELD>`. The root key also honours
/// `KEYS_VAULT_MASTER_KEY_FILE`.
pub struct EnvSource {
	lookup: Lookup,
}

impl Default for EnvSource {
	fn default() -> Self {
		Self {
			lookup: Box::new(|name: &str| std::env::var(name).ok()),
		}
	}
}

impl EnvSource {
	/// Resolve variables through `lookup` instead of the process environment.
	pub fn with_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr<Err = String>,
	{
		match self.var(name) {
			Some(v) => v
				.parse()
				.map(Some)
				.map_err(|message| ConfigError::InvalidValue {
					key: name.to_string(),
					message,
				}),
			None => Ok(None),
		}
	}

	fn load_vault(&self) -> Result<VaultConfigLayer, ConfigError> {
		Ok(VaultConfigLayer {
			root_key: load_secret_with(ENV_MASTER_KEY, |name| (self.lookup)(name))?,
			key_version: self.var(ENV_KEY_VERSION),
			previous_keys: None,
			api_key_hmac: self.parsed::<ApiKeyHmacMode>(ENV_API_KEY_HMAC)?,
		})
	}

	fn load_database(&self) -> DatabaseConfigLayer {
		DatabaseConfigLayer {
			url: self.var(ENV_DATABASE_URL),
		}
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		Ok(LoggingConfigLayer {
			level: self.var(ENV_LOG_LEVEL),
			format: self.parsed::<LogFormat>(ENV_LOG_FORMAT)?,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<KeysConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(KeysConfigLayer {
			vault: Some(self.load_vault()?),
			database: Some(self.load_database()),
			logging: Some(self.load_logging()?),
		})
	}
}
