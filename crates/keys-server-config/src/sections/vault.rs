// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault configuration: the root secret, its version tag, retired root
//! secrets still needed to read old envelopes, and the API-key MAC mode.

use std::fmt;
use std::str::FromStr;

use keys_common_secret::SecretString;
use serde::Deserialize;

pub const DEFAULT_KEY_VERSION: &str = "1";

/// Which key API-key hashes are computed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyHmacMode {
	/// HMAC keyed by a subkey derived from the root secret with its own label.
	#[default]
	Derived,
	/// HMAC keyed by the root secret itself. Matches hashes stored by earlier
	/// deployments.
	Root,
}

impl FromStr for ApiKeyHmacMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"derived" => Ok(Self::Derived),
			"root" => Ok(Self::Root),
			other => Err(format!("expected 'derived' or 'root', got '{other}'")),
		}
	}
}

impl fmt::Display for ApiKeyHmacMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Derived => f.write_str("derived"),
			Self::Root => f.write_str("root"),
		}
	}
}

/// A root secret that has been rotated out but may still be referenced by
/// envelopes carrying its version tag.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PreviousRootKey {
	pub version: String,
	pub key: SecretString,
}

/// Vault configuration (runtime, fully resolved).
#[derive(Clone, PartialEq)]
pub struct VaultConfig {
	/// Base64 of exactly 32 bytes. `None` when not configured; the vault
	/// refuses to start in that case.
	pub root_key: Option<SecretString>,
	pub key_version: String,
	pub previous_keys: Vec<PreviousRootKey>,
	pub api_key_hmac: ApiKeyHmacMode,
}

impl Default for VaultConfig {
	fn default() -> Self {
		Self {
			root_key: None,
			key_version: DEFAULT_KEY_VERSION.to_string(),
			previous_keys: Vec::new(),
			api_key_hmac: ApiKeyHmacMode::default(),
		}
	}
}

impl fmt::Debug for VaultConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VaultConfig")
			.field("root_key", &self.root_key.as_ref().map(|_| keys_common_secret::REDACTED))
			.field("key_version", &self.key_version)
			.field(
				"previous_key_versions",
				&self.previous_keys.iter().map(|k| k.version.as_str()).collect::<Vec<_>>(),
			)
			.field("api_key_hmac", &self.api_key_hmac)
			.finish()
	}
}

/// Vault configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfigLayer {
	#[serde(default)]
	pub root_key: Option<SecretString>,
	#[serde(default)]
	pub key_version: Option<String>,
	#[serde(default)]
	pub previous_keys: Option<Vec<PreviousRootKey>>,
	#[serde(default)]
	pub api_key_hmac: Option<ApiKeyHmacMode>,
}

impl VaultConfigLayer {
	pub fn merge(&mut self, other: VaultConfigLayer) {
		if other.root_key.is_some() {
			self.root_key = other.root_key;
		}
		if other.key_version.is_some() {
			self.key_version = other.key_version;
		}
		if other.previous_keys.is_some() {
			self.previous_keys = other.previous_keys;
		}
		if other.api_key_hmac.is_some() {
			self.api_key_hmac = other.api_key_hmac;
		}
	}

	pub fn finalize(self) -> VaultConfig {
		VaultConfig {
			root_key: self.root_key.filter(|k| !k.is_blank()),
			key_version: self
				.key_version
				.map(|v| v.trim().to_string())
				.unwrap_or_else(|| DEFAULT_KEY_VERSION.to_string()),
			previous_keys: self.previous_keys.unwrap_or_default(),
			api_key_hmac: self.api_key_hmac.unwrap_or_default(),
		}
	}
}
