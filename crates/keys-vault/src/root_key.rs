// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Root secret loading and validation.
//!
//! The root secret is the only long-lived key. Every tenant key and the API
//! key MAC key are derived from it. Validation happens once, when the
//! provider is built; afterwards key lookups cannot fail.

use std::collections::HashMap;
use std::fmt;

use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use keys_common_secret::{SecretString, REDACTED};
use keys_server_config::VaultConfig;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::encryption::KEY_SIZE;
use crate::error::{VaultError, VaultResult};

/// A 32-byte root secret and its version tag.
pub struct RootKey {
	version: String,
	bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl RootKey {
	pub fn from_bytes(version: impl Into<String>, bytes: [u8; KEY_SIZE]) -> Self {
		Self {
			version: version.into(),
			bytes: Zeroizing::new(bytes),
		}
	}

	/// Decode a standard base64 root secret. `label` names the setting in
	/// error messages; the value itself is never echoed.
	pub fn from_base64(label: &str, version: impl Into<String>, encoded: &SecretString) -> VaultResult<Self> {
		let decoded = Zeroizing::new(
			STANDARD
				.decode(encoded.expose().trim())
				.map_err(|_| VaultError::Configuration(format!("{label} is not valid base64")))?,
		);

		if decoded.len() != KEY_SIZE {
			return Err(VaultError::Configuration(format!(
				"{label} must decode to exactly {KEY_SIZE} bytes, got {}",
				decoded.len()
			)));
		}

		let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
		bytes.copy_from_slice(&decoded);
		Ok(Self {
			version: version.into(),
			bytes,
		})
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub(crate) fn bytes(&self) -> &[u8; KEY_SIZE] {
		&self.bytes
	}
}

impl fmt::Debug for RootKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RootKey")
			.field("version", &self.version)
			.field("bytes", &REDACTED)
			.finish()
	}
}

/// Holds the current root secret and any retired ones still needed to open
/// envelopes tagged with their versions.
pub struct RootKeyProvider {
	current: RootKey,
	previous: HashMap<String, RootKey>,
}

impl RootKeyProvider {
	pub fn new(current: RootKey, previous: Vec<RootKey>) -> VaultResult<Self> {
		let mut by_version = HashMap::with_capacity(previous.len());
		for key in previous {
			if key.version == current.version || by_version.contains_key(&key.version) {
				return Err(VaultError::Configuration(format!(
					"root key version {} is configured more than once",
					key.version
				)));
			}
			by_version.insert(key.version.clone(), key);
		}

		Ok(Self {
			current,
			previous: by_version,
		})
	}

	/// Build the provider from resolved configuration.
	///
	/// A missing, non-base64 or wrong-length root secret is fatal.
	pub fn from_config(config: &VaultConfig) -> VaultResult<Self> {
		let encoded = config.root_key.as_ref().ok_or_else(|| {
			VaultError::Configuration(
				"KEYS_VAULT_MASTER_KEY is not set; generate one with `keysctl gen-root-key`".to_string(),
			)
		})?;
		let current = RootKey::from_base64("KEYS_VAULT_MASTER_KEY", config.key_version.clone(), encoded)?;

		let previous = config
			.previous_keys
			.iter()
			.map(|p| {
				RootKey::from_base64(
					&format!("vault.previous_keys[{}]", p.version),
					p.version.clone(),
					&p.key,
				)
			})
			.collect::<VaultResult<Vec<_>>>()?;

		Self::new(current, previous)
	}

	/// The key new envelopes are sealed with.
	pub fn current(&self) -> &RootKey {
		&self.current
	}

	/// Retired keys, in no particular order.
	pub fn previous(&self) -> impl Iterator<Item = &RootKey> {
		self.previous.values()
	}

	/// The key for `version`, current or previous.
	pub fn key_for_version(&self, version: &str) -> Option<&RootKey> {
		if version == self.current.version {
			Some(&self.current)
		} else {
			self.previous.get(version)
		}
	}
}

impl fmt::Debug for RootKeyProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut previous: Vec<&str> = self.previous.keys().map(String::as_str).collect();
		previous.sort_unstable();
		f.debug_struct("RootKeyProvider")
			.field("current_version", &self.current.version)
			.field("previous_versions", &previous)
			.finish()
	}
}

/// A fresh random root secret, base64 encoded.
pub fn generate_root_key() -> SecretString {
	let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(bytes.as_mut());
	SecretString::new(STANDARD.encode(&*bytes))
}

#[cfg(test)]
mod tests {
	use super::*;
	use keys_server_config::PreviousRootKey;

	const ZERO_KEY_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
	const ONES_KEY_B64: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

	fn config(root: Option<&str>) -> VaultConfig {
		VaultConfig {
			root_key: root.map(|r| SecretString::new(r.to_string())),
			..Default::default()
		}
	}

	mod loading {
		use super::*;

		#[test]
		fn valid_key_loads_with_version() {
			let provider = RootKeyProvider::from_config(&config(Some(ZERO_KEY_B64))).unwrap();
			assert_eq!(provider.current().version(), "1");
			assert_eq!(provider.current().bytes(), &[0u8; KEY_SIZE]);
		}

		#[test]
		fn missing_key_is_configuration_error() {
			let err = RootKeyProvider::from_config(&config(None)).unwrap_err();
			assert!(matches!(err, VaultError::Configuration(_)));
		}

		#[test]
		fn invalid_base64_is_configuration_error() {
			let err = RootKeyProvider::from_config(&config(Some("not*base64!"))).unwrap_err();
			assert!(matches!(err, VaultError::Configuration(ref m) if m.contains("base64")));
		}

		#[test]
		fn wrong_length_is_configuration_error() {
			let err = RootKeyProvider::from_config(&config(Some("AAAA"))).unwrap_err();
			assert!(matches!(err, VaultError::Configuration(ref m) if m.contains("got 3")));
		}

		#[test]
		fn error_never_echoes_the_value() {
			let secret = "dG9vLXNob3J0LXNlY3JldA==";
			let err = RootKeyProvider::from_config(&config(Some(secret))).unwrap_err();
			assert!(!err.to_string().contains(secret));
		}
	}

	mod versions {
		use super::*;

		#[test]
		fn previous_keys_are_found_by_version() {
			let mut cfg = config(Some(ZERO_KEY_B64));
			cfg.key_version = "2".to_string();
			cfg.previous_keys = vec![PreviousRootKey {
				version: "1".to_string(),
				key: SecretString::new(ONES_KEY_B64.to_string()),
			}];

			let provider = RootKeyProvider::from_config(&cfg).unwrap();
			assert_eq!(provider.key_for_version("2").unwrap().bytes(), &[0u8; KEY_SIZE]);
			assert_eq!(provider.key_for_version("1").unwrap().bytes(), &[1u8; KEY_SIZE]);
			assert!(provider.key_for_version("0").is_none());

			let previous: Vec<&str> = provider.previous().map(RootKey::version).collect();
			assert_eq!(previous, vec!["1"]);
		}

		#[test]
		fn duplicate_versions_are_rejected() {
			let current = RootKey::from_bytes("1", [0u8; KEY_SIZE]);
			let err = RootKeyProvider::new(current, vec![RootKey::from_bytes("1", [1u8; KEY_SIZE])]).unwrap_err();
			assert!(matches!(err, VaultError::Configuration(_)));

			let current = RootKey::from_bytes("3", [0u8; KEY_SIZE]);
			let err = RootKeyProvider::new(
				current,
				vec![
					RootKey::from_bytes("1", [1u8; KEY_SIZE]),
					RootKey::from_bytes("1", [2u8; KEY_SIZE]),
				],
			)
			.unwrap_err();
			assert!(matches!(err, VaultError::Configuration(_)));
		}
	}

	mod redaction {
		use super::*;

		#[test]
		fn debug_shows_versions_only() {
			let provider = RootKeyProvider::new(
				RootKey::from_bytes("2", [0xAB; KEY_SIZE]),
				vec![RootKey::from_bytes("1", [0xCD; KEY_SIZE])],
			)
			.unwrap();

			let debug = format!("{provider:?}");
			assert!(debug.contains("current_version"));
			assert!(!debug.contains("171"));
			assert!(!debug.contains("0xab") && !debug.contains("AB"));

			let key_debug = format!("{:?}", provider.current());
			assert!(key_debug.contains(REDACTED));
		}
	}

	#[test]
	fn generated_keys_decode_to_32_bytes_and_differ() {
		let a = generate_root_key();
		let b = generate_root_key();
		assert_ne!(a.expose(), b.expose());

		let key = RootKey::from_base64("generated", "1", &a).unwrap();
		assert_eq!(key.bytes().len(), KEY_SIZE);
	}
}
