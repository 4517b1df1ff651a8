// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM envelope encryption.
//!
//! The engine knows nothing about tenants: it seals bytes under whatever key
//! it is handed and tags the result with the root key version the key was
//! derived from.

use std::fmt;

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM IV in bytes.
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Ciphertext, IV, tag and the root key version.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EncodedEnvelope", into = "EncodedEnvelope")]
pub struct EncryptedEnvelope {
	ciphertext: Vec<u8>,
	iv: [u8; IV_SIZE],
	tag: [u8; TAG_SIZE],
	key_version: String,
}

/// Text form of an envelope: standard base64 with padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedEnvelope {
	pub ciphertext: String,
	pub iv: String,
	pub tag: String,
	pub key_version: String,
}

impl EncryptedEnvelope {
	/// Parse persisted base64 columns. Any malformation is reported as
	/// [`VaultError::Decryption`].
	pub fn from_parts(
		ciphertext: &str,
		iv: &str,
		tag: &str,
		key_version: impl Into<String>,
	) -> VaultResult<Self> {
		let ciphertext = STANDARD.decode(ciphertext).map_err(|_| VaultError::Decryption)?;
		let iv: [u8; IV_SIZE] = STANDARD
			.decode(iv)
			.ok()
			.and_then(|v| v.try_into().ok())
			.ok_or(VaultError::Decryption)?;
		let tag: [u8; TAG_SIZE] = STANDARD
			.decode(tag)
			.ok()
			.and_then(|v| v.try_into().ok())
			.ok_or(VaultError::Decryption)?;

		Ok(Self {
			ciphertext,
			iv,
			tag,
			key_version: key_version.into(),
		})
	}

	pub fn encode(&self) -> EncodedEnvelope {
		EncodedEnvelope {
			ciphertext: STANDARD.encode(&self.ciphertext),
			iv: STANDARD.encode(self.iv),
			tag: STANDARD.encode(self.tag),
			key_version: self.key_version.clone(),
		}
	}

	pub fn ciphertext(&self) -> &[u8] {
		&self.ciphertext
	}

	pub fn iv(&self) -> &[u8; IV_SIZE] {
		&self.iv
	}

	pub fn tag(&self) -> &[u8; TAG_SIZE] {
		&self.tag
	}

	pub fn key_version(&self) -> &str {
		&self.key_version
	}
}

impl fmt::Debug for EncryptedEnvelope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EncryptedEnvelope")
			.field("ciphertext_len", &self.ciphertext.len())
			.field("key_version", &self.key_version)
			.finish_non_exhaustive()
	}
}

impl TryFrom<EncodedEnvelope> for EncryptedEnvelope {
	type Error = VaultError;

	fn try_from(encoded: EncodedEnvelope) -> Result<Self, Self::Error> {
		Self::from_parts(
			&encoded.ciphertext,
			&encoded.iv,
			&encoded.tag,
			encoded.key_version,
		)
	}
}

impl From<EncryptedEnvelope> for EncodedEnvelope {
	fn from(envelope: EncryptedEnvelope) -> Self {
		envelope.encode()
	}
}

/// Generate a random IV.
///
/// 96-bit random IVs from OsRng. A (key, IV) pair must never repeat; with
/// random IVs the collision probability stays negligible well past 2^32
/// encryptions under one tenant key.
pub fn generate_iv() -> [u8; IV_SIZE] {
	let mut iv = [0u8; IV_SIZE];
	OsRng.fill_bytes(&mut iv);
	iv
}

/// Seal `plaintext` under `key` with a fresh IV.
pub fn encrypt(
	plaintext: &[u8],
	key: &[u8; KEY_SIZE],
	key_version: &str,
) -> VaultResult<EncryptedEnvelope> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let iv = generate_iv();
	let mut sealed = cipher
		.encrypt(Nonce::from_slice(&iv), plaintext)
		.map_err(|_| VaultError::Validation("plaintext too large to encrypt".to_string()))?;

	let tag_bytes = sealed.split_off(sealed.len() - TAG_SIZE);
	let mut tag = [0u8; TAG_SIZE];
	tag.copy_from_slice(&tag_bytes);

	Ok(EncryptedEnvelope {
		ciphertext: sealed,
		iv,
		tag,
		key_version: key_version.to_string(),
	})
}

/// Open `envelope` with `key`. The tag is verified before any plaintext is
/// released; every failure is the same [`VaultError::Decryption`].
pub fn decrypt(envelope: &EncryptedEnvelope, key: &[u8; KEY_SIZE]) -> VaultResult<Zeroizing<Vec<u8>>> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + TAG_SIZE);
	sealed.extend_from_slice(&envelope.ciphertext);
	sealed.extend_from_slice(&envelope.tag);

	let plaintext = cipher
		.decrypt(Nonce::from_slice(&envelope.iv), sealed.as_slice())
		.map_err(|_| VaultError::Decryption)?;

	Ok(Zeroizing::new(plaintext))
}
