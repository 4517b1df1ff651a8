// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key generation and verification.
//!
//! Tokens look like `kx_live_<44 chars>`: a prefix, an underscore and 33
//! random bytes in URL-safe base64 without padding (264 bits of entropy).
//! Only `HMAC-SHA256(mac_key, token)` is stored, as 64 lowercase hex
//! characters. Verification recomputes the MAC and compares in constant time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use keys_common_secret::{SecretString, REDACTED};
use keys_server_config::ApiKeyHmacMode;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::derivation::derive_mac_key;
use crate::encryption::KEY_SIZE;
use crate::error::{VaultError, VaultResult};
use crate::root_key::RootKey;
use crate::types::{ApiKeyRecord, ApiKeyStatus};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token.
pub const TOKEN_RANDOM_BYTES: usize = 33;

/// Length of the encoded random part.
pub const TOKEN_RANDOM_LEN: usize = 44;

/// Random part of tokens minted from 32 bytes by the previous issuer. Their
/// hashes only match under [`ApiKeyHmacMode::Root`].
pub const LEGACY_TOKEN_RANDOM_LEN: usize = 43;

/// Length of a hex-encoded key hash.
pub const KEY_HASH_LEN: usize = 64;

/// Characters of the random part shown on each side of a partial key.
const PARTIAL_VISIBLE: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiKeyPrefix {
	#[default]
	#[serde(rename = "kx_live")]
	Live,
	#[serde(rename = "kx_test")]
	Test,
}

impl ApiKeyPrefix {
	pub const ALL: [ApiKeyPrefix; 2] = [ApiKeyPrefix::Live, ApiKeyPrefix::Test];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Live => "kx_live",
			Self::Test => "kx_test",
		}
	}
}

impl fmt::Display for ApiKeyPrefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ApiKeyPrefix {
	type Err = VaultError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| VaultError::Validation("api key prefix must be kx_live or kx_test".to_string()))
	}
}

/// Split a presented token into prefix and random part. `None` for anything
/// that could not have been issued here.
pub fn parse_token(token: &str) -> Option<(ApiKeyPrefix, &str)> {
	ApiKeyPrefix::ALL.into_iter().find_map(|prefix| {
		let random = token.strip_prefix(prefix.as_str())?.strip_prefix('_')?;
		let well_formed = matches!(random.len(), LEGACY_TOKEN_RANDOM_LEN | TOKEN_RANDOM_LEN)
			&& random
				.bytes()
				.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
		well_formed.then_some((prefix, random))
	})
}

/// Keyed hash over API key tokens.
pub struct ApiKeyHasher {
	key: Zeroizing<[u8; KEY_SIZE]>,
}

impl ApiKeyHasher {
	/// Build the hasher for `mode`: a derived subkey, or the root key itself
	/// for hashes issued before the subkey existed.
	pub fn new(root: &RootKey, mode: ApiKeyHmacMode) -> VaultResult<Self> {
		let key = match mode {
			ApiKeyHmacMode::Derived => derive_mac_key(root.bytes())?,
			ApiKeyHmacMode::Root => Zeroizing::new(*root.bytes()),
		};
		Ok(Self { key })
	}

	/// HMAC-SHA256 of `token` as lowercase hex.
	pub fn hash(&self, token: &str) -> String {
		let mut mac =
			HmacSha256::new_from_slice(self.key.as_slice()).expect("HMAC can take key of any size");
		mac.update(token.as_bytes());
		hex::encode(mac.finalize().into_bytes())
	}
}

impl fmt::Debug for ApiKeyHasher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApiKeyHasher").field("key", &REDACTED).finish()
	}
}

/// A freshly generated token with its hash and display form.
pub struct GeneratedApiKey {
	pub token: SecretString,
	pub hash: String,
	pub partial_key: String,
}

impl fmt::Debug for GeneratedApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GeneratedApiKey")
			.field("token", &self.token)
			.field("partial_key", &self.partial_key)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone)]
pub struct ApiKeyIssuer {
	hasher: Arc<ApiKeyHasher>,
}

impl ApiKeyIssuer {
	pub fn new(hasher: Arc<ApiKeyHasher>) -> Self {
		Self { hasher }
	}

	pub fn generate(&self, prefix: ApiKeyPrefix) -> GeneratedApiKey {
		let mut random = Zeroizing::new([0u8; TOKEN_RANDOM_BYTES]);
		OsRng.fill_bytes(random.as_mut());
		let encoded = Zeroizing::new(URL_SAFE_NO_PAD.encode(&*random));

		let partial_key = format!(
			"{prefix}_{}...{}",
			&encoded[..PARTIAL_VISIBLE],
			&encoded[encoded.len() - PARTIAL_VISIBLE..]
		);
		let token = SecretString::new(format!("{prefix}_{}", encoded.as_str()));
		let hash = self.hasher.hash(token.expose());

		GeneratedApiKey {
			token,
			hash,
			partial_key,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ApiKeyVerifier {
	hasher: Arc<ApiKeyHasher>,
}

impl ApiKeyVerifier {
	pub fn new(hasher: Arc<ApiKeyHasher>) -> Self {
		Self { hasher }
	}

	pub fn hash(&self, token: &str) -> String {
		self.hasher.hash(token)
	}

	/// Constant-time check of `token` against `stored_hash`. A stored hash of
	/// the wrong length never matches.
	pub fn verify(&self, token: &str, stored_hash: &str) -> bool {
		let computed = self.hasher.hash(token);
		if stored_hash.len() != KEY_HASH_LEN {
			return false;
		}
		computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
	}

	/// Cryptographic check first, then revocation and expiry.
	pub fn verify_record(&self, token: &str, record: &ApiKeyRecord, now: DateTime<Utc>) -> bool {
		self.verify(token, &record.hash) && record.status(now) == ApiKeyStatus::Active
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ApiKeyId, TenantId};
	use chrono::Duration;
	use proptest::prelude::*;

	fn hasher(mode: ApiKeyHmacMode) -> Arc<ApiKeyHasher> {
		Arc::new(ApiKeyHasher::new(&RootKey::from_bytes("1", [5u8; KEY_SIZE]), mode).unwrap())
	}

	fn pair() -> (ApiKeyIssuer, ApiKeyVerifier) {
		let h = hasher(ApiKeyHmacMode::Derived);
		(ApiKeyIssuer::new(h.clone()), ApiKeyVerifier::new(h))
	}

	fn record_for(generated: &GeneratedApiKey) -> ApiKeyRecord {
		ApiKeyRecord {
			id: ApiKeyId::generate(),
			owner_id: TenantId::new("user123").unwrap(),
			name: "ci".to_string(),
			prefix: ApiKeyPrefix::Live,
			hash: generated.hash.clone(),
			scopes: Vec::new(),
			expires_at: None,
			revoked_at: None,
			last_used_at: None,
			created_at: Utc::now(),
		}
	}

	mod format {
		use super::*;

		#[test]
		fn token_has_prefix_and_44_char_random_part() {
			let (issuer, _) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let token = generated.token.expose();

			assert!(token.starts_with("kx_live_"));
			assert_eq!(token.len(), "kx_live_".len() + TOKEN_RANDOM_LEN);
			let (prefix, random) = parse_token(token).unwrap();
			assert_eq!(prefix, ApiKeyPrefix::Live);
			assert_eq!(random.len(), TOKEN_RANDOM_LEN);
		}

		#[test]
		fn test_prefix_is_honoured() {
			let (issuer, _) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Test);
			assert!(generated.token.expose().starts_with("kx_test_"));
		}

		#[test]
		fn hash_is_64_lowercase_hex() {
			let (issuer, _) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			assert_eq!(generated.hash.len(), KEY_HASH_LEN);
			assert!(generated
				.hash
				.chars()
				.all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
		}

		#[test]
		fn partial_key_shows_four_chars_each_side() {
			let (issuer, _) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let (_, random) = parse_token(generated.token.expose()).unwrap();
			let expected = format!("kx_live_{}...{}", &random[..4], &random[random.len() - 4..]);
			assert_eq!(generated.partial_key, expected);
		}

		#[test]
		fn tokens_are_unique() {
			let (issuer, _) = pair();
			let a = issuer.generate(ApiKeyPrefix::Live);
			let b = issuer.generate(ApiKeyPrefix::Live);
			assert_ne!(a.token, b.token);
			assert_ne!(a.hash, b.hash);
		}

		#[test]
		fn malformed_tokens_do_not_parse() {
			let random = "A".repeat(TOKEN_RANDOM_LEN);
			assert!(parse_token(&format!("kx_live_{random}")).is_some());
			assert!(parse_token(&format!("kx_prod_{random}")).is_none());
			assert!(parse_token(&format!("kx_live{random}")).is_none());
			assert!(parse_token(&format!("kx_live_{}", &random[2..])).is_none());
			assert!(parse_token(&format!("kx_live_{random}A")).is_none());
			assert!(parse_token(&format!("kx_live_{}+", &random[1..])).is_none());
			assert!(parse_token("").is_none());
		}

		#[test]
		fn legacy_32_byte_tokens_parse() {
			let random = URL_SAFE_NO_PAD.encode([7u8; 32]);
			assert_eq!(random.len(), LEGACY_TOKEN_RANDOM_LEN);
			let token = format!("kx_test_{random}");
			assert_eq!(parse_token(&token), Some((ApiKeyPrefix::Test, random.as_str())));
		}

		#[test]
		fn prefix_parsing() {
			assert_eq!("kx_test".parse::<ApiKeyPrefix>().unwrap(), ApiKeyPrefix::Test);
			assert!(matches!("sk_live".parse::<ApiKeyPrefix>(), Err(VaultError::Validation(_))));
			assert_eq!(ApiKeyPrefix::default(), ApiKeyPrefix::Live);
		}

		#[test]
		fn debug_never_shows_token() {
			let (issuer, _) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let debug = format!("{generated:?}");
			assert!(!debug.contains(generated.token.expose()));
			assert!(!debug.contains(&generated.hash));
		}
	}

	mod verification {
		use super::*;

		#[test]
		fn issued_token_verifies_against_its_hash() {
			let (issuer, verifier) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			assert!(verifier.verify(generated.token.expose(), &generated.hash));
		}

		#[test]
		fn other_token_does_not_verify() {
			let (issuer, verifier) = pair();
			let a = issuer.generate(ApiKeyPrefix::Live);
			let b = issuer.generate(ApiKeyPrefix::Live);
			assert!(!verifier.verify(b.token.expose(), &a.hash));
		}

		#[test]
		fn wrong_length_hash_never_matches() {
			let (issuer, verifier) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			assert!(!verifier.verify(generated.token.expose(), &generated.hash[..63]));
			assert!(!verifier.verify(generated.token.expose(), ""));
		}

		#[test]
		fn revoked_key_fails_even_with_matching_hash() {
			let (issuer, verifier) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let mut record = record_for(&generated);
			let now = Utc::now();

			assert!(verifier.verify_record(generated.token.expose(), &record, now));
			record.revoked_at = Some(now);
			assert!(verifier.verify(generated.token.expose(), &record.hash));
			assert!(!verifier.verify_record(generated.token.expose(), &record, now));
		}

		#[test]
		fn expired_key_fails() {
			let (issuer, verifier) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let mut record = record_for(&generated);
			let now = Utc::now();
			record.expires_at = Some(now - Duration::seconds(1));
			assert!(!verifier.verify_record(generated.token.expose(), &record, now));
		}
	}

	mod modes {
		use super::*;

		#[test]
		fn root_and_derived_modes_hash_differently() {
			let token = "kx_live_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
			let derived = hasher(ApiKeyHmacMode::Derived).hash(token);
			let root = hasher(ApiKeyHmacMode::Root).hash(token);
			assert_ne!(derived, root);
		}

		#[test]
		fn root_mode_is_plain_hmac_with_root_key() {
			let token = "kx_live_legacy";
			let mut mac = HmacSha256::new_from_slice(&[5u8; KEY_SIZE]).unwrap();
			mac.update(token.as_bytes());
			let expected = hex::encode(mac.finalize().into_bytes());
			assert_eq!(hasher(ApiKeyHmacMode::Root).hash(token), expected);
		}

		#[test]
		fn hasher_debug_is_redacted() {
			let debug = format!("{:?}", hasher(ApiKeyHmacMode::Root));
			assert!(debug.contains(REDACTED));
		}
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(64))]

		#[test]
		fn verify_matches_only_exact_token(suffix in "[A-Za-z0-9_-]{1,8}") {
			let (issuer, verifier) = pair();
			let generated = issuer.generate(ApiKeyPrefix::Live);
			let token = generated.token.expose();
			prop_assert!(verifier.verify(token, &generated.hash));
			let altered = format!("{token}{suffix}");
			prop_assert!(!verifier.verify(&altered, &generated.hash));
		}
	}
}
