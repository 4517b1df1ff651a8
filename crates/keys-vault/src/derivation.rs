// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HKDF-SHA256 key derivation.
//!
//! Tenant keys are never stored or cached. They are recomputed for every
//! operation and dropped (zeroized) when it completes.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::encryption::KEY_SIZE;
use crate::error::{VaultError, VaultResult};
use crate::types::TenantId;

const TENANT_KEY_INFO: &[u8] = b"keys-vault-v1";
const MAC_KEY_INFO: &[u8] = b"keys-api-key-hmac-v1";

/// A derived 32-byte key, zeroized on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_SIZE]>;

/// Derive the encryption key for `tenant`.
///
/// `salt = SHA-256(tenant)`, `info = "keys-vault-v1"`.
pub fn derive_tenant_key(root: &[u8; KEY_SIZE], tenant: &TenantId) -> VaultResult<DerivedKey> {
	let salt = Sha256::digest(tenant.as_str().as_bytes());
	expand(Hkdf::<Sha256>::new(Some(salt.as_slice()), root), TENANT_KEY_INFO)
}

/// Derive the API key MAC subkey. No salt, `info = "keys-api-key-hmac-v1"`.
pub fn derive_mac_key(root: &[u8; KEY_SIZE]) -> VaultResult<DerivedKey> {
	expand(Hkdf::<Sha256>::new(None, root), MAC_KEY_INFO)
}

fn expand(hk: Hkdf<Sha256>, info: &[u8]) -> VaultResult<DerivedKey> {
	let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
	hk.expand(info, okm.as_mut())
		.map_err(|e| VaultError::Configuration(format!("HKDF expand failed: {e}")))?;
	Ok(okm)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn tenant(id: &str) -> TenantId {
		TenantId::new(id).unwrap()
	}

	#[test]
	fn derivation_is_deterministic() {
		let root = [7u8; KEY_SIZE];
		let a = derive_tenant_key(&root, &tenant("user123")).unwrap();
		let b = derive_tenant_key(&root, &tenant("user123")).unwrap();
		assert_eq!(*a, *b);
	}

	#[test]
	fn tenants_get_different_keys() {
		let root = [0u8; KEY_SIZE];
		let a = derive_tenant_key(&root, &tenant("user123")).unwrap();
		let b = derive_tenant_key(&root, &tenant("user456")).unwrap();
		assert_ne!(*a, *b);
	}

	#[test]
	fn root_change_changes_every_key() {
		let t = tenant("user123");
		let a = derive_tenant_key(&[0u8; KEY_SIZE], &t).unwrap();
		let b = derive_tenant_key(&[1u8; KEY_SIZE], &t).unwrap();
		assert_ne!(*a, *b);
	}

	#[test]
	fn mac_key_is_separated_from_tenant_keys() {
		let root = [9u8; KEY_SIZE];
		let mac = derive_mac_key(&root).unwrap();
		assert_ne!(*mac, root);
		let tenant_key = derive_tenant_key(&root, &tenant("user123")).unwrap();
		assert_ne!(*mac, *tenant_key);
		assert_eq!(*mac, *derive_mac_key(&root).unwrap());
	}

	#[test]
	fn derived_key_is_not_the_root() {
		let root = [0u8; KEY_SIZE];
		let key = derive_tenant_key(&root, &tenant("user123")).unwrap();
		assert_ne!(*key, root);
	}

	proptest! {
		#[test]
		fn distinct_tenants_never_collide(a in "[a-z0-9]{1,32}", b in "[a-z0-9]{1,32}") {
			prop_assume!(a != b);
			let root = [3u8; KEY_SIZE];
			let ka = derive_tenant_key(&root, &tenant(&a)).unwrap();
			let kb = derive_tenant_key(&root, &tenant(&b)).unwrap();
			prop_assert_ne!(*ka, *kb);
		}
	}
}
