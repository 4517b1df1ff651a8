// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret lifecycle: create, rotate, read, list and delete.
//!
//! Every operation derives the caller's tenant key from the root secret,
//! uses it, and drops it before returning. Records owned by another tenant
//! behave exactly like records that do not exist.

use std::sync::Arc;

use chrono::Utc;
use keys_common_secret::{SecretBytes, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::derivation::derive_tenant_key;
use crate::encryption::{decrypt, encrypt, EncryptedEnvelope};
use crate::error::{VaultError, VaultResult};
use crate::root_key::RootKeyProvider;
use crate::store::{NewSecret, NewSecretVersion, SecretStore};
use crate::types::{
	SecretId, SecretMetadata, SecretRecord, SecretVersionId, SecretVersionInfo,
	StoredSecretVersion, TenantId,
};
use crate::validation::{
	validate_description, validate_kind, validate_plaintext, validate_secret_name,
};

/// Scheme for values that name a vault secret instead of carrying a value.
pub const SECRET_REF_SCHEME: &str = "secret://";

/// Input for [`SecretVault::create`].
#[derive(Debug, Clone)]
pub struct CreateSecretRequest {
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub plaintext: SecretBytes,
}

pub struct SecretVault<S> {
	store: Arc<S>,
	keys: Arc<RootKeyProvider>,
}

impl<S> Clone for SecretVault<S> {
	fn clone(&self) -> Self {
		Self {
			store: Arc::clone(&self.store),
			keys: Arc::clone(&self.keys),
		}
	}
}

impl<S: SecretStore> SecretVault<S> {
	pub fn new(store: Arc<S>, keys: Arc<RootKeyProvider>) -> Self {
		Self { store, keys }
	}

	fn seal(&self, owner: &TenantId, plaintext: &[u8]) -> VaultResult<EncryptedEnvelope> {
		let root = self.keys.current();
		let key = derive_tenant_key(root.bytes(), owner)?;
		encrypt(plaintext, &key, root.version())
	}

	fn open(&self, owner: &TenantId, version: &StoredSecretVersion) -> VaultResult<SecretBytes> {
		let envelope = version
			.envelope
			.as_ref()
			.ok_or(VaultError::NotFound("secret version"))?;

		let opened = self
			.keys
			.key_for_version(envelope.key_version())
			.ok_or(VaultError::Decryption)
			.and_then(|root| {
				let key = derive_tenant_key(root.bytes(), owner)?;
				decrypt(envelope, &key)
			});

		match opened {
			Ok(mut plaintext) => Ok(SecretBytes::new(std::mem::take(&mut *plaintext))),
			Err(e) => {
				warn!(
					secret_id = %version.secret_id,
					version = version.version,
					key_version = %envelope.key_version(),
					"Failed to decrypt secret version"
				);
				Err(e)
			}
		}
	}

	async fn require_secret(&self, owner: &TenantId, id: SecretId) -> VaultResult<SecretRecord> {
		self.store
			.get_secret(owner, id)
			.await?
			.ok_or(VaultError::NotFound("secret"))
	}

	/// Store a new secret as version 1.
	#[instrument(skip(self, request), fields(owner_id = %owner, name = %request.name))]
	pub async fn create(&self, owner: &TenantId, request: CreateSecretRequest) -> VaultResult<SecretMetadata> {
		validate_secret_name(&request.name)?;
		validate_kind(&request.kind)?;
		validate_description(request.description.as_deref())?;
		validate_plaintext(request.plaintext.expose())?;

		let envelope = self.seal(owner, request.plaintext.expose())?;
		let record = self
			.store
			.create_secret(NewSecret {
				id: SecretId::generate(),
				owner_id: owner.clone(),
				name: request.name,
				kind: request.kind,
				description: request.description,
				version_id: SecretVersionId::generate(),
				envelope,
				created_at: Utc::now(),
			})
			.await?;

		info!(secret_id = %record.id, "Created secret");
		Ok(record.into())
	}

	/// Write a new active version and retire the current one.
	#[instrument(skip(self, plaintext), fields(owner_id = %owner, secret_id = %id, expected_version = ?expected_version))]
	pub async fn rotate(
		&self,
		owner: &TenantId,
		id: SecretId,
		plaintext: &SecretBytes,
		expected_version: Option<u32>,
	) -> VaultResult<SecretVersionInfo> {
		validate_plaintext(plaintext.expose())?;

		let envelope = self.seal(owner, plaintext.expose())?;
		let stored = self
			.store
			.rotate_secret(NewSecretVersion {
				owner_id: owner.clone(),
				secret_id: id,
				expected_version,
				version_id: SecretVersionId::generate(),
				envelope,
				created_at: Utc::now(),
			})
			.await?;

		info!(secret_id = %id, version = stored.version, "Rotated secret");
		Ok(SecretVersionInfo::from(&stored))
	}

	#[instrument(skip(self), fields(owner_id = %owner, secret_id = %id))]
	pub async fn get_metadata(&self, owner: &TenantId, id: SecretId) -> VaultResult<SecretMetadata> {
		Ok(self.require_secret(owner, id).await?.into())
	}

	/// Decrypt the active version.
	#[instrument(skip(self), fields(owner_id = %owner, secret_id = %id))]
	pub async fn get_active_plaintext(&self, owner: &TenantId, id: SecretId) -> VaultResult<SecretBytes> {
		let version = self
			.store
			.get_active_version(owner, id)
			.await?
			.ok_or(VaultError::NotFound("secret"))?;

		debug!(version = version.version, "Decrypting active secret version");
		self.open(owner, &version)
	}

	#[instrument(skip(self), fields(owner_id = %owner, name = %name))]
	pub async fn get_active_plaintext_by_name(&self, owner: &TenantId, name: &str) -> VaultResult<SecretBytes> {
		validate_secret_name(name)?;
		let record = self
			.store
			.get_secret_by_name(owner, name)
			.await?
			.ok_or(VaultError::NotFound("secret"))?;

		self.get_active_plaintext(owner, record.id).await
	}

	/// Decrypt a specific version. Retired versions stay readable until the
	/// secret is deleted.
	#[instrument(skip(self), fields(owner_id = %owner, secret_id = %id, version = version))]
	pub async fn get_version_plaintext(
		&self,
		owner: &TenantId,
		id: SecretId,
		version: u32,
	) -> VaultResult<SecretBytes> {
		let stored = self
			.store
			.get_version(owner, id, version)
			.await?
			.ok_or(VaultError::NotFound("secret version"))?;

		self.open(owner, &stored)
	}

	/// Metadata for every live secret, ordered by name.
	#[instrument(skip(self), fields(owner_id = %owner))]
	pub async fn list_metadata(&self, owner: &TenantId) -> VaultResult<Vec<SecretMetadata>> {
		let records = self.store.list_secrets(owner).await?;
		debug!(count = records.len(), "Listed secrets");
		Ok(records.into_iter().map(SecretMetadata::from).collect())
	}

	#[instrument(skip(self), fields(owner_id = %owner, secret_id = %id))]
	pub async fn list_versions(&self, owner: &TenantId, id: SecretId) -> VaultResult<Vec<SecretVersionInfo>> {
		let versions = self.store.list_versions(owner, id).await?;
		if versions.is_empty() {
			return Err(VaultError::NotFound("secret"));
		}
		Ok(versions.iter().map(SecretVersionInfo::from).collect())
	}

	/// Tombstone the secret and erase the envelope of every version.
	#[instrument(skip(self), fields(owner_id = %owner, secret_id = %id))]
	pub async fn delete(&self, owner: &TenantId, id: SecretId) -> VaultResult<()> {
		if !self.store.purge_secret(owner, id, Utc::now()).await? {
			return Err(VaultError::NotFound("secret"));
		}

		info!(secret_id = %id, "Deleted secret");
		Ok(())
	}

	/// Resolve `secret://<name>` to the named secret's active value. Anything
	/// else is returned as is.
	#[instrument(skip(self, value), fields(owner_id = %owner))]
	pub async fn resolve_secret_ref(&self, owner: &TenantId, value: &str) -> VaultResult<SecretString> {
		let Some(name) = value.strip_prefix(SECRET_REF_SCHEME) else {
			return Ok(SecretString::new(value.to_string()));
		};
		if name.is_empty() {
			return Err(VaultError::Validation(
				"secret reference must name a secret".to_string(),
			));
		}

		let plaintext = self.get_active_plaintext_by_name(owner, name).await?;
		plaintext.to_secret_string().ok_or_else(|| {
			VaultError::Validation("referenced secret is not valid UTF-8".to_string())
		})
	}
}
