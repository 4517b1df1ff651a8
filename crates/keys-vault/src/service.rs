// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The vault's public face: secret operations plus API key issuance and
//! verification, wired to a pair of stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keys_common_secret::{SecretBytes, SecretString};
use keys_redact::partial_redact;
use keys_server_config::ApiKeyHmacMode;
use keys_server_db::SqlitePool;
use tracing::{debug, info, instrument, warn};

use crate::api_key::{parse_token, ApiKeyHasher, ApiKeyIssuer, ApiKeyPrefix, ApiKeyVerifier};
use crate::error::{VaultError, VaultResult};
use crate::root_key::RootKeyProvider;
use crate::store::{ApiKeyStore, SecretStore, SqliteApiKeyStore, SqliteSecretStore};
use crate::types::{
	ApiKeyId, ApiKeyMetadata, ApiKeyRecord, ApiKeyStatus, IssuedApiKey, SecretId, SecretMetadata,
	SecretVersionInfo, TenantId, VerifiedApiKey,
};
use crate::validation::{normalize_scopes, validate_api_key_name, validate_expiry};
use crate::vault::{CreateSecretRequest, SecretVault};

/// Input for [`VaultService::issue_api_key`].
#[derive(Debug, Clone, Default)]
pub struct IssueApiKeyRequest {
	pub name: String,
	pub prefix: ApiKeyPrefix,
	pub scopes: Vec<String>,
	pub expires_at: Option<DateTime<Utc>>,
}

/// Secrets and API keys for every tenant.
///
/// API keys are issued under the current root key. Verification also tries
/// each previous root key, so bumping `key_version` does not invalidate keys
/// issued before the bump as long as the old key stays in `previous_keys`.
pub struct VaultService<S, A> {
	secrets: SecretVault<S>,
	api_keys: Arc<A>,
	issuer: ApiKeyIssuer,
	/// Current root key first.
	verifiers: Vec<ApiKeyVerifier>,
}

impl VaultService<SqliteSecretStore, SqliteApiKeyStore> {
	/// Service backed by the SQLite stores sharing one pool.
	pub fn sqlite(pool: SqlitePool, keys: Arc<RootKeyProvider>, mode: ApiKeyHmacMode) -> VaultResult<Self> {
		Self::new(
			Arc::new(SqliteSecretStore::new(pool.clone())),
			Arc::new(SqliteApiKeyStore::new(pool)),
			keys,
			mode,
		)
	}
}

impl<S: SecretStore, A: ApiKeyStore> VaultService<S, A> {
	pub fn new(
		secret_store: Arc<S>,
		api_key_store: Arc<A>,
		keys: Arc<RootKeyProvider>,
		mode: ApiKeyHmacMode,
	) -> VaultResult<Self> {
		let hasher = Arc::new(ApiKeyHasher::new(keys.current(), mode)?);
		let mut verifiers = vec![ApiKeyVerifier::new(Arc::clone(&hasher))];
		for previous in keys.previous() {
			verifiers.push(ApiKeyVerifier::new(Arc::new(ApiKeyHasher::new(previous, mode)?)));
		}

		Ok(Self {
			secrets: SecretVault::new(secret_store, keys),
			api_keys: api_key_store,
			issuer: ApiKeyIssuer::new(hasher),
			verifiers,
		})
	}

	// =========================================================================
	// Secrets
	// =========================================================================

	pub async fn create_secret(&self, owner: &TenantId, request: CreateSecretRequest) -> VaultResult<SecretMetadata> {
		self.secrets.create(owner, request).await
	}

	pub async fn rotate_secret(
		&self,
		owner: &TenantId,
		id: SecretId,
		plaintext: &SecretBytes,
		expected_version: Option<u32>,
	) -> VaultResult<SecretVersionInfo> {
		self.secrets.rotate(owner, id, plaintext, expected_version).await
	}

	pub async fn get_secret(&self, owner: &TenantId, id: SecretId) -> VaultResult<SecretMetadata> {
		self.secrets.get_metadata(owner, id).await
	}

	pub async fn get_active_plaintext(&self, owner: &TenantId, id: SecretId) -> VaultResult<SecretBytes> {
		self.secrets.get_active_plaintext(owner, id).await
	}

	pub async fn get_active_plaintext_by_name(&self, owner: &TenantId, name: &str) -> VaultResult<SecretBytes> {
		self.secrets.get_active_plaintext_by_name(owner, name).await
	}

	pub async fn get_version_plaintext(
		&self,
		owner: &TenantId,
		id: SecretId,
		version: u32,
	) -> VaultResult<SecretBytes> {
		self.secrets.get_version_plaintext(owner, id, version).await
	}

	pub async fn list_secrets(&self, owner: &TenantId) -> VaultResult<Vec<SecretMetadata>> {
		self.secrets.list_metadata(owner).await
	}

	pub async fn list_secret_versions(&self, owner: &TenantId, id: SecretId) -> VaultResult<Vec<SecretVersionInfo>> {
		self.secrets.list_versions(owner, id).await
	}

	pub async fn delete_secret(&self, owner: &TenantId, id: SecretId) -> VaultResult<()> {
		self.secrets.delete(owner, id).await
	}

	pub async fn resolve_secret_ref(&self, owner: &TenantId, value: &str) -> VaultResult<SecretString> {
		self.secrets.resolve_secret_ref(owner, value).await
	}

	// =========================================================================
	// API keys
	// =========================================================================

	/// Mint a key. The returned token is the only copy; only its hash is
	/// stored.
	#[instrument(skip(self, request), fields(owner_id = %owner, name = %request.name, prefix = %request.prefix))]
	pub async fn issue_api_key(&self, owner: &TenantId, request: IssueApiKeyRequest) -> VaultResult<IssuedApiKey> {
		let now = Utc::now();
		validate_api_key_name(&request.name)?;
		validate_expiry(request.expires_at, now)?;
		let scopes = normalize_scopes(&request.scopes)?;

		let generated = self.issuer.generate(request.prefix);
		let record = ApiKeyRecord {
			id: ApiKeyId::generate(),
			owner_id: owner.clone(),
			name: request.name,
			prefix: request.prefix,
			hash: generated.hash,
			scopes,
			expires_at: request.expires_at,
			revoked_at: None,
			last_used_at: None,
			created_at: now,
		};
		self.api_keys.create_api_key(&record).await?;

		info!(api_key_id = %record.id, "Issued API key");

		let mut metadata = ApiKeyMetadata::from_record(&record, now);
		metadata.partial_key = generated.partial_key;
		Ok(IssuedApiKey {
			token: generated.token,
			metadata,
		})
	}

	/// Authenticate a presented token. Every authentication failure is
	/// `Ok(None)`; only storage problems are errors.
	pub async fn verify_api_key(&self, token: &str) -> VaultResult<Option<VerifiedApiKey>> {
		self.verify_at(token, Utc::now()).await
	}

	#[instrument(skip(self, token))]
	async fn verify_at(&self, token: &str, now: DateTime<Utc>) -> VaultResult<Option<VerifiedApiKey>> {
		if parse_token(token).is_none() {
			debug!("Rejected malformed API key");
			return Ok(None);
		}

		let mut found = None;
		for verifier in &self.verifiers {
			if let Some(record) = self.api_keys.find_by_hash(&verifier.hash(token)).await? {
				found = Some((verifier, record));
				break;
			}
		}
		let Some((verifier, record)) = found else {
			debug!("Rejected unknown API key");
			return Ok(None);
		};

		let key_ref = partial_redact(&record.id.to_string(), 4);
		if !verifier.verify(token, &record.hash) {
			debug!(api_key = %key_ref, "Rejected API key with mismatched hash");
			return Ok(None);
		}

		match record.status(now) {
			ApiKeyStatus::Active => {}
			status => {
				debug!(api_key = %key_ref, %status, "Rejected inactive API key");
				return Ok(None);
			}
		}

		if let Err(e) = self.api_keys.record_use(record.id, now).await {
			warn!(api_key = %key_ref, "Failed to record API key use: {e}");
		}

		Ok(Some(VerifiedApiKey {
			api_key_id: record.id,
			owner_id: record.owner_id,
			scopes: record.scopes,
		}))
	}

	/// Revoking an already revoked key succeeds.
	#[instrument(skip(self), fields(owner_id = %owner, api_key_id = %id))]
	pub async fn revoke_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<()> {
		if !self.api_keys.revoke_api_key(owner, id, Utc::now()).await? {
			return Err(VaultError::NotFound("api key"));
		}
		info!("Revoked API key");
		Ok(())
	}

	#[instrument(skip(self), fields(owner_id = %owner))]
	pub async fn list_api_keys(&self, owner: &TenantId) -> VaultResult<Vec<ApiKeyMetadata>> {
		let now = Utc::now();
		let records = self.api_keys.list_api_keys(owner).await?;
		Ok(records
			.iter()
			.map(|record| ApiKeyMetadata::from_record(record, now))
			.collect())
	}

	#[instrument(skip(self), fields(owner_id = %owner, api_key_id = %id))]
	pub async fn get_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<ApiKeyMetadata> {
		let record = self
			.api_keys
			.get_api_key(owner, id)
			.await?
			.ok_or(VaultError::NotFound("api key"))?;
		Ok(ApiKeyMetadata::from_record(&record, Utc::now()))
	}

	#[instrument(skip(self), fields(owner_id = %owner, api_key_id = %id))]
	pub async fn delete_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<()> {
		if !self.api_keys.delete_api_key(owner, id).await? {
			return Err(VaultError::NotFound("api key"));
		}
		info!("Deleted API key");
		Ok(())
	}
}
