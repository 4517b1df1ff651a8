// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage seams for the vault, with SQLite adapters.
//!
//! The vault only talks to [`SecretStore`] and [`ApiKeyStore`]. Envelopes
//! cross this boundary already sealed; stores never see plaintext or keys.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use keys_server_db::{
	ApiKeyRepository, ApiKeyRow, CreateSecretParams, NewVersionParams, RotateParams, SecretRow,
	SecretVersionRow, SecretsRepository, SqlitePool,
};
use tracing::instrument;

use crate::api_key::ApiKeyPrefix;
use crate::encryption::EncryptedEnvelope;
use crate::error::{VaultError, VaultResult};
use crate::types::{
	ApiKeyId, ApiKeyRecord, SecretId, SecretRecord, SecretVersionId, SecretVersionStatus,
	StoredSecretVersion, TenantId,
};

/// A secret and its sealed first version.
#[derive(Debug, Clone)]
pub struct NewSecret {
	pub id: SecretId,
	pub owner_id: TenantId,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub version_id: SecretVersionId,
	pub envelope: EncryptedEnvelope,
	pub created_at: DateTime<Utc>,
}

/// A sealed successor version for an existing secret.
#[derive(Debug, Clone)]
pub struct NewSecretVersion {
	pub owner_id: TenantId,
	pub secret_id: SecretId,
	pub expected_version: Option<u32>,
	pub version_id: SecretVersionId,
	pub envelope: EncryptedEnvelope,
	pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
	/// Insert the secret and version 1 atomically. `Conflict` on a duplicate
	/// live name.
	async fn create_secret(&self, secret: NewSecret) -> VaultResult<SecretRecord>;

	/// Retire the active version and insert the next one atomically.
	/// `NotFound` if the secret is absent for the owner, `Conflict` if the
	/// expected version is stale or a concurrent rotation won.
	async fn rotate_secret(&self, version: NewSecretVersion) -> VaultResult<StoredSecretVersion>;

	async fn get_secret(&self, owner: &TenantId, id: SecretId) -> VaultResult<Option<SecretRecord>>;

	async fn get_secret_by_name(&self, owner: &TenantId, name: &str) -> VaultResult<Option<SecretRecord>>;

	/// Live secrets ordered by name.
	async fn list_secrets(&self, owner: &TenantId) -> VaultResult<Vec<SecretRecord>>;

	async fn get_active_version(
		&self,
		owner: &TenantId,
		id: SecretId,
	) -> VaultResult<Option<StoredSecretVersion>>;

	async fn get_version(
		&self,
		owner: &TenantId,
		id: SecretId,
		version: u32,
	) -> VaultResult<Option<StoredSecretVersion>>;

	/// Oldest first.
	async fn list_versions(&self, owner: &TenantId, id: SecretId) -> VaultResult<Vec<StoredSecretVersion>>;

	/// Tombstone the secret and erase every version's envelope. `false` if
	/// there was nothing to delete.
	async fn purge_secret(&self, owner: &TenantId, id: SecretId, at: DateTime<Utc>) -> VaultResult<bool>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	/// `Conflict` if the hash already exists.
	async fn create_api_key(&self, record: &ApiKeyRecord) -> VaultResult<()>;

	async fn get_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<Option<ApiKeyRecord>>;

	async fn find_by_hash(&self, hash: &str) -> VaultResult<Option<ApiKeyRecord>>;

	/// Newest first.
	async fn list_api_keys(&self, owner: &TenantId) -> VaultResult<Vec<ApiKeyRecord>>;

	/// Idempotent. `false` if the key does not exist for the owner.
	async fn revoke_api_key(&self, owner: &TenantId, id: ApiKeyId, at: DateTime<Utc>) -> VaultResult<bool>;

	async fn delete_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<bool>;

	async fn record_use(&self, id: ApiKeyId, at: DateTime<Utc>) -> VaultResult<()>;
}

// =============================================================================
// Row conversion
// =============================================================================

/// RFC 3339 with fixed microsecond precision so text ordering matches time
/// ordering.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> VaultResult<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| VaultError::CorruptedData(format!("invalid timestamp: {e}")))
}

fn parse_optional_timestamp(value: Option<&str>) -> VaultResult<Option<DateTime<Utc>>> {
	value.map(parse_timestamp).transpose()
}

fn parse_id<T: std::str::FromStr<Err = uuid::Error>>(value: &str) -> VaultResult<T> {
	value
		.parse()
		.map_err(|e| VaultError::CorruptedData(format!("invalid id: {e}")))
}

fn parse_count(value: i64, what: &str) -> VaultResult<u32> {
	u32::try_from(value).map_err(|_| VaultError::CorruptedData(format!("{what} out of range")))
}

fn secret_from_row(row: SecretRow) -> VaultResult<SecretRecord> {
	let active_version = row
		.active_version
		.ok_or_else(|| VaultError::CorruptedData("secret has no active version".to_string()))?;
	let active_since = row
		.active_since
		.as_deref()
		.ok_or_else(|| VaultError::CorruptedData("secret has no active version".to_string()))?;

	Ok(SecretRecord {
		id: parse_id(&row.id)?,
		owner_id: TenantId::new(row.owner_id)
			.map_err(|_| VaultError::CorruptedData("invalid owner id".to_string()))?,
		name: row.name,
		kind: row.kind,
		description: row.description,
		version_count: parse_count(row.version_count, "version count")?,
		active_version: parse_count(active_version, "version")?,
		active_since: parse_timestamp(active_since)?,
		created_at: parse_timestamp(&row.created_at)?,
		updated_at: parse_timestamp(&row.updated_at)?,
	})
}

fn version_from_row(row: SecretVersionRow) -> VaultResult<StoredSecretVersion> {
	let status: SecretVersionStatus = row.status.parse()?;

	let envelope = match (status, row.ciphertext, row.iv, row.tag) {
		(SecretVersionStatus::Purged, ..) => None,
		(_, Some(ciphertext), Some(iv), Some(tag)) => Some(EncryptedEnvelope::from_parts(
			&ciphertext,
			&iv,
			&tag,
			row.key_version,
		)?),
		_ => {
			return Err(VaultError::CorruptedData(
				"unpurged secret version is missing its envelope".to_string(),
			))
		}
	};

	Ok(StoredSecretVersion {
		id: parse_id(&row.id)?,
		secret_id: parse_id(&row.secret_id)?,
		version: parse_count(row.version, "version")?,
		status,
		envelope,
		created_at: parse_timestamp(&row.created_at)?,
		retired_at: parse_optional_timestamp(row.retired_at.as_deref())?,
	})
}

fn api_key_from_row(row: ApiKeyRow) -> VaultResult<ApiKeyRecord> {
	let prefix: ApiKeyPrefix = row
		.prefix
		.parse()
		.map_err(|_| VaultError::CorruptedData("unknown api key prefix".to_string()))?;

	Ok(ApiKeyRecord {
		id: parse_id(&row.id)?,
		owner_id: TenantId::new(row.owner_id)
			.map_err(|_| VaultError::CorruptedData("invalid owner id".to_string()))?,
		name: row.name,
		prefix,
		hash: row.key_hash,
		scopes: row.scopes,
		expires_at: parse_optional_timestamp(row.expires_at.as_deref())?,
		revoked_at: parse_optional_timestamp(row.revoked_at.as_deref())?,
		last_used_at: parse_optional_timestamp(row.last_used_at.as_deref())?,
		created_at: parse_timestamp(&row.created_at)?,
	})
}

fn api_key_to_row(record: &ApiKeyRecord) -> ApiKeyRow {
	ApiKeyRow {
		id: record.id.to_string(),
		owner_id: record.owner_id.as_str().to_string(),
		name: record.name.clone(),
		prefix: record.prefix.as_str().to_string(),
		key_hash: record.hash.clone(),
		scopes: record.scopes.clone(),
		expires_at: record.expires_at.map(format_timestamp),
		revoked_at: record.revoked_at.map(format_timestamp),
		last_used_at: record.last_used_at.map(format_timestamp),
		created_at: format_timestamp(record.created_at),
	}
}

fn version_params(id: SecretVersionId, envelope: &EncryptedEnvelope, created_at: &str) -> NewVersionParams {
	let encoded = envelope.encode();
	NewVersionParams {
		id: id.to_string(),
		ciphertext: encoded.ciphertext,
		iv: encoded.iv,
		tag: encoded.tag,
		key_version: encoded.key_version,
		created_at: created_at.to_string(),
	}
}

// =============================================================================
// SQLite adapters
// =============================================================================

/// [`SecretStore`] over [`SecretsRepository`].
#[derive(Clone)]
pub struct SqliteSecretStore {
	repo: SecretsRepository,
}

impl SqliteSecretStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			repo: SecretsRepository::new(pool),
		}
	}
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
	#[instrument(skip(self, secret), fields(secret_id = %secret.id))]
	async fn create_secret(&self, secret: NewSecret) -> VaultResult<SecretRecord> {
		let created_at = format_timestamp(secret.created_at);
		let params = CreateSecretParams {
			id: secret.id.to_string(),
			owner_id: secret.owner_id.as_str().to_string(),
			name: secret.name.clone(),
			kind: secret.kind.clone(),
			description: secret.description.clone(),
			created_at: created_at.clone(),
		};
		let version = version_params(secret.version_id, &secret.envelope, &created_at);

		self.repo.create_secret(&params, &version).await?;

		Ok(SecretRecord {
			id: secret.id,
			owner_id: secret.owner_id,
			name: secret.name,
			kind: secret.kind,
			description: secret.description,
			version_count: 1,
			active_version: 1,
			active_since: secret.created_at,
			created_at: secret.created_at,
			updated_at: secret.created_at,
		})
	}

	#[instrument(skip(self, version), fields(secret_id = %version.secret_id))]
	async fn rotate_secret(&self, version: NewSecretVersion) -> VaultResult<StoredSecretVersion> {
		let created_at = format_timestamp(version.created_at);
		let params = RotateParams {
			owner_id: version.owner_id.as_str().to_string(),
			secret_id: version.secret_id.to_string(),
			expected_version: version.expected_version.map(i64::from),
			version: version_params(version.version_id, &version.envelope, &created_at),
		};

		let row = self.repo.rotate_secret(&params).await?;
		version_from_row(row)
	}

	async fn get_secret(&self, owner: &TenantId, id: SecretId) -> VaultResult<Option<SecretRecord>> {
		self.repo
			.get_secret(owner.as_str(), &id.to_string())
			.await?
			.map(secret_from_row)
			.transpose()
	}

	async fn get_secret_by_name(&self, owner: &TenantId, name: &str) -> VaultResult<Option<SecretRecord>> {
		self.repo
			.get_secret_by_name(owner.as_str(), name)
			.await?
			.map(secret_from_row)
			.transpose()
	}

	async fn list_secrets(&self, owner: &TenantId) -> VaultResult<Vec<SecretRecord>> {
		self.repo
			.list_secrets(owner.as_str())
			.await?
			.into_iter()
			.map(secret_from_row)
			.collect()
	}

	async fn get_active_version(
		&self,
		owner: &TenantId,
		id: SecretId,
	) -> VaultResult<Option<StoredSecretVersion>> {
		self.repo
			.get_active_version(owner.as_str(), &id.to_string())
			.await?
			.map(version_from_row)
			.transpose()
	}

	async fn get_version(
		&self,
		owner: &TenantId,
		id: SecretId,
		version: u32,
	) -> VaultResult<Option<StoredSecretVersion>> {
		self.repo
			.get_version(owner.as_str(), &id.to_string(), i64::from(version))
			.await?
			.map(version_from_row)
			.transpose()
	}

	async fn list_versions(&self, owner: &TenantId, id: SecretId) -> VaultResult<Vec<StoredSecretVersion>> {
		self.repo
			.list_versions(owner.as_str(), &id.to_string())
			.await?
			.into_iter()
			.map(version_from_row)
			.collect()
	}

	async fn purge_secret(&self, owner: &TenantId, id: SecretId, at: DateTime<Utc>) -> VaultResult<bool> {
		Ok(self
			.repo
			.purge_secret(owner.as_str(), &id.to_string(), &format_timestamp(at))
			.await?)
	}
}

/// [`ApiKeyStore`] over [`ApiKeyRepository`].
#[derive(Clone)]
pub struct SqliteApiKeyStore {
	repo: ApiKeyRepository,
}

impl SqliteApiKeyStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			repo: ApiKeyRepository::new(pool),
		}
	}
}

#[async_trait]
impl ApiKeyStore for SqliteApiKeyStore {
	#[instrument(skip(self, record), fields(api_key_id = %record.id))]
	async fn create_api_key(&self, record: &ApiKeyRecord) -> VaultResult<()> {
		Ok(self.repo.create_api_key(&api_key_to_row(record)).await?)
	}

	async fn get_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<Option<ApiKeyRecord>> {
		self.repo
			.get_api_key(owner.as_str(), &id.to_string())
			.await?
			.map(api_key_from_row)
			.transpose()
	}

	async fn find_by_hash(&self, hash: &str) -> VaultResult<Option<ApiKeyRecord>> {
		self.repo
			.get_api_key_by_hash(hash)
			.await?
			.map(api_key_from_row)
			.transpose()
	}

	async fn list_api_keys(&self, owner: &TenantId) -> VaultResult<Vec<ApiKeyRecord>> {
		self.repo
			.list_api_keys(owner.as_str())
			.await?
			.into_iter()
			.map(api_key_from_row)
			.collect()
	}

	async fn revoke_api_key(&self, owner: &TenantId, id: ApiKeyId, at: DateTime<Utc>) -> VaultResult<bool> {
		Ok(self
			.repo
			.revoke_api_key(owner.as_str(), &id.to_string(), &format_timestamp(at))
			.await?)
	}

	async fn delete_api_key(&self, owner: &TenantId, id: ApiKeyId) -> VaultResult<bool> {
		Ok(self.repo.delete_api_key(owner.as_str(), &id.to_string()).await?)
	}

	async fn record_use(&self, id: ApiKeyId, at: DateTime<Utc>) -> VaultResult<()> {
		Ok(self
			.repo
			.update_last_used(&id.to_string(), &format_timestamp(at))
			.await?)
	}
}
