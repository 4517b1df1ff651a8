// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the vault.
//!
//! - **ID newtypes**: type-safe wrappers around UUIDs for secrets, versions
//!   and API keys, plus the validated [`TenantId`] string
//! - **Status enums**: version and API key lifecycle states
//! - **Records**: what the stores hand back
//! - **Views**: metadata returned to callers (never ciphertext or plaintext)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keys_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_key::ApiKeyPrefix;
use crate::encryption::EncryptedEnvelope;
use crate::error::{VaultError, VaultResult};
use crate::validation::validate_tenant_id;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			pub fn into_inner(self) -> Uuid {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(SecretId, "Unique identifier for a secret.");
define_id_type!(
	SecretVersionId,
	"Unique identifier for a specific version of a secret."
);
define_id_type!(ApiKeyId, "Unique identifier for an API key.");

/// The tenant every record is scoped to. Opaque to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> VaultResult<Self> {
		let id = id.into();
		validate_tenant_id(&id)?;
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for TenantId {
	type Err = VaultError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

// =============================================================================
// Status Enums
// =============================================================================

/// `active → retired → purged`. Purge happens when the secret is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretVersionStatus {
	Active,
	Retired,
	Purged,
}

impl SecretVersionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Retired => "retired",
			Self::Purged => "purged",
		}
	}
}

impl fmt::Display for SecretVersionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SecretVersionStatus {
	type Err = VaultError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(Self::Active),
			"retired" => Ok(Self::Retired),
			"purged" => Ok(Self::Purged),
			other => Err(VaultError::CorruptedData(format!(
				"unknown secret version status: {other}"
			))),
		}
	}
}

/// Derived from `revoked_at` and `expires_at` at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
	Active,
	Revoked,
	Expired,
}

impl ApiKeyStatus {
	/// Revocation wins over expiry.
	pub fn at(
		revoked_at: Option<DateTime<Utc>>,
		expires_at: Option<DateTime<Utc>>,
		now: DateTime<Utc>,
	) -> Self {
		if revoked_at.is_some() {
			Self::Revoked
		} else if expires_at.is_some_and(|exp| exp <= now) {
			Self::Expired
		} else {
			Self::Active
		}
	}
}

impl fmt::Display for ApiKeyStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Active => f.write_str("active"),
			Self::Revoked => f.write_str("revoked"),
			Self::Expired => f.write_str("expired"),
		}
	}
}

// =============================================================================
// Records
// =============================================================================

/// A secret as stored, with aggregate version information.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretRecord {
	pub id: SecretId,
	pub owner_id: TenantId,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub version_count: u32,
	pub active_version: u32,
	/// When the active version was written.
	pub active_since: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A stored version. `envelope` is `None` once purged.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSecretVersion {
	pub id: SecretVersionId,
	pub secret_id: SecretId,
	pub version: u32,
	pub status: SecretVersionStatus,
	pub envelope: Option<EncryptedEnvelope>,
	pub created_at: DateTime<Utc>,
	pub retired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
	pub id: ApiKeyId,
	pub owner_id: TenantId,
	pub name: String,
	pub prefix: ApiKeyPrefix,
	/// HMAC-SHA256 of the full token, 64 lowercase hex characters.
	pub hash: String,
	pub scopes: Vec<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
	pub fn status(&self, now: DateTime<Utc>) -> ApiKeyStatus {
		ApiKeyStatus::at(self.revoked_at, self.expires_at, now)
	}
}

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
	pub id: SecretId,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub version_count: u32,
	pub active_version: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// `None` until the first rotation.
	pub last_rotated_at: Option<DateTime<Utc>>,
}

impl From<SecretRecord> for SecretMetadata {
	fn from(record: SecretRecord) -> Self {
		Self {
			id: record.id,
			name: record.name,
			kind: record.kind,
			description: record.description,
			version_count: record.version_count,
			active_version: record.active_version,
			created_at: record.created_at,
			updated_at: record.updated_at,
			last_rotated_at: (record.active_version > 1).then_some(record.active_since),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersionInfo {
	pub id: SecretVersionId,
	pub secret_id: SecretId,
	pub version: u32,
	pub status: SecretVersionStatus,
	pub key_version: Option<String>,
	pub created_at: DateTime<Utc>,
	pub retired_at: Option<DateTime<Utc>>,
}

impl From<&StoredSecretVersion> for SecretVersionInfo {
	fn from(stored: &StoredSecretVersion) -> Self {
		Self {
			id: stored.id,
			secret_id: stored.secret_id,
			version: stored.version,
			status: stored.status,
			key_version: stored.envelope.as_ref().map(|e| e.key_version().to_string()),
			created_at: stored.created_at,
			retired_at: stored.retired_at,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyMetadata {
	pub id: ApiKeyId,
	pub name: String,
	pub prefix: ApiKeyPrefix,
	pub scopes: Vec<String>,
	pub status: ApiKeyStatus,
	pub last_used_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	/// `prefix_abcd...wxyz` at issuance, `prefix_****` afterwards.
	pub partial_key: String,
}

impl ApiKeyMetadata {
	pub fn from_record(record: &ApiKeyRecord, now: DateTime<Utc>) -> Self {
		Self {
			id: record.id,
			name: record.name.clone(),
			prefix: record.prefix,
			scopes: record.scopes.clone(),
			status: record.status(now),
			last_used_at: record.last_used_at,
			expires_at: record.expires_at,
			created_at: record.created_at,
			partial_key: format!("{}_****", record.prefix),
		}
	}
}

/// Result of issuing a key. The token is shown once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
	pub token: SecretString,
	pub metadata: ApiKeyMetadata,
}

/// A token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedApiKey {
	pub api_key_id: ApiKeyId,
	pub owner_id: TenantId,
	pub scopes: Vec<String>,
}
