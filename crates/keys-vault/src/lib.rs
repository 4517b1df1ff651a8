// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keys Vault
//!
//! Multi-tenant secret storage and API key authority:
//!
//! - **Secret Storage**: AES-256-GCM at rest under per-tenant keys derived
//!   from a single root secret with HKDF-SHA256
//! - **Versioning**: rotation retires the active version and writes the next
//!   one atomically; exactly one version is active per secret
//! - **API Keys**: `kx_live_`/`kx_test_` tokens stored only as HMAC-SHA256
//!   hashes and verified in constant time
//!
//! # Security Design
//!
//! - Plaintext and tokens travel as [`SecretString`]/[`SecretBytes`] so they
//!   never reach logs
//! - Derived keys are zeroized when dropped and never stored
//! - Envelopes record the root key version that sealed them, so older root
//!   keys can be kept for reading while new writes use the current one
//! - A record owned by another tenant is indistinguishable from a missing one
//!
//! [`SecretString`]: keys_common_secret::SecretString
//! [`SecretBytes`]: keys_common_secret::SecretBytes

pub mod api_key;
pub mod derivation;
pub mod encryption;
pub mod error;
pub mod root_key;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;
pub mod vault;

pub use api_key::{parse_token, ApiKeyHasher, ApiKeyIssuer, ApiKeyPrefix, ApiKeyVerifier, GeneratedApiKey};
pub use derivation::{derive_mac_key, derive_tenant_key, DerivedKey};
pub use encryption::{decrypt, encrypt, EncodedEnvelope, EncryptedEnvelope, IV_SIZE, KEY_SIZE, TAG_SIZE};
pub use error::{VaultError, VaultResult};
pub use root_key::{generate_root_key, RootKey, RootKeyProvider};
pub use service::{IssueApiKeyRequest, VaultService};
pub use store::{ApiKeyStore, NewSecret, NewSecretVersion, SecretStore, SqliteApiKeyStore, SqliteSecretStore};
pub use types::{
	ApiKeyId, ApiKeyMetadata, ApiKeyRecord, ApiKeyStatus, IssuedApiKey, SecretId, SecretMetadata,
	SecretRecord, SecretVersionId, SecretVersionInfo, SecretVersionStatus, StoredSecretVersion, TenantId,
	VerifiedApiKey,
};
pub use vault::{CreateSecretRequest, SecretVault, SECRET_REF_SCHEME};
