// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keys_server_db::DbError;
use thiserror::Error;

/// Errors surfaced by the vault.
///
/// Messages never contain key material, plaintext, record ids or tenant ids.
#[derive(Debug, Error)]
pub enum VaultError {
	#[error("vault configuration error: {0}")]
	Configuration(String),

	#[error("decryption failed: data may be corrupted or tampered with")]
	Decryption,

	#[error("{0} not found")]
	NotFound(&'static str),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("validation error: {0}")]
	Validation(String),

	#[error("storage error: {0}")]
	Storage(DbError),

	#[error("corrupted data: {0}")]
	CorruptedData(String),
}

impl VaultError {
	/// True for failures the caller cannot fix by changing its request.
	pub fn is_internal(&self) -> bool {
		matches!(self, Self::Storage(_) | Self::CorruptedData(_))
	}
}

impl From<DbError> for VaultError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(message) => Self::Conflict(message),
			DbError::NotFound(_) => Self::NotFound("secret"),
			other => Self::Storage(other),
		}
	}
}

pub type VaultResult<T> = Result<T, VaultError>;
