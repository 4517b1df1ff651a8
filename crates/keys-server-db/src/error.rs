// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Unique or primary-key constraint violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Database(db_err) => {
			db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed")
		}
		_ => false,
	}
}

/// SQLITE_BUSY and its extended codes: another writer got there first.
pub(crate) fn is_busy(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Database(db_err) => db_err
			.code()
			.and_then(|code| code.parse::<i32>().ok())
			.is_some_and(|code| code & 0xff == 5),
		_ => false,
	}
}
