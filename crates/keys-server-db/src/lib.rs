// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # keys-server-db
//!
//! SQLite persistence for the keys vault via sqlx.
//!
//! Each table family has a `*Repository` holding a `SqlitePool`. Methods take
//! and return plain row structs with string ids and RFC 3339 timestamps; the
//! vault crate maps them to domain types.
//!
//! | Variant | When |
//! |---------|------|
//! | `NotFound` | A row that must exist for the operation does not |
//! | `Conflict` | Unique constraint violation, stale expected version, lost race |
//! | `Internal` | Invalid URL, broken invariant in stored data |
//!
//! Lookups return `Ok(None)` for missing rows, deletes return `Ok(false)`.

pub mod api_key;
pub mod error;
pub mod pool;
pub mod secrets;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api_key::{ApiKeyRepository, ApiKeyRow};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use secrets::{
	CreateSecretParams, NewVersionParams, RotateParams, SecretRow, SecretVersionRow,
	SecretsRepository, STATUS_ACTIVE, STATUS_PURGED, STATUS_RETIRED,
};
pub use sqlx::SqlitePool;
