// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets repository.
//!
//! A secret is a metadata row in `secrets` plus one or more encrypted rows in
//! `secret_versions`. Exactly one version per live secret is `active`; the
//! partial unique index `idx_secret_versions_single_active` backs that up
//! even if two rotations race. Envelope fields are stored as base64 text and
//! are `NULL` once a version is purged.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::{is_busy, is_unique_violation, DbError, Result};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_RETIRED: &str = "retired";
pub const STATUS_PURGED: &str = "purged";

/// Secret metadata with aggregate version information.
#[derive(Debug, Clone)]
pub struct SecretRow {
	pub id: String,
	pub owner_id: String,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub created_at: String,
	pub updated_at: String,
	pub version_count: i64,
	pub active_version: Option<i64>,
	/// `created_at` of the active version.
	pub active_since: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecretVersionRow {
	pub id: String,
	pub secret_id: String,
	pub version: i64,
	pub status: String,
	pub ciphertext: Option<String>,
	pub iv: Option<String>,
	pub tag: Option<String>,
	pub key_version: String,
	pub created_at: String,
	pub retired_at: Option<String>,
}

/// Parameters for creating a secret.
#[derive(Debug, Clone)]
pub struct CreateSecretParams {
	pub id: String,
	pub owner_id: String,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub created_at: String,
}

/// Encrypted payload for a new version. The version number is assigned by
/// the repository.
#[derive(Debug, Clone)]
pub struct NewVersionParams {
	pub id: String,
	pub ciphertext: String,
	pub iv: String,
	pub tag: String,
	pub key_version: String,
	pub created_at: String,
}

/// Parameters for rotating a secret to a new version.
#[derive(Debug, Clone)]
pub struct RotateParams {
	pub owner_id: String,
	pub secret_id: String,
	/// When set, the rotation only proceeds if this is still the active
	/// version number.
	pub expected_version: Option<i64>,
	pub version: NewVersionParams,
}

const SECRET_COLUMNS: &str = r#"
	s.id, s.owner_id, s.name, s.kind, s.description, s.created_at, s.updated_at,
	(SELECT COUNT(*) FROM secret_versions v WHERE v.secret_id = s.id) AS version_count,
	(SELECT v.version FROM secret_versions v WHERE v.secret_id = s.id AND v.status = 'active') AS active_version,
	(SELECT v.created_at FROM secret_versions v WHERE v.secret_id = s.id AND v.status = 'active') AS active_since
"#;

const VERSION_COLUMNS: &str = r#"
	v.id, v.secret_id, v.version, v.status, v.ciphertext, v.iv, v.tag, v.key_version,
	v.created_at, v.retired_at
"#;

/// Repository for secret and secret version rows.
#[derive(Clone)]
pub struct SecretsRepository {
	pool: SqlitePool,
}

impl SecretsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a secret together with its first (active) version in one
	/// transaction.
	///
	/// Returns `Err(DbError::Conflict)` if the owner already has a live secret
	/// with the same name.
	#[tracing::instrument(skip(self, secret, version), fields(secret_id = %secret.id, owner_id = %secret.owner_id))]
	pub async fn create_secret(
		&self,
		secret: &CreateSecretParams,
		version: &NewVersionParams,
	) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let inserted = sqlx::query(
			r#"
			INSERT INTO secrets (id, owner_id, name, kind, description, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&secret.id)
		.bind(&secret.owner_id)
		.bind(&secret.name)
		.bind(&secret.kind)
		.bind(&secret.description)
		.bind(&secret.created_at)
		.bind(&secret.created_at)
		.execute(&mut *tx)
		.await;

		match inserted {
			Ok(_) => {}
			Err(e) if is_unique_violation(&e) => {
				return Err(DbError::Conflict(format!(
					"secret already exists: {}",
					secret.name
				)))
			}
			Err(e) => return Err(DbError::Sqlx(e)),
		}

		insert_version(&mut tx, &secret.id, 1, version).await?;
		tx.commit().await?;

		tracing::debug!(secret_id = %secret.id, "secret created");
		Ok(())
	}

	/// Retire the active version and insert its successor, atomically.
	///
	/// Returns the new version row. `NotFound` if the secret does not exist
	/// for this owner, `Conflict` if `expected_version` is stale or another
	/// rotation won the race.
	#[tracing::instrument(skip(self, params), fields(secret_id = %params.secret_id, expected_version = ?params.expected_version))]
	pub async fn rotate_secret(&self, params: &RotateParams) -> Result<SecretVersionRow> {
		self.rotate_in_tx(params).await.map_err(|e| match e {
			DbError::Sqlx(ref inner) if is_busy(inner) || is_unique_violation(inner) => {
				DbError::Conflict("secret was modified concurrently".to_string())
			}
			other => other,
		})
	}

	async fn rotate_in_tx(&self, params: &RotateParams) -> Result<SecretVersionRow> {
		let mut tx = self.pool.begin().await?;

		let exists: Option<String> = sqlx::query_scalar(
			"SELECT id FROM secrets WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
		)
		.bind(&params.secret_id)
		.bind(&params.owner_id)
		.fetch_optional(&mut *tx)
		.await?;
		if exists.is_none() {
			return Err(DbError::NotFound(format!("secret {}", params.secret_id)));
		}

		let current: Option<i64> = sqlx::query_scalar(
			"SELECT version FROM secret_versions WHERE secret_id = ? AND status = 'active'",
		)
		.bind(&params.secret_id)
		.fetch_optional(&mut *tx)
		.await?;
		let current =
			current.ok_or_else(|| DbError::Internal("secret has no active version".to_string()))?;

		if let Some(expected) = params.expected_version {
			if expected != current {
				return Err(DbError::Conflict(format!(
					"expected active version {expected}, found {current}"
				)));
			}
		}

		let retired = sqlx::query(
			r#"
			UPDATE secret_versions
			SET status = 'retired', retired_at = ?
			WHERE secret_id = ? AND version = ? AND status = 'active'
			"#,
		)
		.bind(&params.version.created_at)
		.bind(&params.secret_id)
		.bind(current)
		.execute(&mut *tx)
		.await?;
		if retired.rows_affected() != 1 {
			return Err(DbError::Conflict(
				"active version changed during rotation".to_string(),
			));
		}

		let next = current + 1;
		insert_version(&mut tx, &params.secret_id, next, &params.version).await?;

		sqlx::query("UPDATE secrets SET updated_at = ? WHERE id = ?")
			.bind(&params.version.created_at)
			.bind(&params.secret_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::debug!(secret_id = %params.secret_id, version = next, "secret rotated");
		Ok(SecretVersionRow {
			id: params.version.id.clone(),
			secret_id: params.secret_id.clone(),
			version: next,
			status: STATUS_ACTIVE.to_string(),
			ciphertext: Some(params.version.ciphertext.clone()),
			iv: Some(params.version.iv.clone()),
			tag: Some(params.version.tag.clone()),
			key_version: params.version.key_version.clone(),
			created_at: params.version.created_at.clone(),
			retired_at: None,
		})
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %id))]
	pub async fn get_secret(&self, owner_id: &str, id: &str) -> Result<Option<SecretRow>> {
		let sql = format!(
			"SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.id = ? AND s.owner_id = ? AND s.deleted_at IS NULL"
		);
		let row = sqlx::query(&sql)
			.bind(id)
			.bind(owner_id)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_secret_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, name = %name))]
	pub async fn get_secret_by_name(&self, owner_id: &str, name: &str) -> Result<Option<SecretRow>> {
		let sql = format!(
			"SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.owner_id = ? AND s.name = ? AND s.deleted_at IS NULL"
		);
		let row = sqlx::query(&sql)
			.bind(owner_id)
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_secret_row).transpose()
	}

	/// Live secrets for an owner, ordered by name.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id))]
	pub async fn list_secrets(&self, owner_id: &str) -> Result<Vec<SecretRow>> {
		let sql = format!(
			"SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.owner_id = ? AND s.deleted_at IS NULL ORDER BY s.name"
		);
		let rows = sqlx::query(&sql).bind(owner_id).fetch_all(&self.pool).await?;

		rows.iter().map(parse_secret_row).collect()
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id))]
	pub async fn get_active_version(
		&self,
		owner_id: &str,
		secret_id: &str,
	) -> Result<Option<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE v.secret_id = ? AND s.owner_id = ? AND s.deleted_at IS NULL AND v.status = 'active'
			"#
		);
		let row = sqlx::query(&sql)
			.bind(secret_id)
			.bind(owner_id)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_version_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id, version = version))]
	pub async fn get_version(
		&self,
		owner_id: &str,
		secret_id: &str,
		version: i64,
	) -> Result<Option<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE v.secret_id = ? AND s.owner_id = ? AND s.deleted_at IS NULL AND v.version = ?
			"#
		);
		let row = sqlx::query(&sql)
			.bind(secret_id)
			.bind(owner_id)
			.bind(version)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_version_row).transpose()
	}

	/// All versions of a live secret, oldest first.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id))]
	pub async fn list_versions(
		&self,
		owner_id: &str,
		secret_id: &str,
	) -> Result<Vec<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE v.secret_id = ? AND s.owner_id = ? AND s.deleted_at IS NULL
			ORDER BY v.version
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(secret_id)
			.bind(owner_id)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(parse_version_row).collect()
	}

	/// Tombstone a secret and destroy the encrypted material of every
	/// version. Returns `false` if there was no live secret to delete.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id))]
	pub async fn purge_secret(&self, owner_id: &str, secret_id: &str, purged_at: &str) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		let deleted = sqlx::query(
			"UPDATE secrets SET deleted_at = ?, updated_at = ? WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
		)
		.bind(purged_at)
		.bind(purged_at)
		.bind(secret_id)
		.bind(owner_id)
		.execute(&mut *tx)
		.await?;

		if deleted.rows_affected() == 0 {
			return Ok(false);
		}

		let purged = sqlx::query(
			r#"
			UPDATE secret_versions
			SET status = 'purged', ciphertext = NULL, iv = NULL, tag = NULL, purged_at = ?
			WHERE secret_id = ?
			"#,
		)
		.bind(purged_at)
		.bind(secret_id)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		tracing::debug!(secret_id = %secret_id, versions = purged.rows_affected(), "secret purged");
		Ok(true)
	}
}

async fn insert_version(
	tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
	secret_id: &str,
	version: i64,
	params: &NewVersionParams,
) -> Result<()> {
	sqlx::query(
		r#"
		INSERT INTO secret_versions (id, secret_id, version, status, ciphertext, iv, tag, key_version, created_at)
		VALUES (?, ?, ?, 'active', ?, ?, ?, ?, ?)
		"#,
	)
	.bind(&params.id)
	.bind(secret_id)
	.bind(version)
	.bind(&params.ciphertext)
	.bind(&params.iv)
	.bind(&params.tag)
	.bind(&params.key_version)
	.bind(&params.created_at)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

fn parse_secret_row(row: &SqliteRow) -> Result<SecretRow> {
	Ok(SecretRow {
		id: row.try_get("id")?,
		owner_id: row.try_get("owner_id")?,
		name: row.try_get("name")?,
		kind: row.try_get("kind")?,
		description: row.try_get("description")?,
		created_at: row.try_get("created_at")?,
		updated_at: row.try_get("updated_at")?,
		version_count: row.try_get("version_count")?,
		active_version: row.try_get("active_version")?,
		active_since: row.try_get("active_since")?,
	})
}

fn parse_version_row(row: &SqliteRow) -> Result<SecretVersionRow> {
	Ok(SecretVersionRow {
		id: row.try_get("id")?,
		secret_id: row.try_get("secret_id")?,
		version: row.try_get("version")?,
		status: row.try_get("status")?,
		ciphertext: row.try_get("ciphertext")?,
		iv: row.try_get("iv")?,
		tag: row.try_get("tag")?,
		key_version: row.try_get("key_version")?,
		created_at: row.try_get("created_at")?,
		retired_at: row.try_get("retired_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_migrated_test_pool;

	fn secret(id: &str, owner: &str, name: &str) -> CreateSecretParams {
		CreateSecretParams {
			id: id.to_string(),
			owner_id: owner.to_string(),
			name: name.to_string(),
			kind: "api_token".to_string(),
			description: None,
			created_at: "2025-01-01T00:00:00Z".to_string(),
		}
	}

	fn payload(id: &str, created_at: &str) -> NewVersionParams {
		NewVersionParams {
			id: id.to_string(),
			ciphertext: "Y2lwaGVy".to_string(),
			iv: "AAAAAAAAAAAAAAAA".to_string(),
			tag: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
			key_version: "1".to_string(),
			created_at: created_at.to_string(),
		}
	}

	fn rotate(owner: &str, secret_id: &str, expected: Option<i64>, version_id: &str) -> RotateParams {
		RotateParams {
			owner_id: owner.to_string(),
			secret_id: secret_id.to_string(),
			expected_version: expected,
			version: payload(version_id, "2025-01-02T00:00:00Z"),
		}
	}

	async fn repo_with_secret() -> SecretsRepository {
		let repo = SecretsRepository::new(create_migrated_test_pool().await);
		repo.create_secret(&secret("s1", "alice", "db/password"), &payload("v1", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();
		repo
	}

	mod create {
		use super::*;

		#[tokio::test]
		async fn creates_secret_with_active_first_version() {
			let repo = repo_with_secret().await;

			let row = repo.get_secret("alice", "s1").await.unwrap().unwrap();
			assert_eq!(row.name, "db/password");
			assert_eq!(row.version_count, 1);
			assert_eq!(row.active_version, Some(1));
			assert_eq!(row.active_since.as_deref(), Some("2025-01-01T00:00:00Z"));

			let active = repo.get_active_version("alice", "s1").await.unwrap().unwrap();
			assert_eq!(active.version, 1);
			assert_eq!(active.status, STATUS_ACTIVE);
			assert_eq!(active.ciphertext.as_deref(), Some("Y2lwaGVy"));
		}

		#[tokio::test]
		async fn duplicate_name_for_same_owner_conflicts() {
			let repo = repo_with_secret().await;
			let err = repo
				.create_secret(&secret("s2", "alice", "db/password"), &payload("v2", "2025-01-01T00:00:00Z"))
				.await
				.unwrap_err();
			assert!(matches!(err, DbError::Conflict(_)));

			assert!(repo.get_secret("alice", "s2").await.unwrap().is_none());
		}

		#[tokio::test]
		async fn same_name_for_other_owner_is_allowed() {
			let repo = repo_with_secret().await;
			repo.create_secret(&secret("s2", "bob", "db/password"), &payload("v2", "2025-01-01T00:00:00Z"))
				.await
				.unwrap();

			assert_eq!(repo.list_secrets("alice").await.unwrap().len(), 1);
			assert_eq!(repo.list_secrets("bob").await.unwrap().len(), 1);
		}
	}

	mod lookup {
		use super::*;

		#[tokio::test]
		async fn other_owner_cannot_see_secret() {
			let repo = repo_with_secret().await;
			assert!(repo.get_secret("mallory", "s1").await.unwrap().is_none());
			assert!(repo.get_secret_by_name("mallory", "db/password").await.unwrap().is_none());
			assert!(repo.get_active_version("mallory", "s1").await.unwrap().is_none());
			assert!(repo.get_version("mallory", "s1", 1).await.unwrap().is_none());
		}

		#[tokio::test]
		async fn list_is_ordered_by_name() {
			let repo = repo_with_secret().await;
			repo.create_secret(&secret("s2", "alice", "aws/key"), &payload("v2", "2025-01-01T00:00:00Z"))
				.await
				.unwrap();

			let names: Vec<_> = repo
				.list_secrets("alice")
				.await
				.unwrap()
				.into_iter()
				.map(|r| r.name)
				.collect();
			assert_eq!(names, vec!["aws/key", "db/password"]);
		}
	}

	mod rotation {
		use super::*;

		#[tokio::test]
		async fn rotation_retires_previous_and_activates_next() {
			let repo = repo_with_secret().await;
			let new = repo.rotate_secret(&rotate("alice", "s1", Some(1), "v2")).await.unwrap();
			assert_eq!(new.version, 2);

			let versions = repo.list_versions("alice", "s1").await.unwrap();
			let statuses: Vec<_> = versions.iter().map(|v| (v.version, v.status.as_str())).collect();
			assert_eq!(statuses, vec![(1, STATUS_RETIRED), (2, STATUS_ACTIVE)]);
			assert_eq!(versions[0].retired_at.as_deref(), Some("2025-01-02T00:00:00Z"));

			let row = repo.get_secret("alice", "s1").await.unwrap().unwrap();
			assert_eq!(row.version_count, 2);
			assert_eq!(row.active_version, Some(2));
			assert_eq!(row.updated_at, "2025-01-02T00:00:00Z");
		}

		#[tokio::test]
		async fn stale_expected_version_conflicts() {
			let repo = repo_with_secret().await;
			repo.rotate_secret(&rotate("alice", "s1", Some(1), "v2")).await.unwrap();

			let err = repo
				.rotate_secret(&rotate("alice", "s1", Some(1), "v3"))
				.await
				.unwrap_err();
			assert!(matches!(err, DbError::Conflict(_)));
			assert_eq!(repo.list_versions("alice", "s1").await.unwrap().len(), 2);
		}

		#[tokio::test]
		async fn unconditional_rotation_always_advances() {
			let repo = repo_with_secret().await;
			repo.rotate_secret(&rotate("alice", "s1", None, "v2")).await.unwrap();
			let third = repo.rotate_secret(&rotate("alice", "s1", None, "v3")).await.unwrap();
			assert_eq!(third.version, 3);
		}

		#[tokio::test]
		async fn rotating_unknown_or_foreign_secret_is_not_found() {
			let repo = repo_with_secret().await;
			let err = repo.rotate_secret(&rotate("alice", "nope", None, "v2")).await.unwrap_err();
			assert!(matches!(err, DbError::NotFound(_)));

			let err = repo.rotate_secret(&rotate("bob", "s1", None, "v2")).await.unwrap_err();
			assert!(matches!(err, DbError::NotFound(_)));
		}

		#[tokio::test]
		async fn missing_active_version_error_omits_the_id() {
			let repo = repo_with_secret().await;
			sqlx::query("DELETE FROM secret_versions WHERE secret_id = 's1'")
				.execute(&repo.pool)
				.await
				.unwrap();

			let err = repo.rotate_secret(&rotate("alice", "s1", None, "v2")).await.unwrap_err();
			assert!(matches!(err, DbError::Internal(_)));
			assert!(!err.to_string().contains("s1"));
		}

		#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
		async fn concurrent_rotations_produce_one_successor() {
			let dir = tempfile::tempdir().unwrap();
			let url = format!("sqlite://{}", dir.path().join("keys.db").display());
			let pool = crate::pool::create_pool(&url).await.unwrap();
			crate::pool::run_migrations(&pool).await.unwrap();

			let repo = SecretsRepository::new(pool);
			repo.create_secret(&secret("s1", "alice", "db/password"), &payload("v1", "2025-01-01T00:00:00Z"))
				.await
				.unwrap();

			let handles: Vec<_> = (0..16)
				.map(|i| {
					let repo = repo.clone();
					tokio::spawn(async move {
						repo.rotate_secret(&rotate("alice", "s1", Some(1), &format!("v2-{i}"))).await
					})
				})
				.collect();

			let mut succeeded = 0;
			for handle in handles {
				match handle.await.unwrap() {
					Ok(row) => {
						assert_eq!(row.version, 2);
						succeeded += 1;
					}
					Err(DbError::Conflict(_)) => {}
					Err(other) => panic!("unexpected rotation error: {other}"),
				}
			}
			assert_eq!(succeeded, 1);

			let versions = repo.list_versions("alice", "s1").await.unwrap();
			assert_eq!(versions.len(), 2);
			assert_eq!(versions.iter().filter(|v| v.status == STATUS_ACTIVE).count(), 1);
		}

		#[tokio::test]
		async fn second_active_version_is_rejected_by_index() {
			let repo = repo_with_secret().await;
			let err = sqlx::query(
				"INSERT INTO secret_versions (id, secret_id, version, status, key_version, created_at) VALUES ('x', 's1', 5, 'active', '1', 'now')",
			)
			.execute(&repo.pool)
			.await
			.unwrap_err();
			assert!(is_unique_violation(&err));
		}
	}

	mod purge {
		use super::*;

		#[tokio::test]
		async fn purge_hides_secret_and_clears_material() {
			let repo = repo_with_secret().await;
			repo.rotate_secret(&rotate("alice", "s1", None, "v2")).await.unwrap();

			assert!(repo.purge_secret("alice", "s1", "2025-02-01T00:00:00Z").await.unwrap());
			assert!(repo.get_secret("alice", "s1").await.unwrap().is_none());
			assert!(repo.list_secrets("alice").await.unwrap().is_empty());

			let rows = sqlx::query("SELECT status, ciphertext, iv, tag FROM secret_versions WHERE secret_id = 's1'")
				.fetch_all(&repo.pool)
				.await
				.unwrap();
			assert_eq!(rows.len(), 2);
			for row in rows {
				let status: String = row.get("status");
				let ciphertext: Option<String> = row.get("ciphertext");
				let iv: Option<String> = row.get("iv");
				let tag: Option<String> = row.get("tag");
				assert_eq!(status, STATUS_PURGED);
				assert!(ciphertext.is_none() && iv.is_none() && tag.is_none());
			}
		}

		#[tokio::test]
		async fn purge_frees_the_name() {
			let repo = repo_with_secret().await;
			repo.purge_secret("alice", "s1", "2025-02-01T00:00:00Z").await.unwrap();

			repo.create_secret(&secret("s2", "alice", "db/password"), &payload("v9", "2025-02-02T00:00:00Z"))
				.await
				.unwrap();
			let row = repo.get_secret_by_name("alice", "db/password").await.unwrap().unwrap();
			assert_eq!(row.id, "s2");
		}

		#[tokio::test]
		async fn purge_is_owner_scoped_and_reports_missing() {
			let repo = repo_with_secret().await;
			assert!(!repo.purge_secret("bob", "s1", "2025-02-01T00:00:00Z").await.unwrap());
			assert!(repo.purge_secret("alice", "s1", "2025-02-01T00:00:00Z").await.unwrap());
			assert!(!repo.purge_secret("alice", "s1", "2025-02-01T00:00:00Z").await.unwrap());
		}

		#[tokio::test]
		async fn rotating_purged_secret_is_not_found() {
			let repo = repo_with_secret().await;
			repo.purge_secret("alice", "s1", "2025-02-01T00:00:00Z").await.unwrap();
			let err = repo.rotate_secret(&rotate("alice", "s1", None, "v2")).await.unwrap_err();
			assert!(matches!(err, DbError::NotFound(_)));
		}
	}
}
