// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository.
//!
//! Only the keyed hash of a token is stored. Lookups by hash go through the
//! unique index on `key_hash`.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::{is_unique_violation, DbError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRow {
	pub id: String,
	pub owner_id: String,
	pub name: String,
	pub prefix: String,
	pub key_hash: String,
	pub scopes: Vec<String>,
	pub expires_at: Option<String>,
	pub revoked_at: Option<String>,
	pub last_used_at: Option<String>,
	pub created_at: String,
}

const COLUMNS: &str =
	"id, owner_id, name, prefix, key_hash, scopes, expires_at, revoked_at, last_used_at, created_at";

#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new key. `Conflict` if the hash is already present.
	#[tracing::instrument(skip(self, row), fields(api_key_id = %row.id, owner_id = %row.owner_id))]
	pub async fn create_api_key(&self, row: &ApiKeyRow) -> Result<()> {
		let scopes = serde_json::to_string(&row.scopes)?;

		let result = sqlx::query(
			r#"
			INSERT INTO api_keys (id, owner_id, name, prefix, key_hash, scopes, expires_at, revoked_at, last_used_at, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&row.id)
		.bind(&row.owner_id)
		.bind(&row.name)
		.bind(&row.prefix)
		.bind(&row.key_hash)
		.bind(&scopes)
		.bind(&row.expires_at)
		.bind(&row.revoked_at)
		.bind(&row.last_used_at)
		.bind(&row.created_at)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(api_key_id = %row.id, "api key created");
				Ok(())
			}
			Err(e) if is_unique_violation(&e) => {
				Err(DbError::Conflict("api key already exists".to_string()))
			}
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, api_key_id = %id))]
	pub async fn get_api_key(&self, owner_id: &str, id: &str) -> Result<Option<ApiKeyRow>> {
		let sql = format!("SELECT {COLUMNS} FROM api_keys WHERE id = ? AND owner_id = ?");
		let row = sqlx::query(&sql)
			.bind(id)
			.bind(owner_id)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_api_key_row).transpose()
	}

	#[tracing::instrument(skip(self, key_hash))]
	pub async fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRow>> {
		let sql = format!("SELECT {COLUMNS} FROM api_keys WHERE key_hash = ?");
		let row = sqlx::query(&sql)
			.bind(key_hash)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_api_key_row).transpose()
	}

	/// Keys for an owner, newest first. Revoked and expired keys included.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id))]
	pub async fn list_api_keys(&self, owner_id: &str) -> Result<Vec<ApiKeyRow>> {
		let sql = format!(
			"SELECT {COLUMNS} FROM api_keys WHERE owner_id = ? ORDER BY created_at DESC, id"
		);
		let rows = sqlx::query(&sql).bind(owner_id).fetch_all(&self.pool).await?;

		rows.iter().map(parse_api_key_row).collect()
	}

	/// Mark a key revoked. An already revoked key keeps its original
	/// `revoked_at`. Returns `false` if the key does not exist for the owner.
	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, api_key_id = %id))]
	pub async fn revoke_api_key(&self, owner_id: &str, id: &str, revoked_at: &str) -> Result<bool> {
		let result = sqlx::query(
			"UPDATE api_keys SET revoked_at = COALESCE(revoked_at, ?) WHERE id = ? AND owner_id = ?",
		)
		.bind(revoked_at)
		.bind(id)
		.bind(owner_id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner_id, api_key_id = %id))]
	pub async fn delete_api_key(&self, owner_id: &str, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND owner_id = ?")
			.bind(id)
			.bind(owner_id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn update_last_used(&self, id: &str, used_at: &str) -> Result<()> {
		sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
			.bind(used_at)
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}
}

fn parse_api_key_row(row: &SqliteRow) -> Result<ApiKeyRow> {
	let scopes: String = row.try_get("scopes")?;

	Ok(ApiKeyRow {
		id: row.try_get("id")?,
		owner_id: row.try_get("owner_id")?,
		name: row.try_get("name")?,
		prefix: row.try_get("prefix")?,
		key_hash: row.try_get("key_hash")?,
		scopes: serde_json::from_str(&scopes)?,
		expires_at: row.try_get("expires_at")?,
		revoked_at: row.try_get("revoked_at")?,
		last_used_at: row.try_get("last_used_at")?,
		created_at: row.try_get("created_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_migrated_test_pool;

	fn key_row(id: &str, owner: &str, hash: &str, created_at: &str) -> ApiKeyRow {
		ApiKeyRow {
			id: id.to_string(),
			owner_id: owner.to_string(),
			name: format!("key {id}"),
			prefix: "kx_live".to_string(),
			key_hash: hash.to_string(),
			scopes: vec!["secrets:read".to_string()],
			expires_at: None,
			revoked_at: None,
			last_used_at: None,
			created_at: created_at.to_string(),
		}
	}

	async fn make_repo() -> ApiKeyRepository {
		ApiKeyRepository::new(create_migrated_test_pool().await)
	}

	#[tokio::test]
	async fn create_and_fetch_by_hash() {
		let repo = make_repo().await;
		let row = key_row("k1", "alice", "aa11", "2025-01-01T00:00:00Z");
		repo.create_api_key(&row).await.unwrap();

		let found = repo.get_api_key_by_hash("aa11").await.unwrap().unwrap();
		assert_eq!(found, row);
		assert!(repo.get_api_key_by_hash("bb22").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn duplicate_hash_conflicts() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "aa11", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();
		let err = repo
			.create_api_key(&key_row("k2", "bob", "aa11", "2025-01-01T00:00:00Z"))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn get_is_owner_scoped() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "aa11", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();
		assert!(repo.get_api_key("alice", "k1").await.unwrap().is_some());
		assert!(repo.get_api_key("bob", "k1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn list_is_newest_first() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "h1", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();
		repo.create_api_key(&key_row("k2", "alice", "h2", "2025-03-01T00:00:00Z"))
			.await
			.unwrap();
		repo.create_api_key(&key_row("k3", "bob", "h3", "2025-02-01T00:00:00Z"))
			.await
			.unwrap();

		let ids: Vec<_> = repo
			.list_api_keys("alice")
			.await
			.unwrap()
			.into_iter()
			.map(|k| k.id)
			.collect();
		assert_eq!(ids, vec!["k2", "k1"]);
	}

	#[tokio::test]
	async fn revoke_keeps_first_timestamp() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "h1", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();

		assert!(repo.revoke_api_key("alice", "k1", "2025-01-05T00:00:00Z").await.unwrap());
		assert!(repo.revoke_api_key("alice", "k1", "2025-01-09T00:00:00Z").await.unwrap());
		assert!(!repo.revoke_api_key("bob", "k1", "2025-01-09T00:00:00Z").await.unwrap());

		let row = repo.get_api_key("alice", "k1").await.unwrap().unwrap();
		assert_eq!(row.revoked_at.as_deref(), Some("2025-01-05T00:00:00Z"));
	}

	#[tokio::test]
	async fn delete_removes_row() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "h1", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();

		assert!(!repo.delete_api_key("bob", "k1").await.unwrap());
		assert!(repo.delete_api_key("alice", "k1").await.unwrap());
		assert!(!repo.delete_api_key("alice", "k1").await.unwrap());
		assert!(repo.get_api_key_by_hash("h1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn update_last_used_is_recorded() {
		let repo = make_repo().await;
		repo.create_api_key(&key_row("k1", "alice", "h1", "2025-01-01T00:00:00Z"))
			.await
			.unwrap();
		repo.update_last_used("k1", "2025-01-02T03:04:05Z").await.unwrap();

		let row = repo.get_api_key("alice", "k1").await.unwrap().unwrap();
		assert_eq!(row.last_used_at.as_deref(), Some("2025-01-02T03:04:05Z"));
	}
}
