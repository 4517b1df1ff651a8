// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use keys_vault::{
	ApiKeyId, ApiKeyPrefix, ApiKeyStore, IssueApiKeyRequest, SecretStore, TenantId, VaultService,
};

use crate::input::read_token;

#[derive(Subcommand, Debug)]
pub enum ApiKeyCommand {
	/// Issue a key and print its token once
	Issue {
		#[arg(long)]
		name: String,
		/// `kx_live` or `kx_test`
		#[arg(long, default_value = "kx_live")]
		prefix: ApiKeyPrefix,
		/// Repeatable
		#[arg(long = "scope", value_name = "SCOPE")]
		scopes: Vec<String>,
		/// RFC 3339 instant after which the key stops working
		#[arg(long)]
		expires_at: Option<DateTime<Utc>>,
	},
	/// Check a token read from stdin
	Verify,
	/// Revoke a key; revoking twice is not an error
	Revoke { id: ApiKeyId },
	List {
		#[arg(long)]
		json: bool,
	},
	Delete { id: ApiKeyId },
}

pub async fn run<S: SecretStore, A: ApiKeyStore>(
	service: &VaultService<S, A>,
	owner: Option<TenantId>,
	command: ApiKeyCommand,
) -> Result<()> {
	match command {
		ApiKeyCommand::Verify => {
			let token = read_token(tokio::io::stdin()).await?;
			let Some(verified) = service
				.verify_api_key(token.expose())
				.await
				.context("failed to verify API key")?
			else {
				anyhow::bail!("API key rejected");
			};
			println!("owner:  {}", verified.owner_id);
			println!("key:    {}", verified.api_key_id);
			println!("scopes: {}", verified.scopes.join(" "));
		}
		ApiKeyCommand::Issue {
			name,
			prefix,
			scopes,
			expires_at,
		} => {
			let owner = crate::require_owner(owner)?;
			let issued = service
				.issue_api_key(
					&owner,
					IssueApiKeyRequest {
						name,
						prefix,
						scopes,
						expires_at,
					},
				)
				.await
				.context("failed to issue API key")?;

			eprintln!("Issued {} ({})", issued.metadata.id, issued.metadata.partial_key);
			eprintln!("Store this token now; it cannot be shown again.");
			println!("{}", issued.token.expose());
		}
		ApiKeyCommand::Revoke { id } => {
			let owner = crate::require_owner(owner)?;
			service.revoke_api_key(&owner, id).await.context("failed to revoke API key")?;
			println!("Revoked {id}");
		}
		ApiKeyCommand::List { json } => {
			let owner = crate::require_owner(owner)?;
			let keys = service.list_api_keys(&owner).await.context("failed to list API keys")?;
			if json {
				println!("{}", serde_json::to_string_pretty(&keys)?);
			} else if keys.is_empty() {
				println!("No API keys.");
			} else {
				println!(
					"{:<38} {:<24} {:<14} {:<8} {:<32}",
					"ID", "NAME", "KEY", "STATUS", "LAST USED"
				);
				println!("{}", "-".repeat(118));
				for key in keys {
					println!(
						"{:<38} {:<24} {:<14} {:<8} {:<32}",
						key.id.to_string(),
						key.name,
						key.partial_key,
						key.status.to_string(),
						key.last_used_at
							.map(|t| t.to_rfc3339())
							.unwrap_or_else(|| "never".to_string())
					);
				}
			}
		}
		ApiKeyCommand::Delete { id } => {
			let owner = crate::require_owner(owner)?;
			service.delete_api_key(&owner, id).await.context("failed to delete API key")?;
			println!("Deleted {id}");
		}
	}
	Ok(())
}
