// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Subcommand;
use keys_vault::{
	ApiKeyStore, CreateSecretRequest, SecretId, SecretMetadata, SecretStore, TenantId, VaultService,
};

use crate::input::read_secret;

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
	/// Create a secret; the value is read from stdin
	Create {
		/// Name, unique per owner
		#[arg(long)]
		name: String,
		/// Free-form classification such as `password` or `api_token`
		#[arg(long, default_value = "generic")]
		kind: String,
		#[arg(long)]
		description: Option<String>,
	},
	/// Write a new version; the value is read from stdin
	Rotate {
		id: SecretId,
		/// Fail unless this is still the active version
		#[arg(long)]
		expected_version: Option<u32>,
	},
	/// Show metadata and version history
	Get {
		id: SecretId,
		#[arg(long)]
		json: bool,
	},
	/// Print a decrypted value to stdout
	Reveal {
		#[arg(required_unless_present = "name", conflicts_with = "name")]
		id: Option<SecretId>,
		/// Look the secret up by name instead of id
		#[arg(long)]
		name: Option<String>,
		/// A specific version instead of the active one; needs an id
		#[arg(long, requires = "id", conflicts_with = "name")]
		version: Option<u32>,
	},
	/// List secrets (metadata only)
	List {
		#[arg(long)]
		json: bool,
	},
	/// Delete a secret and erase every version
	Delete { id: SecretId },
}

pub async fn run<S: SecretStore, A: ApiKeyStore>(
	service: &VaultService<S, A>,
	owner: &TenantId,
	command: SecretCommand,
) -> Result<()> {
	match command {
		SecretCommand::Create {
			name,
			kind,
			description,
		} => {
			let plaintext = read_secret(tokio::io::stdin()).await?;
			let meta = service
				.create_secret(
					owner,
					CreateSecretRequest {
						name,
						kind,
						description,
						plaintext,
					},
				)
				.await
				.context("failed to create secret")?;
			println!("{}", meta.id);
		}
		SecretCommand::Rotate {
			id,
			expected_version,
		} => {
			let plaintext = read_secret(tokio::io::stdin()).await?;
			let version = service
				.rotate_secret(owner, id, &plaintext, expected_version)
				.await
				.context("failed to rotate secret")?;
			println!("{id} now at version {}", version.version);
		}
		SecretCommand::Get { id, json } => {
			let meta = service.get_secret(owner, id).await.context("failed to get secret")?;
			let versions = service
				.list_secret_versions(owner, id)
				.await
				.context("failed to list versions")?;

			if json {
				let value = serde_json::json!({ "secret": meta, "versions": versions });
				println!("{}", serde_json::to_string_pretty(&value)?);
			} else {
				print_metadata(&meta);
				println!();
				println!("{:>8} {:<8} {:<12} {:<32}", "VERSION", "STATUS", "KEY", "CREATED");
				for v in versions {
					println!(
						"{:>8} {:<8} {:<12} {:<32}",
						v.version,
						v.status.as_str(),
						v.key_version.as_deref().unwrap_or("-"),
						v.created_at.to_rfc3339()
					);
				}
			}
		}
		SecretCommand::Reveal { id, name, version } => {
			let plaintext = match (id, name, version) {
				(Some(id), _, Some(version)) => service.get_version_plaintext(owner, id, version).await,
				(Some(id), _, None) => service.get_active_plaintext(owner, id).await,
				(None, Some(name), None) => service.get_active_plaintext_by_name(owner, &name).await,
				(None, Some(_), Some(_)) => anyhow::bail!("--version needs a secret id, not --name"),
				(None, None, _) => anyhow::bail!("either a secret id or --name is required"),
			}
			.context("failed to reveal secret")?;

			let mut stdout = io::stdout().lock();
			stdout.write_all(plaintext.expose())?;
			stdout.flush()?;
		}
		SecretCommand::List { json } => {
			let secrets = service.list_secrets(owner).await.context("failed to list secrets")?;
			if json {
				println!("{}", serde_json::to_string_pretty(&secrets)?);
			} else if secrets.is_empty() {
				println!("No secrets.");
			} else {
				println!(
					"{:<38} {:<32} {:<16} {:>8} {:<32}",
					"ID", "NAME", "KIND", "VERSION", "UPDATED"
				);
				println!("{}", "-".repeat(130));
				for s in secrets {
					println!(
						"{:<38} {:<32} {:<16} {:>8} {:<32}",
						s.id.to_string(),
						s.name,
						s.kind,
						s.active_version,
						s.updated_at.to_rfc3339()
					);
				}
			}
		}
		SecretCommand::Delete { id } => {
			service.delete_secret(owner, id).await.context("failed to delete secret")?;
			println!("Deleted {id}");
		}
	}
	Ok(())
}

fn print_metadata(meta: &SecretMetadata) {
	println!("id:           {}", meta.id);
	println!("name:         {}", meta.name);
	println!("kind:         {}", meta.kind);
	if let Some(description) = &meta.description {
		println!("description:  {description}");
	}
	println!("versions:     {} (active {})", meta.version_count, meta.active_version);
	println!("created:      {}", meta.created_at.to_rfc3339());
	if let Some(rotated) = meta.last_rotated_at {
		println!("last rotated: {}", rotated.to_rfc3339());
	}
}
