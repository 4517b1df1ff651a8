// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret loading with the `VAR` / `VAR_FILE` convention.
//!
//! `VAR_FILE` wins when both are set, so a root key mounted as a Docker or
//! Kubernetes secret overrides anything left in the process environment.

use std::fs;
use std::path::PathBuf;

use keys_common_secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load `var` from the process environment.
///
/// ```no_run
/// use keys_server_config::load_secret_env;
///
/// if let Some(root) = load_secret_env("KEYS_VAULT_MASTER_KEY")? {
///     println!("root key configured: {root}"); // prints "[REDACTED]"
/// }
/// # Ok::<(), keys_server_config::SecretEnvError>(())
/// ```
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	load_secret_with(var, |name| std::env::var(name).ok())
}

/// Same as [`load_secret_env`] but resolves variables through `lookup`.
///
/// A single trailing newline is stripped from file contents. Empty direct
/// values count as unset.
pub fn load_secret_with<F>(var: &str, lookup: F) -> Result<Option<SecretString>, SecretEnvError>
where
	F: Fn(&str) -> Option<String>,
{
	let file_var = format!("{var}_FILE");

	if let Some(path_str) = lookup(file_var.as_str()) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(path_str);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;
		let value = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(value)));
	}

	Ok(lookup(var)
		.filter(|v| !v.is_empty())
		.map(SecretString::new))
}
