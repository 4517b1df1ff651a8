// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Input validation. Messages describe the rule, never the rejected value.

use chrono::{DateTime, Utc};

use crate::error::{VaultError, VaultResult};

pub const MAX_TENANT_ID_LEN: usize = 255;
pub const MAX_SECRET_NAME_LEN: usize = 128;
pub const MAX_KIND_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 1024;
pub const MAX_PLAINTEXT_LEN: usize = 64 * 1024;
pub const MAX_API_KEY_NAME_LEN: usize = 128;
pub const MAX_SCOPE_LEN: usize = 64;

fn invalid(message: impl Into<String>) -> VaultError {
	VaultError::Validation(message.into())
}

fn check_charset(
	field: &str,
	value: &str,
	max_len: usize,
	allowed: impl Fn(char) -> bool,
	allowed_desc: &str,
) -> VaultResult<()> {
	let len = value.chars().count();
	if len == 0 || len > max_len {
		return Err(invalid(format!("{field} must be 1-{max_len} characters")));
	}
	if !value.chars().all(allowed) {
		return Err(invalid(format!("{field} may only contain {allowed_desc}")));
	}
	Ok(())
}

pub fn validate_tenant_id(id: &str) -> VaultResult<()> {
	if id.is_empty() {
		return Err(invalid("tenant id must not be empty"));
	}
	if id.chars().count() > MAX_TENANT_ID_LEN {
		return Err(invalid(format!(
			"tenant id must be at most {MAX_TENANT_ID_LEN} characters"
		)));
	}
	if id.chars().any(char::is_control) {
		return Err(invalid("tenant id must not contain control characters"));
	}
	Ok(())
}

/// `[A-Za-z0-9_.:/-]{1,128}`
pub fn validate_secret_name(name: &str) -> VaultResult<()> {
	check_charset(
		"secret name",
		name,
		MAX_SECRET_NAME_LEN,
		|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/' | '-'),
		"letters, digits and _ . : / -",
	)
}

/// `[A-Za-z0-9_.-]{1,64}`
pub fn validate_kind(kind: &str) -> VaultResult<()> {
	check_charset(
		"secret kind",
		kind,
		MAX_KIND_LEN,
		|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'),
		"letters, digits and _ . -",
	)
}

pub fn validate_description(description: Option<&str>) -> VaultResult<()> {
	match description {
		Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(invalid(format!(
			"description must be at most {MAX_DESCRIPTION_LEN} characters"
		))),
		_ => Ok(()),
	}
}

pub fn validate_plaintext(plaintext: &[u8]) -> VaultResult<()> {
	if plaintext.is_empty() {
		return Err(invalid("secret value must not be empty"));
	}
	if plaintext.len() > MAX_PLAINTEXT_LEN {
		return Err(invalid(format!(
			"secret value must be at most {MAX_PLAINTEXT_LEN} bytes"
		)));
	}
	Ok(())
}

pub fn validate_api_key_name(name: &str) -> VaultResult<()> {
	if name.trim().is_empty() {
		return Err(invalid("api key name must not be blank"));
	}
	if name.chars().count() > MAX_API_KEY_NAME_LEN {
		return Err(invalid(format!(
			"api key name must be at most {MAX_API_KEY_NAME_LEN} characters"
		)));
	}
	Ok(())
}

/// Validate each scope (`[a-z0-9_:.-]{1,64}`) and return them sorted and
/// deduplicated.
pub fn normalize_scopes<I, S>(scopes: I) -> VaultResult<Vec<String>>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut normalized = Vec::new();
	for scope in scopes {
		let scope = scope.as_ref();
		check_charset(
			"scope",
			scope,
			MAX_SCOPE_LEN,
			|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | ':' | '.' | '-'),
			"lowercase letters, digits and _ : . -",
		)?;
		normalized.push(scope.to_string());
	}
	normalized.sort();
	normalized.dedup();
	Ok(normalized)
}

pub fn validate_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> VaultResult<()> {
	match expires_at {
		Some(exp) if exp <= now => Err(invalid("expiry must be in the future")),
		_ => Ok(()),
	}
}
