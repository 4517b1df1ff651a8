// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-name based redaction for structured payloads.

use serde_json::Value;

use crate::{redact_in_place, REDACTED};

/// Field names (normalized: lowercase, no `_` or `-`) whose values are always
/// replaced. A field is sensitive if its normalized name contains any entry.
const SENSITIVE_FIELDS: &[&str] = &[
	"password",
	"secret",
	"token",
	"apikey",
	"auth",
	"bearer",
	"credential",
	"privatekey",
	"accesskey",
	"session",
	"cookie",
	"ssn",
	"socialsecurity",
	"creditcard",
	"cardnumber",
	"cvv",
	"cvc",
	"stripekey",
	"masterkey",
	"rootkey",
	"hashedkey",
	"keyhash",
	"ciphertext",
	"plaintext",
];

/// Suffixes naming references or bookkeeping rather than secret values.
const NON_SECRET_SUFFIXES: &[&str] = &["_id", "_ids", "_count", "_version", "_at"];

fn normalize(name: &str) -> String {
	name.chars()
		.filter(|c| *c != '_' && *c != '-')
		.flat_map(char::to_lowercase)
		.collect()
}

/// Whether values stored under `name` should be hidden entirely.
pub fn is_sensitive_field(name: &str) -> bool {
	let lower = name.to_ascii_lowercase();
	if NON_SECRET_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
		return false;
	}

	let normalized = normalize(name);
	SENSITIVE_FIELDS.iter().any(|f| normalized.contains(f))
}

/// Redact a JSON value in place.
///
/// Values under sensitive keys become `"[REDACTED]"`; every other string is
/// passed through [`crate::redact`].
pub fn redact_json(value: &mut Value) {
	match value {
		Value::String(s) => {
			redact_in_place(s);
		}
		Value::Array(items) => items.iter_mut().for_each(redact_json),
		Value::Object(map) => {
			for (key, entry) in map.iter_mut() {
				if is_sensitive_field(key) && !entry.is_null() {
					*entry = Value::String(REDACTED.to_string());
				} else {
					redact_json(entry);
				}
			}
		}
		Value::Null | Value::Bool(_) | Value::Number(_) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn sensitive_names_match_across_spellings() {
		for name in [
			"password",
			"API_KEY",
			"api-key",
			"apiKey",
			"openai_api_key",
			"master_key",
			"hashed_key",
			"Authorization",
			"plaintext",
		] {
			assert!(is_sensitive_field(name), "{name}");
		}
	}

	#[test]
	fn identifiers_and_plain_fields_are_kept() {
		for name in ["secret_id", "api_key_id", "key_version", "name", "kind", "created_at"] {
			assert!(!is_sensitive_field(name), "{name}");
		}
	}

	#[test]
	fn nested_objects_are_redacted() {
		let mut value = json!({
			"name": "openai/default",
			"secret_id": "0b6b8c5e",
			"plaintext": "hunter2",
			"nested": {
				"token": "abc",
				"note": "header was Bearer abcdefghijklmnop"
			},
			"list": [{"password": "p"}, "kx_live_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"],
			"missing_token": null
		});

		redact_json(&mut value);

		assert_eq!(value["name"], "openai/default");
		assert_eq!(value["secret_id"], "0b6b8c5e");
		assert_eq!(value["plaintext"], REDACTED);
		assert_eq!(value["nested"]["token"], REDACTED);
		assert_eq!(value["nested"]["note"], "header was Bearer [REDACTED:bearer-token]");
		assert_eq!(value["list"][0]["password"], REDACTED);
		assert_eq!(value["list"][1], "[REDACTED:keys-api-key]");
		assert!(value["missing_token"].is_null());
	}
}
