// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret scrubbing for anything that may end up in a log.
//!
//! - [`redact`] replaces secret-shaped substrings (vault API keys, provider
//!   keys, JWTs, bearer tokens, long random strings) with
//!   `[REDACTED:<rule-id>]`.
//! - [`redact_json`] additionally hides whole values stored under sensitive
//!   field names.
//! - [`partial_redact`] renders an identifier safe to show to humans.
//! - [`redact_url`] strips credentials and sensitive query parameters.
//! - [`RedactingMakeWriter`] plugs all of the above into `tracing-subscriber`.

mod entropy;
mod fields;
mod rule;
mod writer;

use std::borrow::Cow;
use url::Url;

use crate::rule::RULES;

pub use entropy::shannon_entropy;
pub use fields::{is_sensitive_field, redact_json};
pub use writer::{RedactingMakeWriter, RedactingWriter};

/// Placeholder for values hidden by field name.
pub const REDACTED: &str = "[REDACTED]";

/// Placeholder used inside URLs, where brackets would be percent-encoded.
const URL_REDACTED: &str = "REDACTED";

/// Query parameters always hidden by [`redact_url`], in addition to sensitive
/// field names.
const SENSITIVE_QUERY_PARAMS: &[&str] = &["key", "sig", "signature"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
	pub rule_id: &'static str,
	pub start: usize,
	pub end: usize,
}

fn find_matches(input: &str) -> Vec<Detection> {
	let input_lower = input.to_lowercase();
	let mut matches = Vec::new();

	for rule in RULES.iter() {
		if !rule.should_check(&input_lower) {
			continue;
		}

		for cap in rule.regex.captures_iter(input) {
			let Some(m) = cap.get(rule.secret_group) else {
				continue;
			};

			if !rule.passes_entropy(m.as_str()) {
				continue;
			}

			matches.push(Detection {
				rule_id: rule.id,
				start: m.start(),
				end: m.end(),
			});
		}
	}

	matches.sort_by_key(|m| m.start);

	let mut deduped: Vec<Detection> = Vec::with_capacity(matches.len());
	for m in matches {
		if deduped.last().is_some_and(|last| m.start < last.end) {
			continue;
		}
		deduped.push(m);
	}

	deduped
}

/// Replace every detected secret with `[REDACTED:<rule-id>]`.
///
/// Borrows the input unchanged when nothing matches.
pub fn redact(input: &str) -> Cow<'_, str> {
	let matches = find_matches(input);
	if matches.is_empty() {
		return Cow::Borrowed(input);
	}

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;
	for m in matches {
		result.push_str(&input[last_end..m.start]);
		result.push_str("[REDACTED:");
		result.push_str(m.rule_id);
		result.push(']');
		last_end = m.end;
	}
	result.push_str(&input[last_end..]);

	Cow::Owned(result)
}

/// Redact `input` in place. Returns true if anything was replaced.
pub fn redact_in_place(input: &mut String) -> bool {
	match redact(input) {
		Cow::Borrowed(_) => false,
		Cow::Owned(redacted) => {
			*input = redacted;
			true
		}
	}
}

pub fn contains_secrets(input: &str) -> bool {
	!find_matches(input).is_empty()
}

pub fn detect(input: &str) -> Vec<Detection> {
	find_matches(input)
}

/// Keep the first and last `visible` characters and star out up to eight in
/// between. Values too short to hide anything become `[REDACTED]`.
pub fn partial_redact(value: &str, visible: usize) -> String {
	let chars: Vec<char> = value.chars().collect();
	if chars.len() <= visible * 2 {
		return REDACTED.to_string();
	}

	let head: String = chars[..visible].iter().collect();
	let tail: String = chars[chars.len() - visible..].iter().collect();
	let hidden = (chars.len() - visible * 2).min(8);

	format!("{head}{}{tail}", "*".repeat(hidden))
}

/// Redact a URL's password and sensitive query parameters. Inputs that do not
/// parse as URLs fall back to [`redact`].
pub fn redact_url(input: &str) -> String {
	let Ok(mut url) = Url::parse(input) else {
		return redact(input).into_owned();
	};

	if url.password().is_some() {
		// Only fails for cannot-be-a-base URLs, which have no password.
		let _ = url.set_password(Some(URL_REDACTED));
	}

	if url.query().is_some() {
		let pairs: Vec<(String, String)> = url
			.query_pairs()
			.map(|(k, v)| {
				let hide = is_sensitive_field(&k)
					|| SENSITIVE_QUERY_PARAMS.contains(&k.to_ascii_lowercase().as_str());
				let value = if hide {
					URL_REDACTED.to_string()
				} else {
					redact(&v).into_owned()
				};
				(k.into_owned(), value)
			})
			.collect();

		url.query_pairs_mut().clear().extend_pairs(pairs);
	}

	url.to_string()
}
