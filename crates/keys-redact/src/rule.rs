// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::entropy::shannon_entropy;

const REGEX_SIZE_LIMIT: usize = 1024 * 1024;

/// Static description of a detection rule.
struct RuleDef {
	id: &'static str,
	pattern: &'static str,
	/// Capture group holding the secret; 0 means the whole match.
	secret_group: usize,
	/// Minimum Shannon entropy (bits/char) for a match to count.
	entropy: Option<f32>,
	/// Lowercase substrings, one of which must appear for the rule to run.
	keywords: &'static [&'static str],
}

// Order matters: when two rules match at the same offset the earlier rule wins.
const RULE_DEFS: &[RuleDef] = &[
	RuleDef {
		id: "keys-api-key",
		pattern: r"kx_(?:live|test)_[A-Za-z0-9_-]{30,}",
		secret_group: 0,
		entropy: None,
		keywords: &["kx_live_", "kx_test_"],
	},
	RuleDef {
		id: "anthropic-api-key",
		pattern: r"sk-ant-[A-Za-z0-9_-]{20,}",
		secret_group: 0,
		entropy: None,
		keywords: &["sk-ant-"],
	},
	RuleDef {
		id: "openai-api-key",
		pattern: r"sk-[A-Za-z0-9_-]{20,}",
		secret_group: 0,
		entropy: None,
		keywords: &["sk-"],
	},
	RuleDef {
		id: "google-api-key",
		pattern: r"AIza[A-Za-z0-9_-]{35}",
		secret_group: 0,
		entropy: None,
		keywords: &["aiza"],
	},
	RuleDef {
		id: "jwt",
		pattern: r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
		secret_group: 0,
		entropy: None,
		keywords: &["eyj"],
	},
	RuleDef {
		id: "bearer-token",
		pattern: r"(?i)\bbearer\s+([A-Za-z0-9._~+/-]{8,}=*)",
		secret_group: 1,
		entropy: None,
		keywords: &["bearer"],
	},
	RuleDef {
		id: "generic-secret",
		pattern: r"\b[A-Za-z0-9]{32,}\b",
		secret_group: 0,
		entropy: Some(3.0),
		keywords: &[],
	},
];

pub(crate) struct CompiledRule {
	pub id: &'static str,
	pub regex: Regex,
	pub secret_group: usize,
	pub entropy: Option<f32>,
	pub keywords: &'static [&'static str],
}

impl CompiledRule {
	fn compile(def: &RuleDef) -> Result<Self, regex::Error> {
		let regex = RegexBuilder::new(def.pattern)
			.size_limit(REGEX_SIZE_LIMIT)
			.build()?;
		Ok(Self {
			id: def.id,
			regex,
			secret_group: def.secret_group,
			entropy: def.entropy,
			keywords: def.keywords,
		})
	}

	/// Cheap pre-filter on the lowercased input before running the regex.
	pub fn should_check(&self, input_lower: &str) -> bool {
		self.keywords.is_empty() || self.keywords.iter().any(|k| input_lower.contains(k))
	}

	pub fn passes_entropy(&self, candidate: &str) -> bool {
		match self.entropy {
			Some(threshold) => shannon_entropy(candidate) >= threshold,
			None => true,
		}
	}
}

pub(crate) static RULES: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
	RULE_DEFS
		.iter()
		.filter_map(|def| CompiledRule::compile(def).ok())
		.collect()
});
