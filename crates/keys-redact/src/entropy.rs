// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Shannon entropy of `s` in bits per byte.
pub fn shannon_entropy(s: &str) -> f32 {
	if s.is_empty() {
		return 0.0;
	}

	let mut counts = [0usize; 256];
	for &byte in s.as_bytes() {
		counts[byte as usize] += 1;
	}

	let len = s.len() as f32;
	counts
		.iter()
		.filter(|&&c| c > 0)
		.map(|&c| {
			let p = c as f32 / len;
			-p * p.log2()
		})
		.sum()
}
