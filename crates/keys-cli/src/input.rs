// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reading secret material from stdin so it never appears in argv.

use anyhow::{Context, Result};
use keys_common_secret::{SecretBytes, SecretString};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read a secret value. A single trailing newline is dropped so that
/// `echo value | keysctl ...` stores `value`.
pub async fn read_secret<R: AsyncRead + Unpin>(mut reader: R) -> Result<SecretBytes> {
	let mut buf = Vec::new();
	reader
		.read_to_end(&mut buf)
		.await
		.context("failed to read secret value from stdin")?;

	if buf.last() == Some(&b'\n') {
		buf.pop();
		if buf.last() == Some(&b'\r') {
			buf.pop();
		}
	}
	Ok(SecretBytes::new(buf))
}

/// Read an API key token, trimming surrounding whitespace.
pub async fn read_token<R: AsyncRead + Unpin>(mut reader: R) -> Result<SecretString> {
	let mut buf = String::new();
	reader
		.read_to_string(&mut buf)
		.await
		.context("failed to read API key from stdin")?;

	let token = SecretString::new(buf.trim().to_string());
	drop(SecretString::new(buf));
	Ok(token)
}
