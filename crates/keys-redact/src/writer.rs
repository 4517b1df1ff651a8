// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;

use crate::redact;

/// Line-buffered writer that runs every complete line through [`redact`]
/// before handing it to `inner`.
pub struct RedactingWriter<W: Write> {
	inner: W,
	buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
	pub fn new(inner: W) -> Self {
		Self {
			inner,
			buffer: Vec::new(),
		}
	}

	fn write_redacted(&mut self, line: &[u8]) -> io::Result<()> {
		let text = String::from_utf8_lossy(line);
		self.inner.write_all(redact(&text).as_bytes())
	}
}

impl<W: Write> Write for RedactingWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.buffer.extend_from_slice(buf);

		while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = self.buffer.drain(..=pos).collect();
			self.write_redacted(&line)?;
		}

		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		if !self.buffer.is_empty() {
			let rest = std::mem::take(&mut self.buffer);
			self.write_redacted(&rest)?;
		}
		self.inner.flush()
	}
}

impl<W: Write> Drop for RedactingWriter<W> {
	fn drop(&mut self) {
		let _ = self.flush();
	}
}

/// Wraps another [`MakeWriter`] so that every event a subscriber formats is
/// redacted on its way out.
///
/// ```no_run
/// use keys_redact::RedactingMakeWriter;
///
/// tracing_subscriber::fmt()
/// 	.with_writer(RedactingMakeWriter::new(std::io::stderr))
/// 	.init();
/// ```
pub struct RedactingMakeWriter<M> {
	inner: M,
}

impl<M> RedactingMakeWriter<M> {
	pub fn new(inner: M) -> Self {
		Self { inner }
	}
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
	M: MakeWriter<'a>,
{
	type Writer = RedactingWriter<M::Writer>;

	fn make_writer(&'a self) -> Self::Writer {
		RedactingWriter::new(self.inner.make_writer())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	fn vault_token() -> String {
		format!("kx_live_{}", "Q2hlY2tUaGlzT3V0SXRJc0FSZWFsbHlMb25nVG9rZW4")
	}

	fn written(f: impl FnOnce(&mut RedactingWriter<&mut Vec<u8>>)) -> String {
		let mut output = Vec::new();
		{
			let mut writer = RedactingWriter::new(&mut output);
			f(&mut writer);
		}
		String::from_utf8(output).unwrap()
	}

	#[test]
	fn redacts_complete_lines() {
		let token = vault_token();
		let result = written(|w| {
			w.write_all(b"starting\n").unwrap();
			writeln!(w, "issued token={token}").unwrap();
		});

		assert!(result.starts_with("starting\n"));
		assert!(result.contains("[REDACTED:keys-api-key]"));
		assert!(!result.contains(&token));
	}

	#[test]
	fn secret_split_across_writes_is_still_caught() {
		let token = vault_token();
		let (left, right) = token.split_at(12);
		let result = written(|w| {
			w.write_all(b"token=").unwrap();
			w.write_all(left.as_bytes()).unwrap();
			w.write_all(right.as_bytes()).unwrap();
			w.write_all(b"\n").unwrap();
		});

		assert!(!result.contains(&token));
	}

	#[test]
	fn trailing_partial_line_is_flushed_on_drop() {
		let token = vault_token();
		let result = written(|w| write!(w, "no newline {token}").unwrap());
		assert_eq!(result, "no newline [REDACTED:keys-api-key]");
	}

	#[test]
	fn clean_output_passes_through() {
		let result = written(|w| w.write_all(b"hello world\n").unwrap());
		assert_eq!(result, "hello world\n");
	}

	#[derive(Clone, Default)]
	struct Captured(Arc<Mutex<Vec<u8>>>);

	impl Write for Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl<'a> MakeWriter<'a> for Captured {
		type Writer = Captured;

		fn make_writer(&'a self) -> Self::Writer {
			self.clone()
		}
	}

	#[test]
	fn make_writer_redacts_subscriber_output() {
		let captured = Captured::default();
		let token = vault_token();
		{
			let mut writer = RedactingMakeWriter::new(captured.clone()).make_writer();
			writeln!(writer, "level=INFO token={token}").unwrap();
		}

		let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
		assert!(output.contains("[REDACTED:keys-api-key]"));
		assert!(!output.contains(&token));
	}
}
