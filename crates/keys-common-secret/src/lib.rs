// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrappers for values that must never reach a log line.
//!
//! Everything the vault handles on behalf of a tenant (root keys, plaintext
//! secret values, freshly issued API tokens) travels inside a [`Secret<T>`]:
//!
//! - `Debug`, `Display` and `Serialize` print [`REDACTED`]
//! - the inner buffer is zeroized on drop
//! - reading the value requires an explicit [`Secret::expose`] call
//!
//! ```
//! use keys_common_secret::{SecretBytes, SecretString};
//!
//! let token = SecretString::new("kx_live_abc".to_string());
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "kx_live_abc");
//!
//! let value = SecretBytes::from("hunter2");
//! assert_eq!(value.len(), 7);
//! assert_eq!(format!("{value:?}"), "Secret(\"[REDACTED]\")");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder printed instead of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that redacts itself in every formatting path and is wiped on drop.
///
/// There is no `Deref`; callers reach the value through [`Secret::expose`] so
/// every read is visible in review.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret text: configuration values, issued API tokens.
pub type SecretString = Secret<String>;

/// Secret bytes: plaintext secret values going in and out of the vault.
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the wrapped value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Copy the wrapped value out. The original buffer is still zeroized when
	/// `self` drops.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// True when the wrapped string is empty or only whitespace.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl SecretBytes {
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Reinterpret the bytes as UTF-8 text without leaving an unguarded copy.
	///
	/// Returns `None` when the bytes are not valid UTF-8.
	pub fn to_secret_string(&self) -> Option<SecretString> {
		std::str::from_utf8(&self.inner)
			.ok()
			.map(|s| Secret::new(s.to_owned()))
	}
}

impl From<&str> for SecretBytes {
	fn from(value: &str) -> Self {
		Secret::new(value.as_bytes().to_vec())
	}
}

impl From<String> for SecretBytes {
	fn from(value: String) -> Self {
		Secret::new(value.into_bytes())
	}
}

impl From<SecretString> for SecretBytes {
	fn from(value: SecretString) -> Self {
		Secret::new(value.expose().as_bytes().to_vec())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

// tracing::Value is sealed. `%secret` goes through Display and `?secret`
// through Debug, both of which print the placeholder.

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
