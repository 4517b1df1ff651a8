// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod logging;
mod vault;

pub use database::{DatabaseConfig, DatabaseConfigLayer, DEFAULT_DATABASE_URL};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use vault::{
	ApiKeyHmacMode, PreviousRootKey, VaultConfig, VaultConfigLayer, DEFAULT_KEY_VERSION,
};
