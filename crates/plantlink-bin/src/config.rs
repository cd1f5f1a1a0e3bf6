// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults of [`InterfaceConfig`]
//! 2. the config file (`--config`, or `plantlink.{yaml,toml,json}` if present)
//! 3. `PLANTLINK_*` environment variables, `__` separating nested keys
//!    (`PLANTLINK_SERVER_IP`, `PLANTLINK_CREDENTIALS__USERNAME`)
//! 4. the `--server` flag
//!
//! The merged result is validated before it is returned.

use std::path::Path;

use config::{Config, Environment, File};
use tracing::debug;

use plantlink_opcua::InterfaceConfig;

use crate::error::{BinError, BinResult};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PLANTLINK";

/// Base name of the optional config file in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "plantlink";

/// Builder-level options that are not part of the file.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions<'a> {
    /// Explicit config file. Must exist when set.
    pub path: Option<&'a Path>,
    /// Server host override.
    pub server_ip: Option<String>,
    /// Server port override.
    pub server_port: Option<u16>,
    /// Read `PLANTLINK_*` variables.
    pub environment: bool,
}

/// Loads and validates the interface configuration.
pub fn load_config(options: LoadOptions<'_>) -> BinResult<InterfaceConfig> {
    let mut builder = Config::builder();

    builder = match options.path {
        Some(path) => {
            if !path.exists() {
                return Err(BinError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder.add_source(File::from(path).required(true))
        }
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
    };

    if options.environment {
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("write_node_patterns")
                .try_parsing(true),
        );
    }

    if let Some(ip) = options.server_ip {
        builder = builder.set_override("server_ip", ip)?;
    }
    if let Some(port) = options.server_port {
        builder = builder.set_override("server_port", i64::from(port))?;
    }

    let config: InterfaceConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    debug!(server = %config.endpoint_url(), "Configuration loaded");
    Ok(config)
}

/// Returns a copy with secrets masked, for display.
pub fn redacted(config: &InterfaceConfig) -> InterfaceConfig {
    let mut config = config.clone();
    if let Some(credentials) = config.credentials.as_mut() {
        if !credentials.password.is_empty() {
            credentials.password = "***".to_string();
        }
    }
    config
}

// =============================================================================
// Tests
// =============================================================================
