// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `watch`: follow value changes until Ctrl-C
//! - `browse`: import a subtree and print it
//! - `read` / `write`: single-node value access
//! - `validate`: validate the configuration
//! - `version`: show version information

mod browse;
mod validate;
mod values;
mod version;
mod watch;

pub use browse::{browse, catalog_json, render_tree};
pub use validate::{validate, warnings};
pub use values::{read, write};
pub use version::version;
pub use watch::watch;

use plantlink_opcua::{InterfaceConfig, OpcUaInterface, RealOpcUaTransport};

use crate::cli::{Cli, Commands};
use crate::config::{load_config, LoadOptions};
use crate::error::{BinError, BinResult};

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Watch(args) => watch::watch(&cli, args).await,
        Commands::Browse(args) => browse::browse(&cli, args).await,
        Commands::Read(args) => values::read(&cli, args).await,
        Commands::Write(args) => values::write(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration the global flags point at.
pub(crate) fn load(cli: &Cli) -> BinResult<InterfaceConfig> {
    let (server_ip, server_port) = match cli.server_override() {
        Some((host, port)) => (Some(host), port),
        None => (None, None),
    };
    load_config(LoadOptions {
        path: cli.config.as_deref(),
        server_ip,
        server_port,
        environment: true,
    })
}

/// Builds an interface over the real transport and connects it.
pub(crate) async fn connected_interface(
    config: InterfaceConfig,
) -> BinResult<OpcUaInterface<RealOpcUaTransport>> {
    let endpoint = config.endpoint_url();
    let mut interface = OpcUaInterface::new(RealOpcUaTransport::new(), config)?;
    if !interface.connect().await {
        interface.cancel_reconnect();
        return Err(BinError::connection(format!("cannot connect to {endpoint}")));
    }
    Ok(interface)
}
