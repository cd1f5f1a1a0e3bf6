// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.

use plantlink_opcua::{OpcUaInterface, RealOpcUaTransport};
use tracing::info;

use crate::cli::{Cli, WatchArgs};
use crate::error::BinResult;
use crate::runtime::{HostRuntime, WatchPlan};
use crate::shutdown::ShutdownCoordinator;

/// Runs the host loop until SIGINT or SIGTERM.
pub async fn watch(cli: &Cli, args: WatchArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    info!(server = %config.endpoint_url(), "Watching OPC UA server");

    let interface = OpcUaInterface::new(RealOpcUaTransport::new(), config)?;
    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_signals();

    let plan = WatchPlan {
        nodes: args.nodes,
        root: args.root,
        import: !args.no_import,
        tick: args.tick,
        format: args.format,
    };

    let summary = HostRuntime::new(interface, plan, shutdown).run().await?;
    if !cli.quiet {
        eprintln!(
            "{} value changes, {} connects, {} connection losses",
            summary.values, summary.connects, summary.disconnects
        );
    }
    Ok(())
}
