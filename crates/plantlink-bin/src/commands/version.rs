// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version and build information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("plantlink - OPC UA client host for plant automation");
    println!();
    println!("Version Information:");
    println!("  plantlink:       {}", crate::VERSION);
    println!("  plantlink-opcua: {}", plantlink_opcua::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("OPC UA:");
    println!("  Security policy: None");
    println!("  Identity:        anonymous, username/password");
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
