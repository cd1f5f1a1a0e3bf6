// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # plantlink-bin
//!
//! Command line host for the plantlink OPC UA interface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ config   │ │ logging  │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────▼──────┐   ┌─────────────┐
//!      │   runtime   │◄──│  shutdown   │
//!      └──────┬──────┘   └─────────────┘
//!             │
//!      ┌──────▼──────────┐
//!      │ plantlink-opcua │
//!      └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Follow every subscribed node below top_node_id (default command)
//! plantlink -c line1.yaml
//!
//! # Print the address space below a node
//! plantlink -s 10.0.0.5:4840 browse "ns=2;s=Line1" --values
//!
//! # Read and write single values
//! plantlink read "ns=2;s=Line1.Speed" "ns=2;s=Line1.Running"
//! plantlink write "ns=2;s=Line1.Cmd" true -t boolean
//!
//! # Check a configuration file
//! plantlink -c line1.yaml validate --strict
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{HostRuntime, RunSummary, ValuePrinter, WatchPlan};
pub use shutdown::{ShutdownCoordinator, ShutdownToken};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
