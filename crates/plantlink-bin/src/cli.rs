// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `watch`: connect, import and print value changes until Ctrl-C (default)
//! - `browse`: import a subtree once and print it
//! - `read`: read node values
//! - `write`: write one node value
//! - `validate`: validate the configuration
//! - `version`: show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// plantlink - OPC UA client host for plant automation
///
/// Connects to an OPC UA server, imports its address space and follows
/// value changes.
#[derive(Parser, Debug)]
#[command(
    name = "plantlink",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA client host for plant automation",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (yaml, toml or json)
    ///
    /// Without it, `plantlink.{yaml,toml,json}` in the working directory is
    /// used when present.
    #[arg(short, long, env = "PLANTLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server address as HOST or HOST:PORT, overriding the configuration
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "PLANTLINK_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "PLANTLINK_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the plantlink CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Follow value changes until Ctrl-C
    ///
    /// This is the default command when no subcommand is specified. The
    /// host reconnects on its own after the server drops the connection.
    Watch(WatchArgs),

    /// Import a subtree and print it
    Browse(BrowseArgs),

    /// Read node values
    Read(ReadArgs),

    /// Write one node value
    Write(WriteArgs),

    /// Validate the configuration
    ///
    /// Loads and validates the configuration without connecting.
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Nodes to watch. Without any, the imported catalog is watched.
    #[arg(short, long = "node")]
    pub nodes: Vec<String>,

    /// Import root, overriding `top_node_id`
    #[arg(short, long)]
    pub root: Option<String>,

    /// Skip the import on connect
    #[arg(long)]
    pub no_import: bool,

    /// Host loop period
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub tick: Duration,

    /// Output format for value changes
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    /// Import root, overriding `top_node_id`
    pub root: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Include current values
    #[arg(long)]
    pub values: bool,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Node ids to read
    #[arg(required = true)]
    pub node_ids: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node id to write
    pub node_id: String,

    /// Value as text
    pub value: String,

    /// Value type (boolean, byte, int16, int32, double, string, ...)
    #[arg(short = 't', long = "type", default_value = "double")]
    pub data_type: String,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show the parsed configuration after validation
    #[arg(long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format, one document (or one line per value change)
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Watch` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Watch(WatchArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Splits `--server` into host and optional port.
    pub fn server_override(&self) -> Option<(String, Option<u16>)> {
        let raw = self.server.as_deref()?.trim();
        let raw = raw.strip_prefix("opc.tcp://").unwrap_or(raw);
        let raw = raw.trim_end_matches('/');
        match raw.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => Some((host.to_string(), Some(port))),
                Err(_) => Some((raw.to_string(), None)),
            },
            None => Some((raw.to_string(), None)),
        }
    }
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            no_import: false,
            tick: Duration::from_millis(100),
            format: OutputFormat::Text,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
