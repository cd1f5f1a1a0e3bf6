// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use plantlink_opcua::InterfaceConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::redacted;
use crate::error::{BinError, BinResult};

/// Loads and validates the configuration without connecting.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let warnings = warnings(&config);
    let source = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults and environment".to_string());

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {source}");
            println!();
            println!("Summary:");
            println!("  Server: {}", config.endpoint_url());
            println!("  Session: {} ({:?})", config.session_name, config.session_timeout);
            println!(
                "  Top node: {}",
                config.top_node().unwrap_or("Root folder")
            );
            println!(
                "  Identity: {}",
                match config.active_credentials() {
                    Some(c) => format!("username '{}'", c.username),
                    None => "anonymous".to_string(),
                }
            );
            println!("  Reconnect: {:?}", config.reconnect_interval);
            println!("  Write patterns: {}", config.write_node_patterns.len());

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {warning}");
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            }
        }
        OutputFormat::Json => {
            let shown = redacted(&config);
            let output = serde_json::json!({
                "valid": true,
                "source": source,
                "endpoint_url": config.endpoint_url(),
                "warnings": warnings,
                "config": if args.show_config { Some(&shown) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }
    Ok(())
}

/// Settings that are valid but probably not what the operator meant.
pub fn warnings(config: &InterfaceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.top_node().is_none() {
        warnings.push("No top_node_id: imports start at the Root folder".to_string());
    }
    if config.reconnect_interval.is_zero() {
        warnings.push("reconnect_interval is 0: reconnecting is disabled".to_string());
    }
    if config.certificates.is_some() && config.certificate_pair().is_none() {
        warnings.push("Certificate pair incomplete: connecting without certificates".to_string());
    }
    if let Some(credentials) = &config.credentials {
        if credentials.username.trim().is_empty() {
            warnings.push("Credentials without username: activating anonymously".to_string());
        }
    }
    if config.max_nodes_per_subscription == 0 && config.auto_subscribe_on_import {
        warnings.push(
            "max_nodes_per_subscription is 0: all imported nodes share one subscription".to_string(),
        );
    }
    warnings
}
