// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` and `write` commands.

use plantlink_opcua::{OpcUaValue, ScalarType, ValueRead};

use crate::cli::{Cli, OutputFormat, ReadArgs, WriteArgs};
use crate::error::{BinError, BinResult};

/// Reads each node and prints value and status.
///
/// Every node is printed; the command fails afterwards if any read was bad.
pub async fn read(cli: &Cli, args: ReadArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let mut interface = super::connected_interface(config).await?;

    let mut reads = Vec::with_capacity(args.node_ids.len());
    for node_id in &args.node_ids {
        let read = interface.read_node_value_with_status(node_id).await;
        reads.push((node_id.as_str(), read));
        if !interface.is_connected() {
            break;
        }
    }
    interface.disconnect().await;

    match args.format {
        OutputFormat::Text => {
            for (node_id, read) in &reads {
                println!("{}", format_read(node_id, read));
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = reads
                .iter()
                .map(|(node_id, read)| read_json(node_id, read))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    let bad = reads.iter().filter(|(_, read)| !read.is_good()).count();
    if bad > 0 || reads.len() < args.node_ids.len() {
        return Err(BinError::operation(format!(
            "{} of {} reads failed",
            bad + args.node_ids.len() - reads.len(),
            args.node_ids.len()
        )));
    }
    Ok(())
}

/// Parses the value as the requested type and writes it.
pub async fn write(cli: &Cli, args: WriteArgs) -> BinResult<()> {
    let value = parse_value(&args.data_type, &args.value)?;
    let config = super::load(cli)?;
    let mut interface = super::connected_interface(config).await?;

    let status = interface
        .write_node_value_with_status(&args.node_id, &value)
        .await;
    interface.disconnect().await;

    if !status.is_good() {
        return Err(BinError::operation(format!("write {}: {status}", args.node_id)));
    }
    if !cli.quiet {
        println!("{} <- {value} ({})", args.node_id, value.type_name());
    }
    Ok(())
}

fn parse_value(data_type: &str, text: &str) -> BinResult<OpcUaValue> {
    let data_type: ScalarType = data_type.parse()?;
    Ok(OpcUaValue::parse_as(data_type, text)?)
}

fn format_read(node_id: &str, read: &ValueRead) -> String {
    match &read.value {
        Some(value) if read.is_good() => format!("{node_id} = {value} ({})", value.type_name()),
        Some(value) => format!("{node_id} = {value} [{}]", read.status),
        None => format!("{node_id}: {}", read.status),
    }
}

fn read_json(node_id: &str, read: &ValueRead) -> serde_json::Value {
    serde_json::json!({
        "node_id": node_id,
        "status": read.status.to_string(),
        "type": read.value.as_ref().map(OpcUaValue::type_name),
        "value": read.value.as_ref().map(ToString::to_string),
    })
}
