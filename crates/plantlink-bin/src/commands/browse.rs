// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` command.

use std::fmt::Write as _;

use plantlink_opcua::{Node, NodeCatalog, NodeId};

use crate::cli::{BrowseArgs, Cli, OutputFormat};
use crate::error::{BinError, BinResult};

/// Imports the subtree below the root and prints it.
pub async fn browse(cli: &Cli, args: BrowseArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| config.top_node_id.clone());
    let root_key = root_key(&root)?;

    let mut interface = super::connected_interface(config).await?;
    let summary = interface.import_nodes_from(&root).await;
    interface.disconnect().await;

    if summary.connection_closed {
        return Err(BinError::connection("server closed the connection during import"));
    }

    match args.format {
        OutputFormat::Text => {
            print!("{}", render_tree(interface.catalog(), &root_key, args.values));
            if !cli.quiet {
                eprintln!("{summary}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "root": root_key,
                "imported": summary.imported,
                "failed": summary.failed,
                "nodes": catalog_json(interface.catalog(), args.values),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Canonical catalog key of an import root. Empty means the Root folder.
fn root_key(root: &str) -> BinResult<String> {
    if root.trim().is_empty() {
        return Ok(NodeId::ROOT_FOLDER.to_string());
    }
    let id: NodeId = root
        .parse()
        .map_err(|e| BinError::config(format!("invalid root node id '{root}': {e}")))?;
    Ok(id.to_string())
}

/// Renders the catalog as an indented tree below `root`.
pub fn render_tree(catalog: &NodeCatalog, root: &str, values: bool) -> String {
    let mut out = String::new();
    let mut stack: Vec<(&Node, usize)> = catalog.children(root).map(|n| (n, 0)).collect();
    stack.reverse();

    while let Some((node, depth)) = stack.pop() {
        let _ = write!(
            out,
            "{:indent$}{} [{}] {}",
            "",
            node.display_name,
            node.node_id,
            node.type_name,
            indent = depth * 2
        );
        if node.is_variable() {
            let _ = write!(out, " {}", flags(node));
            if values {
                match &node.value {
                    Some(value) => {
                        let _ = write!(out, " = {value}");
                    }
                    None => {
                        let _ = write!(out, " ({})", node.status);
                    }
                }
            }
        }
        out.push('\n');

        let mut children: Vec<_> = catalog
            .children(&node.node_id)
            .map(|n| (n, depth + 1))
            .collect();
        children.reverse();
        stack.extend(children);
    }
    out
}

fn flags(node: &Node) -> String {
    let mut flags = String::with_capacity(3);
    flags.push(if node.read_value { 'r' } else { '-' });
    flags.push(if node.write_value { 'w' } else { '-' });
    flags.push(if node.subscribe_value { 's' } else { '-' });
    flags
}

/// Catalog as a JSON array in import order.
pub fn catalog_json(catalog: &NodeCatalog, values: bool) -> serde_json::Value {
    catalog
        .nodes()
        .map(|node| {
            let mut entry = serde_json::json!({
                "node_id": node.node_id,
                "display_name": node.display_name,
                "parent_id": node.parent_id,
                "node_class": node.node_class.to_string(),
                "type": node.type_name,
                "status": node.status.to_string(),
                "read": node.read_value,
                "write": node.write_value,
                "subscribe": node.subscribe_value,
            });
            if values {
                entry["value"] = match &node.value {
                    Some(value) => serde_json::Value::String(value.to_string()),
                    None => serde_json::Value::Null,
                };
            }
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantlink_opcua::{NodeClass, OpcUaValue};

    fn catalog() -> NodeCatalog {
        let mut catalog = NodeCatalog::new();
        let mut conveyor = Node::new("ns=2;s=Conveyor".parse().unwrap(), "Conveyor", NodeClass::Object)
            .with_parent("ns=2;s=Line");
        conveyor.type_name = "Object".into();
        catalog.insert(conveyor);

        let mut speed = Node::new("ns=2;s=Speed".parse().unwrap(), "Speed", NodeClass::Variable)
            .with_parent("ns=2;s=Conveyor");
        speed.type_name = "Double".into();
        speed.read_value = true;
        speed.subscribe_value = true;
        speed.value = Some(OpcUaValue::Double(1.5));
        catalog.insert(speed);

        let mut lamp = Node::new("ns=2;s=Lamp".parse().unwrap(), "Lamp", NodeClass::Variable)
            .with_parent("ns=2;s=Line");
        lamp.type_name = "Boolean".into();
        lamp.write_value = true;
        catalog.insert(lamp);
        catalog
    }

    #[test]
    fn test_render_tree_indents_children() {
        let tree = render_tree(&catalog(), "ns=2;s=Line", false);
        assert_eq!(
            tree,
            "Conveyor [ns=2;s=Conveyor] Object\n  Speed [ns=2;s=Speed] Double r-s\nLamp [ns=2;s=Lamp] Boolean -w-\n"
        );
    }

    #[test]
    fn test_render_tree_with_values() {
        let tree = render_tree(&catalog(), "ns=2;s=Line", true);
        assert!(tree.contains("Speed [ns=2;s=Speed] Double r-s = 1.5"));
        assert!(tree.contains("Lamp [ns=2;s=Lamp] Boolean -w- ("));
    }

    #[test]
    fn test_catalog_json() {
        let json = catalog_json(&catalog(), true);
        let nodes = json.as_array().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1]["node_id"], "ns=2;s=Speed");
        assert_eq!(nodes[1]["parent_id"], "ns=2;s=Conveyor");
        assert_eq!(nodes[1]["value"], "1.5");
        assert!(nodes[2]["value"].is_null());
    }

    #[test]
    fn test_root_key_normalizes() {
        assert_eq!(root_key("").unwrap(), "i=84");
        assert_eq!(root_key("ns=0;i=85").unwrap(), "i=85");
        assert!(root_key("ns=x").is_err());
    }
}
