// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Imported node catalog.
//!
//! The catalog is a flat, insertion-ordered map of every node an import has
//! visited, keyed by node id string. Each node remembers its parent so the
//! hierarchy can be rebuilt. Imports only ever add or update nodes.
//!
//! - [`NodeImporter`]: depth-first browse of a server subtree
//! - [`SubscriptionPolicy`]: read/write/subscribe defaults for new variables

mod import;
mod policy;

pub use import::{ImportSummary, NodeImporter};
pub use policy::SubscriptionPolicy;

use std::collections::HashMap;
use std::fmt;

use crate::client::OpcUaValue;
use crate::types::{AccessLevel, NodeClass, NodeId, StatusCode};

// =============================================================================
// Node
// =============================================================================

/// One imported Object or Variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id in OPC UA string format; the catalog key.
    pub node_id: String,
    /// Parsed node id.
    pub id: NodeId,
    /// Display name.
    pub display_name: String,
    /// Node id of the browsed parent.
    pub parent_id: Option<String>,
    /// Node class.
    pub node_class: NodeClass,
    /// Identifier kind: Numeric, String, Guid or Opaque.
    pub identifier_type: String,
    /// Raw identifier text.
    pub identifier: String,
    /// Display name of the DataType node, or "Object".
    pub type_name: String,
    /// AccessLevel attribute.
    pub access_level: AccessLevel,
    /// Last known value.
    pub value: Option<OpcUaValue>,
    /// Last known status.
    pub status: StatusCode,
    /// Value should be read by the consumer.
    pub read_value: bool,
    /// Value may be written by the consumer.
    pub write_value: bool,
    /// Value should be subscribed.
    pub subscribe_value: bool,
    /// Value is polled by [`poll_inputs`](crate::OpcUaInterface::poll_inputs).
    pub poll_input: bool,
}

impl Node {
    /// Creates a node with all capability flags cleared.
    pub fn new(id: NodeId, display_name: impl Into<String>, node_class: NodeClass) -> Self {
        Self {
            node_id: id.to_string(),
            identifier_type: id.identifier_type().to_string(),
            identifier: id.identifier_text(),
            id,
            display_name: display_name.into(),
            parent_id: None,
            node_class,
            type_name: String::new(),
            access_level: AccessLevel::default(),
            value: None,
            status: StatusCode::GOOD,
            read_value: false,
            write_value: false,
            subscribe_value: false,
            poll_input: false,
        }
    }

    /// Sets the parent id.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Returns `true` for Variable nodes.
    pub fn is_variable(&self) -> bool {
        self.node_class == NodeClass::Variable
    }

    /// Clears every capability flag.
    pub fn make_inert(&mut self) {
        self.read_value = false;
        self.write_value = false;
        self.subscribe_value = false;
        self.poll_input = false;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.display_name, self.node_id, self.type_name)
    }
}

// =============================================================================
// NodeCatalog
// =============================================================================

/// Insertion-ordered map of imported nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks a node up by id.
    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// Looks a node up by id, mutably.
    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.index.get(node_id).map(|&i| &mut self.nodes[i])
    }

    /// Returns `true` if the node is in the catalog.
    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    /// Iterates nodes in import order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Iterates nodes in import order, mutably.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    /// Returns the direct children of a node in import order.
    pub fn children<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(node_id))
    }

    /// Inserts a node, replacing any node with the same id in place.
    pub fn insert(&mut self, node: Node) -> &mut Node {
        match self.index.get(&node.node_id) {
            Some(&i) => {
                self.nodes[i] = node;
                &mut self.nodes[i]
            }
            None => {
                let i = self.nodes.len();
                self.index.insert(node.node_id.clone(), i);
                self.nodes.push(node);
                &mut self.nodes[i]
            }
        }
    }

    /// Returns the node with `node_id`, creating it with `create` if absent.
    ///
    /// The flag is `true` when the node was created.
    pub fn find_or_insert_with<F>(&mut self, node_id: &str, create: F) -> (&mut Node, bool)
    where
        F: FnOnce() -> Node,
    {
        if let Some(&i) = self.index.get(node_id) {
            return (&mut self.nodes[i], false);
        }
        (self.insert(create()), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(id: &str, parent: &str) -> Node {
        Node::new(id.parse().unwrap(), id, NodeClass::Variable).with_parent(parent)
    }

    #[test]
    fn test_node_identifier_fields() {
        let node = Node::new(NodeId::numeric(3, 1001), "Speed", NodeClass::Variable);
        assert_eq!(node.node_id, "ns=3;i=1001");
        assert_eq!(node.identifier_type, "Numeric");
        assert_eq!(node.identifier, "1001");
        assert!(!node.read_value && !node.write_value && !node.subscribe_value);
    }

    #[test]
    fn test_catalog_keeps_insertion_order() {
        let mut catalog = NodeCatalog::new();
        catalog.insert(variable("ns=2;s=C", "i=84"));
        catalog.insert(variable("ns=2;s=A", "i=84"));
        catalog.insert(variable("ns=2;s=B", "ns=2;s=A"));

        let ids: Vec<_> = catalog.nodes().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["ns=2;s=C", "ns=2;s=A", "ns=2;s=B"]);

        let children: Vec<_> = catalog.children("i=84").map(|n| n.node_id.as_str()).collect();
        assert_eq!(children, vec!["ns=2;s=C", "ns=2;s=A"]);
    }

    #[test]
    fn test_find_or_insert_is_additive() {
        let mut catalog = NodeCatalog::new();
        let (node, created) = catalog.find_or_insert_with("ns=2;s=A", || variable("ns=2;s=A", "i=84"));
        assert!(created);
        node.read_value = true;

        let (node, created) = catalog.find_or_insert_with("ns=2;s=A", || panic!("must not recreate"));
        assert!(!created);
        assert!(node.read_value);
        assert_eq!(catalog.len(), 1);
    }
}
