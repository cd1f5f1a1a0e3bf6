// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Depth-first import of a server subtree into a [`NodeCatalog`].

use std::fmt;

use crate::catalog::{Node, NodeCatalog, SubscriptionPolicy};
use crate::client::access::{error_status, read_attribute, ValueRead};
use crate::client::{OpcUaTransport, OpcUaValue, ReferenceDescription};
use crate::error::{ConversionError, OpcUaError};
use crate::types::{AccessLevel, AttributeId, NodeClass, NodeId, StatusCode};

/// Type name recorded for Object nodes.
const OBJECT_TYPE_NAME: &str = "Object";

/// Counters of a finished import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Objects and variables visited.
    pub imported: usize,
    /// Nodes that were not yet in the catalog.
    pub created: usize,
    /// Browse requests that failed.
    pub failed: usize,
    /// The import stopped because the server closed the connection.
    pub connection_closed: bool,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "imported {} nodes, created {} new nodes",
            self.imported, self.created
        )
    }
}

/// One level of the browse walk.
struct Frame {
    parent_id: String,
    references: Vec<ReferenceDescription>,
    next: usize,
}

/// Walks the hierarchy below a root node and fills a catalog.
///
/// Objects are descended into before their next sibling is visited, so the
/// catalog order is a pre-order of the browsed tree. The walk is iterative;
/// deep hierarchies do not grow the call stack.
pub struct NodeImporter<'a, T: OpcUaTransport + ?Sized> {
    transport: &'a T,
    policy: &'a SubscriptionPolicy,
}

impl<'a, T: OpcUaTransport + ?Sized> NodeImporter<'a, T> {
    /// Creates an importer.
    pub fn new(transport: &'a T, policy: &'a SubscriptionPolicy) -> Self {
        Self { transport, policy }
    }

    /// Imports everything below `root` into `catalog`.
    pub async fn import(&self, catalog: &mut NodeCatalog, root: &NodeId) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let mut stack = Vec::new();

        match self.browse(root, &mut summary).await {
            Some(references) => stack.push(Frame {
                parent_id: root.to_string(),
                references,
                next: 0,
            }),
            None => return summary,
        }

        while let Some(frame) = stack.last_mut() {
            let Some(reference) = frame.references.get(frame.next).cloned() else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let parent_id = frame.parent_id.clone();

            if !reference.node_class.is_importable() {
                tracing::trace!(
                    node_id = %reference.node_id,
                    node_class = %reference.node_class,
                    "Skipping reference"
                );
                continue;
            }

            let closed = self.import_node(catalog, &reference, &parent_id, &mut summary).await;
            if closed {
                summary.connection_closed = true;
                break;
            }

            if reference.node_class == NodeClass::Object {
                match self.browse(&reference.node_id, &mut summary).await {
                    Some(references) => stack.push(Frame {
                        parent_id: reference.node_id.to_string(),
                        references,
                        next: 0,
                    }),
                    None if summary.connection_closed => break,
                    None => {}
                }
            }
        }

        tracing::info!(
            root = %root,
            imported = summary.imported,
            created = summary.created,
            failed = summary.failed,
            "{}",
            summary
        );
        summary
    }

    /// Browses one node. `None` means the failure was already recorded.
    async fn browse(
        &self,
        node_id: &NodeId,
        summary: &mut ImportSummary,
    ) -> Option<Vec<ReferenceDescription>> {
        match self.transport.browse(node_id).await {
            Ok(references) => Some(references),
            Err(e) => {
                summary.failed += 1;
                if error_status(&e).is_connection_closed() {
                    summary.connection_closed = true;
                }
                e.log("browse");
                None
            }
        }
    }

    /// Creates or updates one node. Returns `true` if the connection closed.
    async fn import_node(
        &self,
        catalog: &mut NodeCatalog,
        reference: &ReferenceDescription,
        parent_id: &str,
        summary: &mut ImportSummary,
    ) -> bool {
        let key = reference.node_id.to_string();
        let access = read_attribute(self.transport, &reference.node_id, AttributeId::AccessLevel).await;
        if access.is_connection_closed() {
            return true;
        }

        let (node, created) = catalog.find_or_insert_with(&key, || {
            Node::new(
                reference.node_id.clone(),
                reference.display_name.clone(),
                reference.node_class,
            )
            .with_parent(parent_id)
        });
        summary.imported += 1;
        if created {
            summary.created += 1;
        }

        node.identifier_type = reference.node_id.identifier_type().to_string();
        node.identifier = reference.node_id.identifier_text();
        node.display_name = reference.display_name.clone();
        node.access_level = access
            .value
            .as_ref()
            .and_then(OpcUaValue::as_i64)
            .and_then(|v| u8::try_from(v).ok())
            .map(AccessLevel)
            .unwrap_or_default();
        node.status = access.status;

        if reference.node_class == NodeClass::Object {
            node.type_name = OBJECT_TYPE_NAME.to_string();
            tracing::debug!(node_id = %key, "Imported object");
            return false;
        }

        match self.data_type_name(&reference.node_id).await {
            Ok(Some(name)) => node.type_name = name,
            Ok(None) => {}
            Err(()) => return true,
        }

        let read = read_attribute(self.transport, &reference.node_id, AttributeId::Value).await;
        if read.is_connection_closed() {
            return true;
        }
        match read {
            ValueRead {
                value: Some(value),
                status,
            } if status.is_good() => {
                node.value = Some(value);
                if created {
                    self.policy.apply(node);
                }
            }
            ValueRead { status, .. } => {
                node.value = None;
                node.subscribe_value = false;
                node.status = if status.is_good() {
                    StatusCode::BAD_NO_DATA
                } else {
                    status
                };
            }
        }

        tracing::debug!(
            node_id = %key,
            type_name = %node.type_name,
            status = %node.status,
            "Imported variable"
        );
        false
    }

    /// Resolves the display name of a variable's DataType node.
    ///
    /// `Err` means the connection closed.
    async fn data_type_name(&self, node_id: &NodeId) -> Result<Option<String>, ()> {
        let data_type = read_attribute(self.transport, node_id, AttributeId::DataType).await;
        if data_type.is_connection_closed() {
            return Err(());
        }
        let type_id = match &data_type.value {
            Some(OpcUaValue::NodeId(id)) => id,
            Some(other) => {
                OpcUaError::conversion(ConversionError::type_mismatch("NodeId", other.type_name()))
                    .log("resolve data type");
                return Ok(None);
            }
            None => return Ok(None),
        };

        let name = read_attribute(self.transport, type_id, AttributeId::DisplayName).await;
        if name.is_connection_closed() {
            return Err(());
        }
        Ok(Some(
            name.value
                .as_ref()
                .and_then(OpcUaValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| type_id.to_string()),
        ))
    }
}
