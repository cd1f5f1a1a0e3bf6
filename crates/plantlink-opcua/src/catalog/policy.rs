// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Default capability flags for newly imported variables.

use regex::Regex;

use crate::catalog::Node;
use crate::config::InterfaceConfig;
use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};

/// Decides read/write/subscribe flags for a newly created variable.
///
/// Rules, first match wins:
///
/// 1. status not Good: inert (no flag set);
/// 2. id matches a write pattern, or `auto_input_on_write` and the node has
///    CurrentWrite access: write-only;
/// 3. otherwise: read, subscribed if `auto_subscribe_on_import`.
#[derive(Debug, Clone)]
pub struct SubscriptionPolicy {
    write_patterns: Vec<Regex>,
    auto_input_on_write: bool,
    auto_subscribe: bool,
}

impl SubscriptionPolicy {
    /// Compiles the policy from its settings.
    pub fn new(
        write_patterns: &[String],
        auto_input_on_write: bool,
        auto_subscribe: bool,
    ) -> OpcUaResult<Self> {
        let write_patterns = write_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    OpcUaError::configuration(ConfigurationError::invalid_pattern(p, e.to_string()))
                })
            })
            .collect::<OpcUaResult<Vec<_>>>()?;

        Ok(Self {
            write_patterns,
            auto_input_on_write,
            auto_subscribe,
        })
    }

    /// Compiles the policy from an interface configuration.
    pub fn from_config(config: &InterfaceConfig) -> OpcUaResult<Self> {
        Self::new(
            &config.write_node_patterns,
            config.auto_input_on_write,
            config.auto_subscribe_on_import,
        )
    }

    /// Returns `true` if `node_id` matches any write pattern.
    pub fn matches_write_pattern(&self, node_id: &str) -> bool {
        self.write_patterns.iter().any(|r| r.is_match(node_id))
    }

    /// Applies the rules to `node`.
    pub fn apply(&self, node: &mut Node) {
        if !node.status.is_good() {
            node.make_inert();
            return;
        }

        let write_only = self.matches_write_pattern(&node.node_id)
            || (self.auto_input_on_write && node.access_level.can_write());

        if write_only {
            node.write_value = true;
            node.read_value = false;
            node.subscribe_value = false;
        } else {
            node.read_value = true;
            node.write_value = false;
            node.subscribe_value = self.auto_subscribe;
        }

        tracing::trace!(
            node_id = %node.node_id,
            read = node.read_value,
            write = node.write_value,
            subscribe = node.subscribe_value,
            "Applied subscription policy"
        );
    }
}

impl Default for SubscriptionPolicy {
    fn default() -> Self {
        Self {
            write_patterns: Vec::new(),
            auto_input_on_write: false,
            auto_subscribe: true,
        }
    }
}
