//! Bounding the cost of caller supplied extend queries

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{SchemaError, SchemaResult, SelectionLimit};

/// Budgets a raw extend query must stay within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardConfig {
    /// Deepest level a selection may reach; the root is level 0
    pub max_depth: usize,
    /// Most keys across all nodes of a single level
    pub max_nodes_per_level: usize,
    /// Most keys in the whole tree
    pub max_total_nodes: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_nodes_per_level: 64,
            max_total_nodes: 512,
        }
    }
}

impl GuardConfig {
    /// A guard with fresh counters
    pub fn guard(&self) -> SelectionGuard {
        SelectionGuard {
            config: *self,
            per_level: Vec::new(),
            total: 0,
        }
    }

    /// Check a single extend query with fresh counters
    pub fn check(&self, raw: &Value) -> SchemaResult<()> {
        self.guard().check(raw)
    }
}

/// Counts the nodes of extend queries against a [GuardConfig].
///
/// Counters accumulate over every tree passed to the same guard, so a guard
/// shared by several trees bounds their combined cost. Use
/// [GuardConfig::check] to bound a single tree.
#[derive(Debug, Clone)]
pub struct SelectionGuard {
    config: GuardConfig,
    per_level: Vec<usize>,
    total: usize,
}

impl SelectionGuard {
    /// Walk `raw` depth first, failing as soon as a budget is exceeded
    pub fn check(&mut self, raw: &Value) -> SchemaResult<()> {
        self.visit(raw, 0)
    }

    fn visit(&mut self, raw: &Value, depth: usize) -> SchemaResult<()> {
        if depth > self.config.max_depth {
            return Err(exceeded(SelectionLimit::Depth));
        }

        let Value::Object(fields) = raw else {
            return Ok(());
        };

        self.total += fields.len();
        if self.total > self.config.max_total_nodes {
            return Err(exceeded(SelectionLimit::Nodes));
        }

        if self.per_level.len() <= depth {
            self.per_level.resize(depth + 1, 0);
        }
        self.per_level[depth] += fields.len();
        if self.per_level[depth] > self.config.max_nodes_per_level {
            return Err(exceeded(SelectionLimit::Weight));
        }

        for nested in fields.values() {
            self.visit(nested, depth + 1)?;
        }
        Ok(())
    }
}

fn exceeded(limit: SelectionLimit) -> SchemaError {
    tracing::debug!(%limit, "Extend query rejected");
    SchemaError::SelectionLimit { limit }
}
