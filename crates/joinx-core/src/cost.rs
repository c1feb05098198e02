//! # Cost-Oracle Interface
//!
//! The reordering pass does not compute estimates itself; it consumes them
//! from an oracle keyed by plan-node identity. Estimates are explicit
//! [`Estimate::Known`]/[`Estimate::Unknown`] values — an unknown is a
//! first-class answer meaning "skip this decision criterion", never a zero or
//! NaN smuggled through a numeric field.
//!
//! The oracle is assumed side-effect-free and safe to call repeatedly for the
//! same subtree; memoization across repeated calls is the oracle's own
//! concern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::plan::{PlanNode, PlanNodeId};

/// A numeric estimate that may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Estimate {
    Known(f64),
    Unknown,
}

impl Estimate {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Estimate::Unknown)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Known(value) => Some(*value),
            Estimate::Unknown => None,
        }
    }
}

impl From<Option<f64>> for Estimate {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(value) => Estimate::Known(value),
            None => Estimate::Unknown,
        }
    }
}

/// Output estimates for one plan subtree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanCostEstimate {
    pub output_row_count: Estimate,
    pub output_size_in_bytes: Estimate,
}

impl PlanCostEstimate {
    pub fn unknown() -> Self {
        Self {
            output_row_count: Estimate::Unknown,
            output_size_in_bytes: Estimate::Unknown,
        }
    }

    pub fn new(output_row_count: Estimate, output_size_in_bytes: Estimate) -> Self {
        Self {
            output_row_count,
            output_size_in_bytes,
        }
    }
}

/// Supplies output estimates per plan subtree.
pub trait CostOracle: Send + Sync {
    fn cost_for(&self, node: &PlanNode) -> PlanCostEstimate;
}

/// Map-backed oracle for tests and the server protocol: estimates are keyed
/// by node id, and nodes without an entry report unknown on both metrics.
/// Rewritten joins keep their original ids, so entries remain valid across a
/// flip.
#[derive(Debug, Clone, Default)]
pub struct MapCostOracle {
    estimates: HashMap<PlanNodeId, PlanCostEstimate>,
}

impl MapCostOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PlanNodeId, estimate: PlanCostEstimate) {
        self.estimates.insert(id, estimate);
    }

    pub fn with_estimate(mut self, id: PlanNodeId, estimate: PlanCostEstimate) -> Self {
        self.insert(id, estimate);
        self
    }
}

impl CostOracle for MapCostOracle {
    fn cost_for(&self, node: &PlanNode) -> PlanCostEstimate {
        self.estimates
            .get(&node.id())
            .copied()
            .unwrap_or_else(PlanCostEstimate::unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Symbol;

    #[test]
    fn missing_entries_are_unknown_not_zero() {
        let oracle = MapCostOracle::new();
        let node = PlanNode::Scan {
            id: PlanNodeId(1),
            output_symbols: vec![Symbol::new("a")],
        };
        let estimate = oracle.cost_for(&node);
        assert!(estimate.output_row_count.is_unknown());
        assert!(estimate.output_size_in_bytes.is_unknown());
        assert_eq!(estimate.output_row_count.value(), None);
    }

    #[test]
    fn known_estimates_round_trip() {
        let oracle = MapCostOracle::new().with_estimate(
            PlanNodeId(7),
            PlanCostEstimate::new(Estimate::Known(100.0), Estimate::Known(4096.0)),
        );
        let node = PlanNode::Scan {
            id: PlanNodeId(7),
            output_symbols: vec![],
        };
        assert_eq!(oracle.cost_for(&node).output_size_in_bytes.value(), Some(4096.0));
    }
}
