//! # Join Reordering Pass
//!
//! A single top-down pass that, for every binary join, decides whether to
//! flip its sides based on the cost oracle's output estimates for the two
//! (already rewritten) children. The engine's physical join operator prefers
//! the larger input on the left, so the pass flips whenever the left side is
//! estimated strictly smaller than the right.
//!
//! ## Decision Order
//!
//! Output size in bytes is consulted first. Only when either side's size is
//! unknown does the pass fall back to row counts; when both metrics are
//! unknown on either side, no flip happens. Size takes absolute precedence:
//! equal known sizes mean "no flip" even if the row counts differ.
//!
//! ## Flip Mechanics
//!
//! Flipping swaps the subtrees, mirrors the join type (LEFT becomes RIGHT
//! and vice versa — the preserved side moves with its subtree, so outer-row
//! semantics are unchanged), reverses every equi-join clause, and exchanges
//! the per-side hash-symbol hints. The node id and output symbols stay.
//!
//! ## Identity Preservation
//!
//! When neither a flip nor any child rewrite happens, the pass returns the
//! input `Arc` itself, so callers can detect a no-op with a pointer
//! comparison.

use std::sync::Arc;

use tracing::debug;

use joinx_core::cost::{CostOracle, Estimate};
use joinx_core::plan::{JoinNode, JoinType, PlanNode, PlanNodeIdAllocator, PlanRef};
use joinx_core::session::SessionProperties;

use crate::PlanOptimizer;

pub struct JoinReorderingOptimizer {
    cost_oracle: Arc<dyn CostOracle>,
}

impl JoinReorderingOptimizer {
    pub fn new(cost_oracle: Arc<dyn CostOracle>) -> Self {
        Self { cost_oracle }
    }

    fn rewrite(&self, node: &PlanRef) -> PlanRef {
        match &**node {
            PlanNode::Join(join) => self.rewrite_join(node, join),
            _ => self.rewrite_children(node),
        }
    }

    /// Rewrite a non-join node by rewriting its children and reconstructing
    /// only if any of them changed identity.
    fn rewrite_children(&self, node: &PlanRef) -> PlanRef {
        let children = node.children();
        if children.is_empty() {
            return node.clone();
        }
        let rewritten: Vec<PlanRef> = children.iter().map(|child| self.rewrite(child)).collect();
        let unchanged = children
            .iter()
            .zip(rewritten.iter())
            .all(|(before, after)| Arc::ptr_eq(before, after));
        if unchanged {
            node.clone()
        } else {
            Arc::new(node.with_children(rewritten))
        }
    }

    fn rewrite_join(&self, node: &PlanRef, join: &JoinNode) -> PlanRef {
        // Children first: the flip decision must see their final costs.
        let left = self.rewrite(&join.left);
        let right = self.rewrite(&join.right);

        let left_cost = self.cost_oracle.cost_for(&left);
        let right_cost = self.cost_oracle.cost_for(&right);

        let flip_needed = match (
            left_cost.output_size_in_bytes,
            right_cost.output_size_in_bytes,
        ) {
            (Estimate::Known(left_size), Estimate::Known(right_size)) => left_size < right_size,
            _ => match (left_cost.output_row_count, right_cost.output_row_count) {
                (Estimate::Known(left_count), Estimate::Known(right_count)) => {
                    left_count < right_count
                }
                _ => false,
            },
        };

        if flip_needed {
            debug!(
                join = %join.id,
                "flipping join sides: left={:?} right={:?}",
                left_cost, right_cost
            );
            return Arc::new(PlanNode::Join(JoinNode {
                id: join.id,
                join_type: flip_join_type(join.join_type),
                left: right,
                right: left,
                criteria: join.criteria.iter().map(|clause| clause.flip()).collect(),
                output_symbols: join.output_symbols.clone(),
                filter: join.filter.clone(),
                left_hash_symbol: join.right_hash_symbol.clone(),
                right_hash_symbol: join.left_hash_symbol.clone(),
            }));
        }

        if !Arc::ptr_eq(&left, &join.left) || !Arc::ptr_eq(&right, &join.right) {
            return Arc::new(PlanNode::Join(JoinNode {
                left,
                right,
                ..join.clone()
            }));
        }

        node.clone()
    }
}

/// Mirror a join type for a side flip. The match is exhaustive on purpose: a
/// new join variant must decide its flip behavior here before it compiles.
fn flip_join_type(join_type: JoinType) -> JoinType {
    match join_type {
        JoinType::Left => JoinType::Right,
        JoinType::Right => JoinType::Left,
        JoinType::Inner | JoinType::Full => join_type,
    }
}

impl PlanOptimizer for JoinReorderingOptimizer {
    fn optimize(
        &self,
        plan: &PlanRef,
        session: &SessionProperties,
        _id_allocator: &mut PlanNodeIdAllocator,
    ) -> PlanRef {
        if !session.reorder_joins {
            return plan.clone();
        }
        self.rewrite(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joinx_core::cost::{MapCostOracle, PlanCostEstimate};
    use joinx_core::plan::{EquiJoinClause, PlanNodeId, Symbol};

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    fn scan(id: u32, symbols: &[&str]) -> PlanRef {
        Arc::new(PlanNode::Scan {
            id: PlanNodeId(id),
            output_symbols: symbols.iter().map(|s| sym(s)).collect(),
        })
    }

    fn join(id: u32, join_type: JoinType, left: PlanRef, right: PlanRef, criteria: Vec<EquiJoinClause>) -> PlanRef {
        let output_symbols = left
            .output_symbols()
            .iter()
            .chain(right.output_symbols())
            .cloned()
            .collect();
        Arc::new(PlanNode::Join(JoinNode {
            id: PlanNodeId(id),
            join_type,
            left,
            right,
            criteria,
            output_symbols,
            filter: None,
            left_hash_symbol: None,
            right_hash_symbol: None,
        }))
    }

    fn sized(rows: f64, bytes: f64) -> PlanCostEstimate {
        PlanCostEstimate::new(Estimate::Known(rows), Estimate::Known(bytes))
    }

    fn counted(rows: f64) -> PlanCostEstimate {
        PlanCostEstimate::new(Estimate::Known(rows), Estimate::Unknown)
    }

    fn optimize(oracle: MapCostOracle, plan: &PlanRef) -> PlanRef {
        let optimizer = JoinReorderingOptimizer::new(Arc::new(oracle));
        let session = SessionProperties::with_reorder_joins(true);
        optimizer.optimize(plan, &session, &mut PlanNodeIdAllocator::new(100))
    }

    #[test]
    fn flips_inner_join_when_left_is_smaller() {
        let left = scan(0, &["a"]);
        let right = scan(1, &["b"]);
        let plan = join(
            2,
            JoinType::Inner,
            left,
            right,
            vec![EquiJoinClause::new(sym("a"), sym("b"))],
        );
        // Left already larger (100 vs 10 bytes): stays put.
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(10.0, 100.0))
            .with_estimate(PlanNodeId(1), sized(1000.0, 10.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        assert_eq!(result.left.id(), PlanNodeId(0));

        // Reversed sizes flip the join and its clauses.
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1000.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(10.0, 100.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        assert_eq!(result.join_type, JoinType::Inner);
        assert_eq!(result.left.id(), PlanNodeId(1));
        assert_eq!(result.right.id(), PlanNodeId(0));
        assert_eq!(
            result.criteria,
            vec![EquiJoinClause::new(sym("b"), sym("a"))]
        );
    }

    #[test]
    fn flipped_left_join_becomes_right_join() {
        let plan = join(
            2,
            JoinType::Left,
            scan(0, &["a"]),
            scan(1, &["b"]),
            vec![EquiJoinClause::new(sym("a"), sym("b"))],
        );
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(1.0, 100.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        // The left-preserving side moved to the right, so the type mirrors.
        assert_eq!(result.join_type, JoinType::Right);
        assert_eq!(result.left.id(), PlanNodeId(1));
        assert_eq!(result.right.id(), PlanNodeId(0));
    }

    #[test]
    fn full_join_keeps_type_when_flipped() {
        let plan = join(2, JoinType::Full, scan(0, &["a"]), scan(1, &["b"]), vec![]);
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(1.0, 100.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        assert_eq!(result.join_type, JoinType::Full);
        assert_eq!(result.left.id(), PlanNodeId(1));
    }

    #[test]
    fn unknown_costs_leave_the_node_reference_identical() {
        let plan = join(
            2,
            JoinType::Inner,
            scan(0, &["a"]),
            scan(1, &["b"]),
            vec![EquiJoinClause::new(sym("a"), sym("b"))],
        );
        let result = optimize(MapCostOracle::new(), &plan);
        assert!(Arc::ptr_eq(&result, &plan));
    }

    #[test]
    fn equal_row_counts_do_not_flip() {
        let plan = join(2, JoinType::Inner, scan(0, &["a"]), scan(1, &["b"]), vec![]);
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), counted(50.0))
            .with_estimate(PlanNodeId(1), counted(50.0));
        let result = optimize(oracle, &plan);
        assert!(Arc::ptr_eq(&result, &plan));
    }

    #[test]
    fn equal_sizes_take_precedence_over_differing_counts() {
        let plan = join(2, JoinType::Inner, scan(0, &["a"]), scan(1, &["b"]), vec![]);
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(10.0, 500.0))
            .with_estimate(PlanNodeId(1), sized(9999.0, 500.0));
        // Sizes are equal, so the count difference must not trigger a flip.
        let result = optimize(oracle, &plan);
        assert!(Arc::ptr_eq(&result, &plan));
    }

    #[test]
    fn falls_back_to_row_counts_when_a_size_is_unknown() {
        let plan = join(2, JoinType::Inner, scan(0, &["a"]), scan(1, &["b"]), vec![]);
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), counted(10.0))
            .with_estimate(PlanNodeId(1), counted(100.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        assert_eq!(result.left.id(), PlanNodeId(1));
    }

    #[test]
    fn hash_symbol_hints_swap_with_the_sides() {
        let plan = Arc::new(PlanNode::Join(JoinNode {
            id: PlanNodeId(2),
            join_type: JoinType::Inner,
            left: scan(0, &["a"]),
            right: scan(1, &["b"]),
            criteria: vec![EquiJoinClause::new(sym("a"), sym("b"))],
            output_symbols: vec![sym("a"), sym("b")],
            filter: None,
            left_hash_symbol: Some(sym("a_hash")),
            right_hash_symbol: Some(sym("b_hash")),
        }));
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(1.0, 100.0));
        let result = optimize(oracle, &plan);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        assert_eq!(result.left_hash_symbol, Some(sym("b_hash")));
        assert_eq!(result.right_hash_symbol, Some(sym("a_hash")));
    }

    #[test]
    fn children_are_rewritten_before_the_parent_decides() {
        // inner = small ⋈ large (will flip), outer joins inner with mid.
        let inner = join(
            3,
            JoinType::Inner,
            scan(0, &["a"]),
            scan(1, &["b"]),
            vec![EquiJoinClause::new(sym("a"), sym("b"))],
        );
        let outer = join(
            4,
            JoinType::Inner,
            inner,
            scan(2, &["c"]),
            vec![EquiJoinClause::new(sym("b"), sym("c"))],
        );
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(1.0, 100.0))
            .with_estimate(PlanNodeId(3), sized(1.0, 200.0))
            .with_estimate(PlanNodeId(2), sized(1.0, 50.0));
        let result = optimize(oracle, &outer);
        let PlanNode::Join(result) = &*result else { panic!("expected join") };
        // Outer keeps its orientation (200 > 50), but its left child flipped.
        assert_eq!(result.right.id(), PlanNodeId(2));
        let PlanNode::Join(inner_result) = &*result.left else { panic!("expected join") };
        assert_eq!(inner_result.left.id(), PlanNodeId(1));
        assert_eq!(inner_result.right.id(), PlanNodeId(0));
    }

    #[test]
    fn disabled_session_returns_the_input_plan() {
        let plan = join(2, JoinType::Inner, scan(0, &["a"]), scan(1, &["b"]), vec![]);
        let oracle = MapCostOracle::new()
            .with_estimate(PlanNodeId(0), sized(1.0, 10.0))
            .with_estimate(PlanNodeId(1), sized(1.0, 100.0));
        let optimizer = JoinReorderingOptimizer::new(Arc::new(oracle));
        let result = optimizer.optimize(
            &plan,
            &SessionProperties::default(),
            &mut PlanNodeIdAllocator::new(100),
        );
        assert!(Arc::ptr_eq(&result, &plan));
    }
}
