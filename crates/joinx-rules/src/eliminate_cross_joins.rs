//! # Cross-Join Elimination
//!
//! Rebuilds a connected component of inner/cross joins into a left-deep
//! chain of equi-joins, using join-key predicates found anywhere in the
//! component. A query written as `A, B, C WHERE a.x = c.x AND b.y = c.y`
//! plans naively as `(A × B) ⋈ C` — a cross product feeding a join. The same
//! predicates admit `(A ⋈ C) ⋈ B`, which never materializes a cross product.
//!
//! ## Component Boundaries
//!
//! Flattening descends through inner joins only. Outer joins, joins carrying
//! a residual filter, and opaque group references are treated as leaves: the
//! rule never reorders across them and never forces materialization of a
//! subtree it does not understand.
//!
//! ## Chain Construction
//!
//! Leaves are kept in original left-to-right order. The chain starts from
//! the first leaf; each step picks the earliest remaining leaf connected to
//! the already-placed symbols by at least one unused predicate and joins it
//! in using *every* such predicate (a leaf reachable via two predicates gets
//! one two-clause join, not two joins). When nothing connects, the next leaf
//! in original order is joined as a cross join, which guarantees termination
//! for disconnected components. The result is wrapped in an identity
//! projection restoring the original output layout.
//!
//! ## When It Does Not Fire
//!
//! No rewrite is produced when reordering is disabled, when the component
//! has fewer than two leaves, when it contains no cross join to eliminate,
//! or when no predicate connects any pair of leaves.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use joinx_core::plan::{
    EquiJoinClause, JoinNode, JoinType, PlanNode, PlanRef, Symbol,
};

use crate::{Rule, RuleContext};

pub struct EliminateCrossJoins;

/// The flattened form of an inner-join component: its leaves in original
/// order and every equi-join clause found on the joins between them.
#[derive(Default)]
struct JoinComponent {
    leaves: Vec<PlanRef>,
    criteria: Vec<EquiJoinClause>,
    contains_cross_join: bool,
}

impl JoinComponent {
    fn from_plan(root: &PlanRef) -> JoinComponent {
        let mut component = JoinComponent::default();
        component.flatten(root);
        component
    }

    fn flatten(&mut self, node: &PlanRef) {
        match &**node {
            PlanNode::Join(join) if join.join_type == JoinType::Inner && join.filter.is_none() => {
                if join.criteria.is_empty() {
                    self.contains_cross_join = true;
                }
                self.flatten(&join.left);
                self.flatten(&join.right);
                self.criteria.extend(join.criteria.iter().cloned());
            }
            _ => self.leaves.push(node.clone()),
        }
    }
}

impl Rule for EliminateCrossJoins {
    fn name(&self) -> &str {
        "EliminateCrossJoins"
    }

    fn apply(&self, node: &PlanRef, context: &mut RuleContext<'_>) -> Option<PlanRef> {
        if !context.session.reorder_joins {
            return None;
        }

        let PlanNode::Join(root) = &**node else {
            return None;
        };
        if root.join_type != JoinType::Inner || root.filter.is_some() {
            return None;
        }

        let component = JoinComponent::from_plan(node);
        if component.leaves.len() < 2
            || !component.contains_cross_join
            || component.criteria.is_empty()
        {
            return None;
        }

        let chain = build_join_chain(&component, context)?;

        debug!(
            leaves = component.leaves.len(),
            clauses = component.criteria.len(),
            "rebuilt cross-join component as a left-deep chain"
        );

        // Identity projection restores the component's original output layout,
        // which the rebuilt chain generally permutes.
        Some(Arc::new(PlanNode::Project {
            id: context.id_allocator.next_id(),
            input: chain,
            output_symbols: node.output_symbols().to_vec(),
        }))
    }
}

/// Greedily assemble the left-deep chain. Returns `None` when a clause
/// references a symbol no leaf produces — reordering such a component could
/// silently drop the predicate, so the rule backs off instead.
fn build_join_chain(component: &JoinComponent, context: &mut RuleContext<'_>) -> Option<PlanRef> {
    let leaf_symbols: Vec<HashSet<&Symbol>> = component
        .leaves
        .iter()
        .map(|leaf| leaf.output_symbols().iter().collect())
        .collect();
    for clause in &component.criteria {
        let known = |symbol: &Symbol| leaf_symbols.iter().any(|leaf| leaf.contains(symbol));
        if !known(&clause.left) || !known(&clause.right) {
            return None;
        }
    }

    let mut placed_symbols: HashSet<Symbol> =
        component.leaves[0].output_symbols().iter().cloned().collect();
    let mut result = component.leaves[0].clone();
    let mut remaining: Vec<usize> = (1..component.leaves.len()).collect();
    let mut used = vec![false; component.criteria.len()];

    while !remaining.is_empty() {
        // Earliest remaining leaf (original order) with an unused clause
        // connecting it to the placed symbols.
        let connected = remaining.iter().position(|&leaf| {
            component.criteria.iter().enumerate().any(|(i, clause)| {
                !used[i] && connecting_clause(clause, &placed_symbols, &leaf_symbols[leaf]).is_some()
            })
        });

        let (leaf, clauses) = match connected {
            Some(position) => {
                let leaf = remaining.remove(position);
                // Every unused clause touching this leaf joins in one step,
                // oriented so the placed side is on the left.
                let mut clauses = Vec::new();
                for (i, clause) in component.criteria.iter().enumerate() {
                    if used[i] {
                        continue;
                    }
                    if let Some(oriented) =
                        connecting_clause(clause, &placed_symbols, &leaf_symbols[leaf])
                    {
                        used[i] = true;
                        clauses.push(oriented);
                    }
                }
                (leaf, clauses)
            }
            // Disconnected from everything placed so far: cross join the
            // next leaf in original order.
            None => (remaining.remove(0), Vec::new()),
        };

        let right = component.leaves[leaf].clone();
        placed_symbols.extend(right.output_symbols().iter().cloned());
        let output_symbols = result
            .output_symbols()
            .iter()
            .chain(right.output_symbols())
            .cloned()
            .collect();
        result = Arc::new(PlanNode::Join(JoinNode {
            id: context.id_allocator.next_id(),
            join_type: JoinType::Inner,
            left: result,
            right,
            criteria: clauses,
            output_symbols,
            filter: None,
            left_hash_symbol: None,
            right_hash_symbol: None,
        }));
    }

    Some(result)
}

/// If `clause` links the placed symbols to the candidate leaf, return it
/// oriented with the placed side first.
fn connecting_clause(
    clause: &EquiJoinClause,
    placed: &HashSet<Symbol>,
    leaf: &HashSet<&Symbol>,
) -> Option<EquiJoinClause> {
    if placed.contains(&clause.left) && leaf.contains(&clause.right) {
        Some(clause.clone())
    } else if placed.contains(&clause.right) && leaf.contains(&clause.left) {
        Some(clause.flip())
    } else {
        None
    }
}
