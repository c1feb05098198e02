//! # Plan-Tree Node Types
//!
//! The subset of the logical plan that the join passes operate on. Nodes are
//! immutable value types shared via [`PlanRef`] (`Arc<PlanNode>`): a rewrite
//! pass builds a fresh tree bottom-up and reuses unchanged subtrees by
//! reference, so "did anything change below" is an O(1) pointer comparison
//! rather than a structural one.
//!
//! ## Node Variants
//!
//! - **`Scan`**: a leaf producing a fixed set of output symbols. Everything
//!   the passes need from a base relation is its identity and output layout;
//!   table handles and predicates live outside this subsystem.
//! - **`Project`**: an identity projection that narrows or reorders the
//!   visible columns. The cross-join eliminator emits one on top of a rebuilt
//!   chain to restore the original output layout.
//! - **`Join`**: a binary join with equi-clauses, an optional residual filter
//!   and optional precomputed hash symbols per side.
//! - **`GroupReference`**: an opaque handle to a subtree owned by a
//!   surrounding rule engine. Passes treat it as a leaf and must never force
//!   its materialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;

/// An opaque, totally ordered identifier for a logical column within a plan.
///
/// Symbols are created during plan construction and referenced (never owned)
/// by every property and partitioning structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a plan node, stable across rewrites that preserve the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints fresh [`PlanNodeId`]s for nodes created by rewrite passes.
///
/// Seed it past the highest id in the input plan so new nodes never collide
/// with surviving originals.
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next: u32,
}

impl PlanNodeIdAllocator {
    pub fn new(next: u32) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

/// Join variants the passes understand.
///
/// A cross join is represented as `Inner` with an empty clause list rather
/// than a dedicated variant, so "has this join any keys" and "is this a cross
/// join" are the same question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        write!(f, "{s}")
    }
}

/// One equi-join key: `left = right`, with `left` produced by the join's left
/// subtree and `right` by its right subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquiJoinClause {
    pub left: Symbol,
    pub right: Symbol,
}

impl EquiJoinClause {
    pub fn new(left: Symbol, right: Symbol) -> Self {
        Self { left, right }
    }

    /// The same equality with sides exchanged, for use after a join flip.
    pub fn flip(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }
}

impl fmt::Display for EquiJoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

/// A binary join node.
///
/// Immutable: reordering passes construct new `JoinNode`s rather than
/// mutating, so a flipped join and its original can share both subtrees.
#[derive(Debug, Clone)]
pub struct JoinNode {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub left: PlanRef,
    pub right: PlanRef,
    pub criteria: Vec<EquiJoinClause>,
    pub output_symbols: Vec<Symbol>,
    /// Residual non-equi filter, preserved verbatim through rewrites.
    pub filter: Option<Expr>,
    pub left_hash_symbol: Option<Symbol>,
    pub right_hash_symbol: Option<Symbol>,
}

impl JoinNode {
    /// True when this join carries no equi-join keys, i.e. a cross join.
    pub fn is_cross_join(&self) -> bool {
        self.join_type == JoinType::Inner && self.criteria.is_empty()
    }
}

/// Reference-counted handle to an immutable plan node.
pub type PlanRef = Arc<PlanNode>;

/// The plan-tree variants visible to the join passes.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Scan {
        id: PlanNodeId,
        output_symbols: Vec<Symbol>,
    },
    /// Identity projection: every output symbol is forwarded unchanged from
    /// the input, possibly narrowed or reordered.
    Project {
        id: PlanNodeId,
        input: PlanRef,
        output_symbols: Vec<Symbol>,
    },
    Join(JoinNode),
    /// Opaque reference into a surrounding rule engine's group store.
    GroupReference {
        id: PlanNodeId,
        output_symbols: Vec<Symbol>,
    },
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Scan { id, .. }
            | PlanNode::Project { id, .. }
            | PlanNode::GroupReference { id, .. } => *id,
            PlanNode::Join(join) => join.id,
        }
    }

    pub fn output_symbols(&self) -> &[Symbol] {
        match self {
            PlanNode::Scan { output_symbols, .. }
            | PlanNode::Project { output_symbols, .. }
            | PlanNode::GroupReference { output_symbols, .. } => output_symbols,
            PlanNode::Join(join) => &join.output_symbols,
        }
    }

    pub fn children(&self) -> Vec<&PlanRef> {
        match self {
            PlanNode::Scan { .. } | PlanNode::GroupReference { .. } => vec![],
            PlanNode::Project { input, .. } => vec![input],
            PlanNode::Join(join) => vec![&join.left, &join.right],
        }
    }

    /// Reconstruct this node over new children, preserving everything else.
    ///
    /// Panics if `children` does not match the variant's arity; rewrite
    /// passes always feed back exactly what [`PlanNode::children`] produced.
    pub fn with_children(&self, mut children: Vec<PlanRef>) -> PlanNode {
        match self {
            PlanNode::Scan { .. } | PlanNode::GroupReference { .. } => {
                assert!(children.is_empty(), "leaf node given children");
                self.clone()
            }
            PlanNode::Project {
                id, output_symbols, ..
            } => {
                assert_eq!(children.len(), 1, "projection expects one child");
                PlanNode::Project {
                    id: *id,
                    input: children.pop().expect("checked length"),
                    output_symbols: output_symbols.clone(),
                }
            }
            PlanNode::Join(join) => {
                assert_eq!(children.len(), 2, "join expects two children");
                let right = children.pop().expect("checked length");
                let left = children.pop().expect("checked length");
                PlanNode::Join(JoinNode {
                    left,
                    right,
                    ..join.clone()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(id: u32, symbols: &[&str]) -> PlanRef {
        Arc::new(PlanNode::Scan {
            id: PlanNodeId(id),
            output_symbols: symbols.iter().map(|s| Symbol::new(*s)).collect(),
        })
    }

    #[test]
    fn with_children_preserves_join_fields() {
        let a = scan(0, &["a"]);
        let b = scan(1, &["b"]);
        let join = PlanNode::Join(JoinNode {
            id: PlanNodeId(2),
            join_type: JoinType::Left,
            left: a.clone(),
            right: b.clone(),
            criteria: vec![EquiJoinClause::new(Symbol::new("a"), Symbol::new("b"))],
            output_symbols: vec![Symbol::new("a"), Symbol::new("b")],
            filter: None,
            left_hash_symbol: Some(Symbol::new("a_hash")),
            right_hash_symbol: None,
        });

        let c = scan(3, &["c"]);
        let rebuilt = join.with_children(vec![a.clone(), c.clone()]);
        let PlanNode::Join(rebuilt) = rebuilt else {
            panic!("expected join");
        };
        assert!(Arc::ptr_eq(&rebuilt.left, &a));
        assert!(Arc::ptr_eq(&rebuilt.right, &c));
        assert_eq!(rebuilt.join_type, JoinType::Left);
        assert_eq!(rebuilt.left_hash_symbol, Some(Symbol::new("a_hash")));
    }

    #[test]
    fn cross_join_is_inner_with_no_criteria() {
        let join = JoinNode {
            id: PlanNodeId(2),
            join_type: JoinType::Inner,
            left: scan(0, &["a"]),
            right: scan(1, &["b"]),
            criteria: vec![],
            output_symbols: vec![Symbol::new("a"), Symbol::new("b")],
            filter: None,
            left_hash_symbol: None,
            right_hash_symbol: None,
        };
        assert!(join.is_cross_join());
    }

    #[test]
    fn clause_flip_swaps_sides() {
        let clause = EquiJoinClause::new(Symbol::new("l"), Symbol::new("r"));
        let flipped = clause.flip();
        assert_eq!(flipped.left, Symbol::new("r"));
        assert_eq!(flipped.right, Symbol::new("l"));
    }
}
