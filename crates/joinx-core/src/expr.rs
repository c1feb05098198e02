//! # Scalar Expressions and Constant Values
//!
//! A deliberately small expression language. Join nodes only carry scalar
//! expressions in two places: the residual (non-equi) join filter, and the
//! constant values that the property model folds into partitioning arguments.
//! Neither place needs arithmetic or function calls, so this module stays
//! limited to column references, literals, comparisons and conjunctions.
//!
//! `ScalarValue` wraps `f64` in `OrderedFloat` so constant values can be used
//! as hash-map keys and compared for equality — the co-partitioning check in
//! [`crate::partitioning`] matches constant arguments by value.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::plan::Symbol;

/// A constant value, possibly NULL.
///
/// This is the value side of the "known constants" mapping in
/// [`crate::properties::ActualProperties`]: a column pinned to a single value
/// by a filter or a single-value aggregation. NULL is a legitimate pinned
/// value (e.g. `WHERE x IS NULL`), so it is a variant rather than an absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "'{v}'"),
        }
    }
}

/// Comparison operators usable in residual join filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// A scalar expression over plan symbols.
///
/// Carried opaquely by [`crate::plan::JoinNode::filter`]: the rewrite passes
/// preserve filters through side flips and chain rebuilds but never evaluate
/// them. Conjunctions are stored as a flat list rather than nested binary
/// trees, which keeps conjunct extraction trivial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Column(Symbol),
    Literal(ScalarValue),
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
}

impl Expr {
    /// All column symbols referenced by this expression.
    pub fn columns(&self) -> Vec<&Symbol> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a Symbol>) {
        match self {
            Expr::Column(s) => out.push(s),
            Expr::Literal(_) => {}
            Expr::Comparison { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::And(exprs) => {
                for e in exprs {
                    e.collect_columns(out);
                }
            }
        }
    }
}
