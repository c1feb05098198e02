//! # Partitioning Model
//!
//! A [`Partitioning`] names *how* rows are distributed: a handle identifying
//! the distribution function, plus the ordered argument list that function is
//! applied to. Arguments are usually column symbols, but a column pinned to a
//! single known value may be folded into a constant argument — a constant
//! cannot introduce skew, so it behaves as a wildcard in every compatibility
//! check.
//!
//! ## Zero-Column Partitionings
//!
//! Partitioning on zero columns (or on columns that are all effectively
//! constant) means every row lands in one node or stream. The plan may still
//! run on many servers; only one of them receives data. The reserved
//! [`PartitioningHandle::Single`] and [`PartitioningHandle::Coordinator`]
//! handles pair with an empty argument list to describe single-node and
//! coordinator-only plans.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::expr::ScalarValue;
use crate::plan::Symbol;

/// Identifies a distribution function for rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitioningHandle {
    /// All rows on a single (arbitrary) node.
    Single,
    /// All rows on the coordinator.
    Coordinator,
    /// Distribution determined by the splits of the underlying source.
    Source,
    /// A named fixed hash distribution (e.g. a connector bucketing function).
    Fixed(String),
}

impl PartitioningHandle {
    /// True if this handle routes every row to one node.
    pub fn is_single_node(&self) -> bool {
        matches!(self, PartitioningHandle::Single | PartitioningHandle::Coordinator)
    }

    pub fn is_coordinator_only(&self) -> bool {
        matches!(self, PartitioningHandle::Coordinator)
    }
}

impl fmt::Display for PartitioningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitioningHandle::Single => write!(f, "SINGLE"),
            PartitioningHandle::Coordinator => write!(f, "COORDINATOR"),
            PartitioningHandle::Source => write!(f, "SOURCE"),
            PartitioningHandle::Fixed(name) => write!(f, "FIXED[{name}]"),
        }
    }
}

/// One argument of a partitioning function: a live column, or a column that
/// has been constant-folded to its single known value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentBinding {
    Column(Symbol),
    Constant(ScalarValue),
}

impl ArgumentBinding {
    pub fn is_constant(&self) -> bool {
        matches!(self, ArgumentBinding::Constant(_))
    }

    pub fn column(&self) -> Option<&Symbol> {
        match self {
            ArgumentBinding::Column(symbol) => Some(symbol),
            ArgumentBinding::Constant(_) => None,
        }
    }

    /// Remap a column argument, falling back to its known constant value when
    /// the translator has no mapping. Constants pass through untouched.
    fn translate(
        &self,
        translator: &impl Fn(&Symbol) -> Option<Symbol>,
        constants: &impl Fn(&Symbol) -> Option<ScalarValue>,
    ) -> Option<ArgumentBinding> {
        match self {
            ArgumentBinding::Constant(value) => Some(ArgumentBinding::Constant(value.clone())),
            ArgumentBinding::Column(symbol) => match translator(symbol) {
                Some(translated) => Some(ArgumentBinding::Column(translated)),
                None => constants(symbol).map(ArgumentBinding::Constant),
            },
        }
    }
}

impl fmt::Display for ArgumentBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentBinding::Column(symbol) => write!(f, "{symbol}"),
            ArgumentBinding::Constant(value) => write!(f, "{value}"),
        }
    }
}

/// How rows produced by a subtree are distributed: a handle plus the ordered
/// arguments it partitions over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partitioning {
    handle: PartitioningHandle,
    arguments: Vec<ArgumentBinding>,
}

impl Partitioning {
    pub fn create(handle: PartitioningHandle, columns: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            handle,
            arguments: columns.into_iter().map(ArgumentBinding::Column).collect(),
        }
    }

    pub fn with_arguments(handle: PartitioningHandle, arguments: Vec<ArgumentBinding>) -> Self {
        Self { handle, arguments }
    }

    pub fn handle(&self) -> &PartitioningHandle {
        &self.handle
    }

    pub fn arguments(&self) -> &[ArgumentBinding] {
        &self.arguments
    }

    /// The column symbols among the arguments (constants excluded).
    pub fn columns(&self) -> HashSet<Symbol> {
        self.arguments
            .iter()
            .filter_map(|argument| argument.column().cloned())
            .collect()
    }

    /// True iff every partitioning argument is covered by `columns` or is
    /// (effectively) constant. Constants act as wildcards: a column with a
    /// single value cannot spread rows across partitions.
    ///
    /// There is no ordering requirement between the argument list and
    /// `columns`.
    pub fn is_partitioned_on(
        &self,
        columns: &HashSet<Symbol>,
        known_constants: &HashSet<Symbol>,
    ) -> bool {
        self.arguments.iter().all(|argument| match argument {
            ArgumentBinding::Constant(_) => true,
            ArgumentBinding::Column(symbol) => {
                known_constants.contains(symbol) || columns.contains(symbol)
            }
        })
    }

    /// True when, modulo known constants, no argument distinguishes rows —
    /// all data lands in a single partition.
    pub fn is_effectively_single_partition(&self, known_constants: &HashSet<Symbol>) -> bool {
        self.is_partitioned_on(&HashSet::new(), known_constants)
    }

    /// True when repartitioning on `keys` would actually move data around:
    /// the non-constant key set differs from the non-constant argument set.
    pub fn is_repartition_effective(
        &self,
        keys: &[Symbol],
        known_constants: &HashSet<Symbol>,
    ) -> bool {
        let keys_without_constants: HashSet<&Symbol> = keys
            .iter()
            .filter(|key| !known_constants.contains(*key))
            .collect();
        let non_constant_arguments: HashSet<&Symbol> = self
            .arguments
            .iter()
            .filter_map(ArgumentBinding::column)
            .filter(|symbol| !known_constants.contains(*symbol))
            .collect();
        non_constant_arguments != keys_without_constants
    }

    /// Structural co-partitioning check against another partitioning.
    ///
    /// Used to confirm that a join's two sides already co-reside without a
    /// shuffle. For each argument position, either both sides hold equal
    /// constants, or the symbols correspond under `symbol_mappings`, or one
    /// side's symbol resolves (via its constant mapping) to the other side's
    /// constant value.
    pub fn is_partitioned_with(
        &self,
        other: &Partitioning,
        symbol_mappings: impl Fn(&Symbol) -> HashSet<Symbol>,
        left_constants: impl Fn(&Symbol) -> Option<ScalarValue>,
        right_constants: impl Fn(&Symbol) -> Option<ScalarValue>,
    ) -> bool {
        if self.handle != other.handle {
            return false;
        }
        if self.arguments.len() != other.arguments.len() {
            return false;
        }
        self.arguments
            .iter()
            .zip(other.arguments.iter())
            .all(|(left, right)| {
                arguments_match(left, right, &symbol_mappings, &left_constants, &right_constants)
            })
    }

    /// Remap every column argument through a possibly partial translator.
    ///
    /// A column with no translation may still survive as its known constant
    /// value; otherwise the whole partitioning is dropped (`None`) — a lost
    /// property is conservative, an invalid one is not.
    pub fn translate(
        &self,
        translator: impl Fn(&Symbol) -> Option<Symbol>,
        constants: impl Fn(&Symbol) -> Option<ScalarValue>,
    ) -> Option<Partitioning> {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.translate(&translator, &constants))
            .collect::<Option<Vec<_>>>()?;
        Some(Partitioning {
            handle: self.handle.clone(),
            arguments,
        })
    }

    /// Remap every column argument through a total translator. Used when a
    /// projection renames the entire output layout positionally.
    pub fn translate_total(&self, translator: impl Fn(&Symbol) -> Symbol) -> Partitioning {
        Partitioning {
            handle: self.handle.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|argument| match argument {
                    ArgumentBinding::Column(symbol) => ArgumentBinding::Column(translator(symbol)),
                    ArgumentBinding::Constant(value) => ArgumentBinding::Constant(value.clone()),
                })
                .collect(),
        }
    }
}

fn arguments_match(
    left: &ArgumentBinding,
    right: &ArgumentBinding,
    symbol_mappings: &impl Fn(&Symbol) -> HashSet<Symbol>,
    left_constants: &impl Fn(&Symbol) -> Option<ScalarValue>,
    right_constants: &impl Fn(&Symbol) -> Option<ScalarValue>,
) -> bool {
    match (left, right) {
        (ArgumentBinding::Column(l), ArgumentBinding::Column(r)) => {
            symbol_mappings(l).contains(r)
        }
        (ArgumentBinding::Column(l), ArgumentBinding::Constant(rv)) => {
            left_constants(l).as_ref() == Some(rv)
        }
        (ArgumentBinding::Constant(lv), ArgumentBinding::Column(r)) => {
            right_constants(r).as_ref() == Some(lv)
        }
        (ArgumentBinding::Constant(lv), ArgumentBinding::Constant(rv)) => lv == rv,
    }
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.handle)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{argument}")?;
        }
        write!(f, "]")
    }
}
