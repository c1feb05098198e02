//! # Partitioning Scheme
//!
//! A [`PartitioningScheme`] is the contract a plan *producer* must honor when
//! writing its output: the partitioning function and arguments, the ordered
//! output column layout, an optional precomputed hash column, the replication
//! mode, and — once the scheduler has assigned nodes — the mapping from
//! abstract hash buckets to concrete partitions.
//!
//! All legality constraints are enforced at construction. A scheme that names
//! a partitioning column or hash column outside its own output layout, or
//! pairs a null-replicating mode with a multi-column partitioning, is a
//! planner bug; construction fails with a descriptive error rather than
//! silently correcting the input.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::partitioning::Partitioning;
use crate::plan::Symbol;

/// Which rows, if any, are duplicated to every node instead of routed by key.
///
/// Replicating null-keyed rows (and, as a fallback, one arbitrary row) keeps
/// outer and semi joins correct when unmatched keys would otherwise be lost
/// to a single partition. Null replication identifies rows by a single key,
/// so the null-replicating modes are only compatible with partitionings of at
/// most one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Replication {
    ReplicateNothing,
    ReplicateNullsAndAny,
    ReplicateNulls,
}

impl Replication {
    pub fn replicates_nulls(&self) -> bool {
        matches!(self, Replication::ReplicateNullsAndAny | Replication::ReplicateNulls)
    }

    pub fn replicates_any_row(&self) -> bool {
        matches!(self, Replication::ReplicateNullsAndAny)
    }

    pub fn replicates_nothing(&self) -> bool {
        !(self.replicates_nulls() || self.replicates_any_row())
    }

    pub fn is_compatible_with_partitioning_columns(&self, columns_count: usize) -> bool {
        match self {
            Replication::ReplicateNothing => true,
            Replication::ReplicateNullsAndAny | Replication::ReplicateNulls => columns_count <= 1,
        }
    }
}

/// Construction-time validation failures for [`PartitioningScheme`].
///
/// These indicate planner bugs; callers must not catch and continue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitioningSchemeError {
    #[error("output layout ({output_layout:?}) does not include all partitioning columns ({missing:?})")]
    PartitionColumnsNotInLayout {
        output_layout: Vec<Symbol>,
        missing: Vec<Symbol>,
    },
    #[error("output layout ({output_layout:?}) does not include hash column ({hash_column})")]
    HashColumnNotInLayout {
        output_layout: Vec<Symbol>,
        hash_column: Symbol,
    },
    #[error("replication {replication:?} cannot be used with {columns_count} partitioning columns")]
    IncompatibleReplication {
        replication: Replication,
        columns_count: usize,
    },
    #[error("new output layout has {actual} symbols, expected {expected}")]
    OutputLayoutSizeMismatch { expected: usize, actual: usize },
}

/// The concrete physical output contract of a plan producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitioningScheme {
    partitioning: Partitioning,
    output_layout: Vec<Symbol>,
    hash_column: Option<Symbol>,
    replication: Replication,
    bucket_to_partition: Option<Vec<u32>>,
}

impl PartitioningScheme {
    /// A scheme with no hash column, no replication and an unassigned bucket
    /// map — the common case before scheduling.
    pub fn new(
        partitioning: Partitioning,
        output_layout: Vec<Symbol>,
    ) -> Result<Self, PartitioningSchemeError> {
        Self::try_new(
            partitioning,
            output_layout,
            None,
            Replication::ReplicateNothing,
            None,
        )
    }

    pub fn try_new(
        partitioning: Partitioning,
        output_layout: Vec<Symbol>,
        hash_column: Option<Symbol>,
        replication: Replication,
        bucket_to_partition: Option<Vec<u32>>,
    ) -> Result<Self, PartitioningSchemeError> {
        let columns = partitioning.columns();
        let layout_set: HashSet<&Symbol> = output_layout.iter().collect();

        let missing: Vec<Symbol> = columns
            .iter()
            .filter(|column| !layout_set.contains(*column))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PartitioningSchemeError::PartitionColumnsNotInLayout {
                output_layout,
                missing,
            });
        }

        if let Some(hash_column) = &hash_column {
            if !layout_set.contains(hash_column) {
                return Err(PartitioningSchemeError::HashColumnNotInLayout {
                    output_layout,
                    hash_column: hash_column.clone(),
                });
            }
        }

        if !replication.is_compatible_with_partitioning_columns(columns.len()) {
            return Err(PartitioningSchemeError::IncompatibleReplication {
                replication,
                columns_count: columns.len(),
            });
        }

        Ok(Self {
            partitioning,
            output_layout,
            hash_column,
            replication,
            bucket_to_partition,
        })
    }

    pub fn partitioning(&self) -> &Partitioning {
        &self.partitioning
    }

    pub fn output_layout(&self) -> &[Symbol] {
        &self.output_layout
    }

    pub fn hash_column(&self) -> Option<&Symbol> {
        self.hash_column.as_ref()
    }

    pub fn replication(&self) -> Replication {
        self.replication
    }

    pub fn bucket_to_partition(&self) -> Option<&[u32]> {
        self.bucket_to_partition.as_deref()
    }

    /// Copy with only the physical bucket map overridden. Used once the
    /// scheduler has decided concrete node assignment.
    pub fn with_bucket_to_partition(&self, bucket_to_partition: Option<Vec<u32>>) -> Self {
        Self {
            bucket_to_partition,
            ..self.clone()
        }
    }

    /// Remap partitioning, hash column and layout together when a projection
    /// renames the visible column set. The mapping is positional, so the new
    /// layout must have exactly as many symbols as the old one.
    pub fn translate_output_layout(
        &self,
        new_output_layout: Vec<Symbol>,
    ) -> Result<Self, PartitioningSchemeError> {
        if new_output_layout.len() != self.output_layout.len() {
            return Err(PartitioningSchemeError::OutputLayoutSizeMismatch {
                expected: self.output_layout.len(),
                actual: new_output_layout.len(),
            });
        }

        let position_of = |symbol: &Symbol| -> usize {
            self.output_layout
                .iter()
                .position(|s| s == symbol)
                .expect("partitioning and hash columns are validated against the layout")
        };

        let new_partitioning = self
            .partitioning
            .translate_total(|symbol| new_output_layout[position_of(symbol)].clone());
        let new_hash_column = self
            .hash_column
            .as_ref()
            .map(|symbol| new_output_layout[position_of(symbol)].clone());

        Self::try_new(
            new_partitioning,
            new_output_layout,
            new_hash_column,
            self.replication,
            self.bucket_to_partition.clone(),
        )
    }
}

// Equality and hashing deliberately ignore the hash column: two schemes that
// route rows identically are interchangeable whether or not one of them
// carries a precomputed hash.
impl PartialEq for PartitioningScheme {
    fn eq(&self, other: &Self) -> bool {
        self.partitioning == other.partitioning
            && self.output_layout == other.output_layout
            && self.replication == other.replication
            && self.bucket_to_partition == other.bucket_to_partition
    }
}

impl Eq for PartitioningScheme {}

impl Hash for PartitioningScheme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.partitioning.hash(state);
        self.output_layout.hash(state);
        self.replication.hash(state);
        self.bucket_to_partition.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioning::PartitioningHandle;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    fn hash_partitioning(columns: &[&str]) -> Partitioning {
        Partitioning::create(
            PartitioningHandle::Fixed("hash".into()),
            columns.iter().map(|c| sym(c)),
        )
    }

    #[test]
    fn rejects_partition_columns_outside_layout() {
        let result = PartitioningScheme::new(hash_partitioning(&["a", "b"]), vec![sym("a")]);
        assert!(matches!(
            result,
            Err(PartitioningSchemeError::PartitionColumnsNotInLayout { .. })
        ));
    }

    #[test]
    fn rejects_hash_column_outside_layout() {
        let result = PartitioningScheme::try_new(
            hash_partitioning(&["a"]),
            vec![sym("a")],
            Some(sym("h")),
            Replication::ReplicateNothing,
            None,
        );
        assert!(matches!(
            result,
            Err(PartitioningSchemeError::HashColumnNotInLayout { .. })
        ));
    }

    #[test]
    fn rejects_null_replication_with_two_columns() {
        let result = PartitioningScheme::try_new(
            hash_partitioning(&["a", "b"]),
            vec![sym("a"), sym("b")],
            None,
            Replication::ReplicateNullsAndAny,
            None,
        );
        assert!(matches!(
            result,
            Err(PartitioningSchemeError::IncompatibleReplication { columns_count: 2, .. })
        ));

        let single = PartitioningScheme::try_new(
            hash_partitioning(&["a"]),
            vec![sym("a")],
            None,
            Replication::ReplicateNulls,
            None,
        );
        assert!(single.is_ok());
    }

    #[test]
    fn translate_output_layout_is_positional() {
        let scheme = PartitioningScheme::try_new(
            hash_partitioning(&["b"]),
            vec![sym("a"), sym("b")],
            Some(sym("a")),
            Replication::ReplicateNothing,
            Some(vec![0, 1]),
        )
        .expect("valid scheme");

        let translated = scheme
            .translate_output_layout(vec![sym("x"), sym("y")])
            .expect("same-size layout");
        assert_eq!(translated.output_layout(), &[sym("x"), sym("y")]);
        assert_eq!(translated.partitioning(), &hash_partitioning(&["y"]));
        assert_eq!(translated.hash_column(), Some(&sym("x")));
        assert_eq!(translated.bucket_to_partition(), Some(&[0, 1][..]));

        let mismatch = scheme.translate_output_layout(vec![sym("x")]);
        assert!(matches!(
            mismatch,
            Err(PartitioningSchemeError::OutputLayoutSizeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn with_bucket_to_partition_overrides_only_the_map() {
        let scheme =
            PartitioningScheme::new(hash_partitioning(&["a"]), vec![sym("a")]).expect("valid");
        let assigned = scheme.with_bucket_to_partition(Some(vec![2, 0, 1]));
        assert_eq!(assigned.bucket_to_partition(), Some(&[2, 0, 1][..]));
        assert_eq!(assigned.partitioning(), scheme.partitioning());
    }

    #[test]
    fn equality_ignores_hash_column() {
        let with_hash = PartitioningScheme::try_new(
            hash_partitioning(&["a"]),
            vec![sym("a"), sym("h")],
            Some(sym("h")),
            Replication::ReplicateNothing,
            None,
        )
        .expect("valid");
        let without_hash = PartitioningScheme::try_new(
            hash_partitioning(&["a"]),
            vec![sym("a"), sym("h")],
            None,
            Replication::ReplicateNothing,
            None,
        )
        .expect("valid");
        assert_eq!(with_hash, without_hash);
    }
}
