//! # Local (Per-Stream) Properties
//!
//! Local properties describe guarantees that hold *within* each stream of
//! data, independent of how rows are spread across nodes: a column pinned to
//! a constant, rows sorted by a column, or rows grouped (clustered, in no
//! particular order) on a column set.
//!
//! The list is positional: a property at position `i` only holds within rows
//! that agree on all properties before it, exactly like a multi-column sort.
//! Normalization exploits that structure — once a column is known constant,
//! any later sort or grouping on it is vacuous and gets pruned.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::plan::Symbol;

/// Sort direction and null placement for a [`LocalProperty::Sorting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOrder::AscNullsFirst => "ASC NULLS FIRST",
            SortOrder::AscNullsLast => "ASC NULLS LAST",
            SortOrder::DescNullsFirst => "DESC NULLS FIRST",
            SortOrder::DescNullsLast => "DESC NULLS LAST",
        };
        write!(f, "{s}")
    }
}

/// One positional constraint on the rows of each stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalProperty {
    /// The column holds a single value across all rows.
    Constant(Symbol),
    /// Rows are ordered by the column.
    Sorting { column: Symbol, order: SortOrder },
    /// Rows with equal values on the column set are contiguous.
    Grouping(Vec<Symbol>),
}

impl LocalProperty {
    pub fn columns(&self) -> Vec<&Symbol> {
        match self {
            LocalProperty::Constant(column) => vec![column],
            LocalProperty::Sorting { column, .. } => vec![column],
            LocalProperty::Grouping(columns) => columns.iter().collect(),
        }
    }

    /// Drop the parts of this property made redundant by known-constant
    /// columns. Returns `None` when nothing meaningful remains.
    fn with_constants(&self, constants: &HashSet<Symbol>) -> Option<LocalProperty> {
        match self {
            LocalProperty::Constant(column) => {
                if constants.contains(column) {
                    None
                } else {
                    Some(self.clone())
                }
            }
            LocalProperty::Sorting { column, .. } => {
                if constants.contains(column) {
                    None
                } else {
                    Some(self.clone())
                }
            }
            LocalProperty::Grouping(columns) => {
                let remaining: Vec<Symbol> = columns
                    .iter()
                    .filter(|column| !constants.contains(*column))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    None
                } else {
                    Some(LocalProperty::Grouping(remaining))
                }
            }
        }
    }

    /// Remap through a possibly partial translator; `None` when any referenced
    /// column is unmappable.
    pub fn translate(
        &self,
        translator: &impl Fn(&Symbol) -> Option<Symbol>,
    ) -> Option<LocalProperty> {
        match self {
            LocalProperty::Constant(column) => translator(column).map(LocalProperty::Constant),
            LocalProperty::Sorting { column, order } => {
                translator(column).map(|column| LocalProperty::Sorting {
                    column,
                    order: *order,
                })
            }
            LocalProperty::Grouping(columns) => columns
                .iter()
                .map(translator)
                .collect::<Option<Vec<_>>>()
                .map(LocalProperty::Grouping),
        }
    }
}

impl fmt::Display for LocalProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalProperty::Constant(column) => write!(f, "C({column})"),
            LocalProperty::Sorting { column, order } => write!(f, "S({column} {order})"),
            LocalProperty::Grouping(columns) => {
                write!(f, "G(")?;
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{column}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Constant columns appearing as a leading run of the property list.
pub fn extract_leading_constants(properties: &[LocalProperty]) -> HashSet<Symbol> {
    properties
        .iter()
        .map_while(|property| match property {
            LocalProperty::Constant(column) => Some(column.clone()),
            _ => None,
        })
        .collect()
}

/// The property list with its leading constant run removed.
pub fn strip_leading_constants(properties: &[LocalProperty]) -> Vec<LocalProperty> {
    let leading = properties
        .iter()
        .take_while(|property| matches!(property, LocalProperty::Constant(_)))
        .count();
    properties[leading..].to_vec()
}

/// Normalize a property list: accumulate constants left to right, strip each
/// property of columns already known constant, and drop properties that end
/// up vacuous (duplicate constants, sorts on constants, emptied groupings).
pub fn normalize_and_prune(properties: &[LocalProperty]) -> Vec<LocalProperty> {
    let mut constants: HashSet<Symbol> = HashSet::new();
    let mut normalized = Vec::with_capacity(properties.len());
    for property in properties {
        let Some(pruned) = property.with_constants(&constants) else {
            continue;
        };
        if let LocalProperty::Constant(column) = &pruned {
            constants.insert(column.clone());
        }
        normalized.push(pruned);
    }
    normalized
}

/// Translate a property list, truncating at the first unmappable property.
///
/// The list is positional, so once one level is lost every deeper level is
/// meaningless; truncation keeps the result a valid (if weaker) prefix.
pub fn translate(
    properties: &[LocalProperty],
    translator: impl Fn(&Symbol) -> Option<Symbol>,
) -> Vec<LocalProperty> {
    properties
        .iter()
        .map_while(|property| property.translate(&translator))
        .collect()
}
