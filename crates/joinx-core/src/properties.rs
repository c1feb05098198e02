//! # Actual Properties of a Plan Subtree
//!
//! [`ActualProperties`] aggregates everything the planner knows about the
//! rows a subtree produces: how they are partitioned across nodes and across
//! streams ([`Global`]), which rows are replicated, which columns are pinned
//! to known constants, and the per-stream ordering/grouping constraints.
//!
//! Downstream physical planning consults these values to decide whether an
//! explicit data exchange must be inserted before a consumer with specific
//! partitioning or ordering requirements — the whole point of tracking them
//! is to skip shuffles that would move data into a layout it already has.
//!
//! ## Normalization Invariant
//!
//! Every key of the constants map must appear as a leading constant property
//! in the normalized local-property list. The constructor enforces this on
//! every construction (never lazily): leading constants are extracted from
//! the incoming local properties, unioned with the constants map's keys in
//! symbol order, re-emitted at the front, and the whole list is pruned of
//! redundant entries. Two `ActualProperties` built from equivalent inputs in
//! different order therefore compare equal.
//!
//! Equality and hashing consider constant *keys* only, not values: placement
//! decisions depend on which columns are pinned, never on what they are
//! pinned to.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::expr::ScalarValue;
use crate::local_properties::{self, LocalProperty};
use crate::partitioning::{Partitioning, PartitioningHandle};
use crate::plan::Symbol;
use crate::scheme::Replication;

/// Node- and stream-level distribution of a subtree's output.
///
/// An absent partitioning means "partitioned by some unknown scheme" — which
/// is distinct from "single partition": the latter is an explicit
/// partitioning on zero columns under a single-node handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Global {
    node_partitioning: Option<Partitioning>,
    stream_partitioning: Option<Partitioning>,
    replication: Replication,
}

impl Global {
    /// Data distributed by a scheme this planner cannot reason about.
    pub fn arbitrary_partition() -> Self {
        Self {
            node_partitioning: None,
            stream_partitioning: None,
            replication: Replication::ReplicateNothing,
        }
    }

    /// All data on a single arbitrary node, in a single stream.
    pub fn single_stream_partition() -> Self {
        Self::partitioned_on(PartitioningHandle::Single, vec![], Some(vec![]))
    }

    /// All data on the coordinator, in a single stream.
    pub fn coordinator_single_stream_partition() -> Self {
        Self::partitioned_on(PartitioningHandle::Coordinator, vec![], Some(vec![]))
    }

    pub fn partitioned_on(
        node_partitioning_handle: PartitioningHandle,
        node_partitioning: Vec<Symbol>,
        stream_partitioning: Option<Vec<Symbol>>,
    ) -> Self {
        Self {
            node_partitioning: Some(Partitioning::create(
                node_partitioning_handle,
                node_partitioning,
            )),
            stream_partitioning: stream_partitioning
                .map(|columns| Partitioning::create(PartitioningHandle::Source, columns)),
            replication: Replication::ReplicateNothing,
        }
    }

    pub fn partitioned_on_partitioning(
        node_partitioning: Partitioning,
        stream_partitioning: Option<Partitioning>,
    ) -> Self {
        Self {
            node_partitioning: Some(node_partitioning),
            stream_partitioning,
            replication: Replication::ReplicateNothing,
        }
    }

    pub fn stream_partitioned_on(stream_partitioning: Vec<Symbol>) -> Self {
        Self {
            node_partitioning: None,
            stream_partitioning: Some(Partitioning::create(
                PartitioningHandle::Source,
                stream_partitioning,
            )),
            replication: Replication::ReplicateNothing,
        }
    }

    pub fn with_replication(self, replication: Replication) -> Self {
        Self {
            replication,
            ..self
        }
    }

    pub fn replication(&self) -> Replication {
        self.replication
    }

    pub fn node_partitioning(&self) -> Option<&Partitioning> {
        self.node_partitioning.as_ref()
    }

    fn is_single_node(&self) -> bool {
        self.node_partitioning
            .as_ref()
            .is_some_and(|partitioning| partitioning.handle().is_single_node())
    }

    fn is_coordinator_only(&self) -> bool {
        self.node_partitioning
            .as_ref()
            .is_some_and(|partitioning| partitioning.handle().is_coordinator_only())
    }

    fn is_node_partitioned_on(
        &self,
        columns: &HashSet<Symbol>,
        constants: &HashSet<Symbol>,
        replication: Replication,
    ) -> bool {
        self.node_partitioning
            .as_ref()
            .is_some_and(|partitioning| partitioning.is_partitioned_on(columns, constants))
            && self.replication == replication
    }

    fn is_node_partitioned_on_exact(
        &self,
        partitioning: &Partitioning,
        replication: Replication,
    ) -> bool {
        self.node_partitioning.as_ref() == Some(partitioning) && self.replication == replication
    }

    fn is_node_partitioned_with(
        &self,
        other: &Global,
        symbol_mappings: impl Fn(&Symbol) -> HashSet<Symbol>,
        left_constants: impl Fn(&Symbol) -> Option<ScalarValue>,
        right_constants: impl Fn(&Symbol) -> Option<ScalarValue>,
    ) -> bool {
        match (&self.node_partitioning, &other.node_partitioning) {
            (Some(left), Some(right)) => {
                left.is_partitioned_with(right, symbol_mappings, left_constants, right_constants)
                    && self.replication == other.replication
            }
            _ => false,
        }
    }

    fn is_stream_partitioned_on(
        &self,
        columns: &HashSet<Symbol>,
        constants: &HashSet<Symbol>,
        replication: Replication,
    ) -> bool {
        self.stream_partitioning
            .as_ref()
            .is_some_and(|partitioning| partitioning.is_partitioned_on(columns, constants))
            && self.replication == replication
    }

    fn is_effectively_single_stream(&self, constants: &HashSet<Symbol>) -> bool {
        self.stream_partitioning
            .as_ref()
            .is_some_and(|partitioning| partitioning.is_effectively_single_partition(constants))
            && self.replication.replicates_nothing()
    }

    fn is_stream_repartition_effective(
        &self,
        keys: &[Symbol],
        constants: &HashSet<Symbol>,
    ) -> bool {
        self.stream_partitioning
            .as_ref()
            .map_or(true, |partitioning| {
                partitioning.is_repartition_effective(keys, constants)
            })
            && self.replication.replicates_nothing()
    }

    fn translate(
        &self,
        translator: &impl Fn(&Symbol) -> Option<Symbol>,
        constants: &impl Fn(&Symbol) -> Option<ScalarValue>,
    ) -> Global {
        Global {
            node_partitioning: self
                .node_partitioning
                .as_ref()
                .and_then(|partitioning| partitioning.translate(translator, constants)),
            stream_partitioning: self
                .stream_partitioning
                .as_ref()
                .and_then(|partitioning| partitioning.translate(translator, constants)),
            replication: self.replication,
        }
    }
}

/// The full property description of one plan subtree's output.
#[derive(Debug, Clone)]
pub struct ActualProperties {
    global: Global,
    local_properties: Vec<LocalProperty>,
    constants: HashMap<Symbol, ScalarValue>,
}

impl ActualProperties {
    /// Build and normalize. The constants map is folded into leading constant
    /// local properties (in symbol order, for construction-order
    /// independence) and the combined list is pruned of implied entries.
    pub fn new(
        global: Global,
        local_properties: Vec<LocalProperty>,
        constants: HashMap<Symbol, ScalarValue>,
    ) -> Self {
        let mut all_constants: BTreeSet<Symbol> =
            local_properties::extract_leading_constants(&local_properties)
                .into_iter()
                .collect();
        all_constants.extend(constants.keys().cloned());

        let mut combined: Vec<LocalProperty> = all_constants
            .into_iter()
            .map(LocalProperty::Constant)
            .collect();
        combined.extend(local_properties::strip_leading_constants(&local_properties));

        Self {
            global,
            local_properties: local_properties::normalize_and_prune(&combined),
            constants,
        }
    }

    pub fn arbitrary() -> Self {
        Self::new(Global::arbitrary_partition(), vec![], HashMap::new())
    }

    pub fn global(&self) -> &Global {
        &self.global
    }

    pub fn local_properties(&self) -> &[LocalProperty] {
        &self.local_properties
    }

    pub fn constants(&self) -> &HashMap<Symbol, ScalarValue> {
        &self.constants
    }

    pub fn replication(&self) -> Replication {
        self.global.replication()
    }

    pub fn node_partitioning(&self) -> Option<&Partitioning> {
        self.global.node_partitioning()
    }

    /// True if the plan will only execute on a single node.
    pub fn is_single_node(&self) -> bool {
        self.global.is_single_node()
    }

    pub fn is_coordinator_only(&self) -> bool {
        self.global.is_coordinator_only()
    }

    pub fn is_node_partitioned_on(
        &self,
        columns: &HashSet<Symbol>,
        replication: Replication,
    ) -> bool {
        self.global
            .is_node_partitioned_on(columns, &self.constant_keys(), replication)
    }

    pub fn is_node_partitioned_on_exact(
        &self,
        partitioning: &Partitioning,
        replication: Replication,
    ) -> bool {
        self.global.is_node_partitioned_on_exact(partitioning, replication)
    }

    /// True when this subtree and `other` are already co-partitioned under
    /// the given symbol equivalence — i.e. a join of the two needs no
    /// shuffle.
    pub fn is_node_partitioned_with(
        &self,
        other: &ActualProperties,
        symbol_mappings: impl Fn(&Symbol) -> HashSet<Symbol>,
    ) -> bool {
        self.global.is_node_partitioned_with(
            &other.global,
            symbol_mappings,
            |symbol| self.constants.get(symbol).cloned(),
            |symbol| other.constants.get(symbol).cloned(),
        )
    }

    pub fn is_stream_partitioned_on(
        &self,
        columns: &HashSet<Symbol>,
        replication: Replication,
    ) -> bool {
        self.global
            .is_stream_partitioned_on(columns, &self.constant_keys(), replication)
    }

    /// True if all the data will effectively land in a single stream.
    ///
    /// Replicated data is never "single stream", even when the partitioning
    /// resolves to one partition — the copies live on every node.
    pub fn is_effectively_single_stream(&self) -> bool {
        self.global.is_effectively_single_stream(&self.constant_keys())
    }

    /// True if repartitioning the streams on `keys` would change the physical
    /// layout. Replicated rows must never be deduplicated by a repartition
    /// that is skipped as "ineffective", so any replication forces `false`.
    pub fn is_stream_repartition_effective(&self, keys: &[Symbol]) -> bool {
        self.global
            .is_stream_repartition_effective(keys, &self.constant_keys())
    }

    /// Remap every symbol via a possibly partial function. Constants,
    /// partitionings and local properties whose symbols have no translation
    /// are dropped — a weaker property is still valid, a misnamed one is not.
    pub fn translate(&self, translator: impl Fn(&Symbol) -> Option<Symbol>) -> ActualProperties {
        let translated_constants: HashMap<Symbol, ScalarValue> = self
            .constants
            .iter()
            .filter_map(|(symbol, value)| {
                translator(symbol).map(|translated| (translated, value.clone()))
            })
            .collect();

        ActualProperties::new(
            self.global
                .translate(&translator, &|symbol| self.constants.get(symbol).cloned()),
            local_properties::translate(&self.local_properties, &translator),
            translated_constants,
        )
    }

    pub fn with_replication(&self, replication: Replication) -> ActualProperties {
        ActualProperties::new(
            self.global.clone().with_replication(replication),
            self.local_properties.clone(),
            self.constants.clone(),
        )
    }

    fn constant_keys(&self) -> HashSet<Symbol> {
        self.constants.keys().cloned().collect()
    }
}

// Constant *values* are excluded: downstream decisions depend on which
// columns are pinned, not what they are pinned to.
impl PartialEq for ActualProperties {
    fn eq(&self, other: &Self) -> bool {
        self.global == other.global
            && self.local_properties == other.local_properties
            && self.constant_keys() == other.constant_keys()
    }
}

impl Eq for ActualProperties {}

impl Hash for ActualProperties {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.global.hash(state);
        self.local_properties.hash(state);
        let keys: BTreeSet<&Symbol> = self.constants.keys().collect();
        keys.hash(state);
    }
}
