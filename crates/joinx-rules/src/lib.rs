//! # joinx-rules: Join Optimization Passes
//!
//! The two rewrite passes of the join optimizer:
//!
//! - **[`join_reordering::JoinReorderingOptimizer`]**: a whole-tree pass that
//!   flips the sides of each binary join when the cost oracle says the right
//!   input is the larger one, so the physical join always sees its bigger
//!   input on the left.
//! - **[`eliminate_cross_joins::EliminateCrossJoins`]**: a rule that rebuilds
//!   a connected component of inner/cross joins into a left-deep chain of
//!   equi-joins, spending every available join predicate before falling back
//!   to a cross join.
//!
//! Both passes are pure rewrites: they construct fresh trees bottom-up,
//! share unchanged subtrees by `Arc`, and never mutate their input. A pass
//! abandoned mid-query leaves no state behind.

pub mod eliminate_cross_joins;
pub mod join_reordering;

use joinx_core::plan::{PlanNodeIdAllocator, PlanRef};
use joinx_core::session::SessionProperties;

/// A whole-tree optimization pass, applied once per query between planning
/// stages. Implementations must return the input `PlanRef` itself (not a
/// rebuilt copy) when nothing changes, so callers can cheaply detect no-ops.
pub trait PlanOptimizer {
    fn optimize(
        &self,
        plan: &PlanRef,
        session: &SessionProperties,
        id_allocator: &mut PlanNodeIdAllocator,
    ) -> PlanRef;
}

/// Context handed to rules by the surrounding rule engine.
pub struct RuleContext<'a> {
    pub session: &'a SessionProperties,
    pub id_allocator: &'a mut PlanNodeIdAllocator,
}

/// A targeted rewrite invoked by a rule engine wherever its shape matches.
///
/// `apply` returns `None` when the rule does not fire — the engine keeps the
/// original node and records no change.
pub trait Rule {
    fn name(&self) -> &str;

    fn apply(&self, node: &PlanRef, context: &mut RuleContext<'_>) -> Option<PlanRef>;
}
