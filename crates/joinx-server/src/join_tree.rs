//! # Join-Tree Optimization Endpoint
//!
//! A JSON protocol for handing a join tree to the optimizer and getting the
//! rewritten tree back. The coordinator sends just what the passes consume:
//!
//! - **Nodes**: leaves (id + output columns) and joins (type + equi-join
//!   clauses), as a recursive tree.
//! - **Estimates**: per-node output row count and size in bytes, either of
//!   which may be omitted — omitted means unknown, never zero.
//! - **`reorderJoins`**: optional per-request override of the server default.
//!
//! The handler applies `EliminateCrossJoins` followed by
//! `JoinReorderingOptimizer` and returns the resulting tree plus a `changed`
//! flag, so the coordinator can skip re-planning when nothing moved.
//!
//! ## Wire Protocol
//!
//! - Request: `POST /optimize/join-tree` with JSON body ([`JoinTreeRequest`])
//! - Response: JSON body ([`JoinTreeResponse`])
//!
//! Malformed trees (duplicate node ids, unknown join types) are rejected
//! with `400 Bad Request` rather than silently corrected.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use joinx_core::cost::{Estimate, MapCostOracle, PlanCostEstimate};
use joinx_core::plan::{
    EquiJoinClause, JoinNode, JoinType, PlanNode, PlanNodeId, PlanNodeIdAllocator, PlanRef, Symbol,
};
use joinx_core::session::SessionProperties;
use joinx_rules::eliminate_cross_joins::EliminateCrossJoins;
use joinx_rules::join_reordering::JoinReorderingOptimizer;
use joinx_rules::{PlanOptimizer, Rule, RuleContext};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// Request body for `POST /optimize/join-tree`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTreeRequest {
    /// The join tree to rewrite.
    pub root: JoinTreeNode,
    /// Per-node output estimates; nodes without an entry are unknown.
    #[serde(default)]
    pub estimates: Vec<NodeEstimate>,
    /// Overrides the server-wide reorder flag for this request.
    #[serde(default)]
    pub reorder_joins: Option<bool>,
}

/// Output estimates for one node, by id. Omitted fields mean "unknown".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEstimate {
    pub node_id: u32,
    #[serde(default)]
    pub row_count: Option<f64>,
    #[serde(default)]
    pub size_bytes: Option<f64>,
}

/// One equi-join clause on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinClause {
    pub left: String,
    pub right: String,
}

/// A node in the join tree. Serialized untagged: joins carry `left`/`right`,
/// projections carry `input`, leaves carry neither.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinTreeNode {
    Join {
        id: u32,
        #[serde(rename = "joinType")]
        join_type: String,
        #[serde(default)]
        criteria: Vec<JoinClause>,
        left: Box<JoinTreeNode>,
        right: Box<JoinTreeNode>,
    },
    Projection {
        id: u32,
        input: Box<JoinTreeNode>,
        symbols: Vec<String>,
    },
    Leaf {
        id: u32,
        symbols: Vec<String>,
    },
}

/// Response body from the join-tree optimization endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTreeResponse {
    /// The rewritten tree (identical to the input when `changed` is false).
    pub root: JoinTreeNode,
    /// Whether any pass actually rewrote the plan.
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /optimize/join-tree — run the join passes over the supplied tree.
pub async fn optimize_join_tree(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JoinTreeRequest>,
) -> Result<Json<JoinTreeResponse>, (StatusCode, String)> {
    let reorder_joins = request
        .reorder_joins
        .unwrap_or(state.config.reorder_joins);
    run_passes(&request, reorder_joins).map(Json)
}

/// The handler body, separated from axum for direct testing.
fn run_passes(
    request: &JoinTreeRequest,
    reorder_joins: bool,
) -> Result<JoinTreeResponse, (StatusCode, String)> {
    let session = SessionProperties::with_reorder_joins(reorder_joins);

    let mut converter = TreeConverter::default();
    let plan = converter.to_plan(&request.root)?;
    let mut allocator = PlanNodeIdAllocator::new(converter.max_id + 1);

    let mut oracle = MapCostOracle::new();
    for estimate in &request.estimates {
        oracle.insert(
            PlanNodeId(estimate.node_id),
            PlanCostEstimate::new(
                Estimate::from(estimate.row_count),
                Estimate::from(estimate.size_bytes),
            ),
        );
    }

    let mut current = plan.clone();
    let mut context = RuleContext {
        session: &session,
        id_allocator: &mut allocator,
    };
    if let Some(rewritten) = EliminateCrossJoins.apply(&current, &mut context) {
        current = rewritten;
    }

    let optimizer = JoinReorderingOptimizer::new(Arc::new(oracle));
    current = optimizer.optimize(&current, &session, &mut allocator);

    let changed = !Arc::ptr_eq(&current, &plan);
    Ok(JoinTreeResponse {
        root: to_wire(&current),
        changed,
    })
}

// ---------------------------------------------------------------------------
// Wire <-> plan conversion
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TreeConverter {
    seen_ids: HashSet<u32>,
    max_id: u32,
}

impl TreeConverter {
    fn to_plan(&mut self, node: &JoinTreeNode) -> Result<PlanRef, (StatusCode, String)> {
        match node {
            JoinTreeNode::Leaf { id, symbols } => {
                self.register(*id)?;
                Ok(Arc::new(PlanNode::Scan {
                    id: PlanNodeId(*id),
                    output_symbols: symbols.iter().map(Symbol::new).collect(),
                }))
            }
            JoinTreeNode::Projection { id, input, symbols } => {
                self.register(*id)?;
                Ok(Arc::new(PlanNode::Project {
                    id: PlanNodeId(*id),
                    input: self.to_plan(input)?,
                    output_symbols: symbols.iter().map(Symbol::new).collect(),
                }))
            }
            JoinTreeNode::Join {
                id,
                join_type,
                criteria,
                left,
                right,
            } => {
                self.register(*id)?;
                let join_type = parse_join_type(join_type)?;
                let left = self.to_plan(left)?;
                let right = self.to_plan(right)?;
                let output_symbols = left
                    .output_symbols()
                    .iter()
                    .chain(right.output_symbols())
                    .cloned()
                    .collect();
                Ok(Arc::new(PlanNode::Join(JoinNode {
                    id: PlanNodeId(*id),
                    join_type,
                    left,
                    right,
                    criteria: criteria
                        .iter()
                        .map(|clause| {
                            EquiJoinClause::new(
                                Symbol::new(&clause.left),
                                Symbol::new(&clause.right),
                            )
                        })
                        .collect(),
                    output_symbols,
                    filter: None,
                    left_hash_symbol: None,
                    right_hash_symbol: None,
                })))
            }
        }
    }

    fn register(&mut self, id: u32) -> Result<(), (StatusCode, String)> {
        if !self.seen_ids.insert(id) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Duplicate node id: {id}"),
            ));
        }
        self.max_id = self.max_id.max(id);
        Ok(())
    }
}

fn parse_join_type(s: &str) -> Result<JoinType, (StatusCode, String)> {
    match s.to_uppercase().as_str() {
        "INNER" => Ok(JoinType::Inner),
        "LEFT" => Ok(JoinType::Left),
        "RIGHT" => Ok(JoinType::Right),
        "FULL" => Ok(JoinType::Full),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown join type: {other}"),
        )),
    }
}

fn to_wire(plan: &PlanRef) -> JoinTreeNode {
    match &**plan {
        PlanNode::Scan { id, output_symbols } | PlanNode::GroupReference { id, output_symbols } => {
            JoinTreeNode::Leaf {
                id: id.0,
                symbols: output_symbols.iter().map(|s| s.name().to_string()).collect(),
            }
        }
        PlanNode::Project {
            id,
            input,
            output_symbols,
        } => JoinTreeNode::Projection {
            id: id.0,
            input: Box::new(to_wire(input)),
            symbols: output_symbols.iter().map(|s| s.name().to_string()).collect(),
        },
        PlanNode::Join(join) => JoinTreeNode::Join {
            id: join.id.0,
            join_type: join.join_type.to_string(),
            criteria: join
                .criteria
                .iter()
                .map(|clause| JoinClause {
                    left: clause.left.name().to_string(),
                    right: clause.right.name().to_string(),
                })
                .collect(),
            left: Box::new(to_wire(&join.left)),
            right: Box::new(to_wire(&join.right)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: u32, symbols: &[&str]) -> JoinTreeNode {
        JoinTreeNode::Leaf {
            id,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn clause(left: &str, right: &str) -> JoinClause {
        JoinClause {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    fn estimate(node_id: u32, rows: f64, bytes: f64) -> NodeEstimate {
        NodeEstimate {
            node_id,
            row_count: Some(rows),
            size_bytes: Some(bytes),
        }
    }

    #[test]
    fn deserializes_untagged_nodes() {
        let json = r#"{
            "root": {
                "id": 2,
                "joinType": "INNER",
                "criteria": [{"left": "a", "right": "b"}],
                "left": {"id": 0, "symbols": ["a"]},
                "right": {"id": 1, "symbols": ["b"]}
            },
            "estimates": [{"nodeId": 0, "rowCount": 10.0}]
        }"#;
        let request: JoinTreeRequest = serde_json::from_str(json).expect("valid request");
        assert!(matches!(request.root, JoinTreeNode::Join { .. }));
        assert_eq!(request.estimates.len(), 1);
        assert_eq!(request.estimates[0].size_bytes, None);
        assert_eq!(request.reorder_joins, None);
    }

    #[test]
    fn rejects_unknown_join_type() {
        let request = JoinTreeRequest {
            root: JoinTreeNode::Join {
                id: 2,
                join_type: "SEMI".to_string(),
                criteria: vec![],
                left: Box::new(leaf(0, &["a"])),
                right: Box::new(leaf(1, &["b"])),
            },
            estimates: vec![],
            reorder_joins: Some(true),
        };
        let error = run_passes(&request, true).expect_err("must reject");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert!(error.1.contains("SEMI"));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let request = JoinTreeRequest {
            root: JoinTreeNode::Join {
                id: 1,
                join_type: "INNER".to_string(),
                criteria: vec![],
                left: Box::new(leaf(0, &["a"])),
                right: Box::new(leaf(1, &["b"])),
            },
            estimates: vec![],
            reorder_joins: Some(true),
        };
        let error = run_passes(&request, true).expect_err("must reject");
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert!(error.1.contains("Duplicate"));
    }

    #[test]
    fn flips_a_join_by_size() {
        let request = JoinTreeRequest {
            root: JoinTreeNode::Join {
                id: 2,
                join_type: "INNER".to_string(),
                criteria: vec![clause("a", "b")],
                left: Box::new(leaf(0, &["a"])),
                right: Box::new(leaf(1, &["b"])),
            },
            estimates: vec![estimate(0, 10.0, 100.0), estimate(1, 1000.0, 10_000.0)],
            reorder_joins: None,
        };
        let response = run_passes(&request, true).expect("valid request");
        assert!(response.changed);
        let JoinTreeNode::Join { left, criteria, .. } = &response.root else {
            panic!("expected join");
        };
        let JoinTreeNode::Leaf { id, .. } = &**left else {
            panic!("expected leaf");
        };
        assert_eq!(*id, 1, "larger side moves to the left");
        assert_eq!(criteria[0].left, "b");
        assert_eq!(criteria[0].right, "a");
    }

    #[test]
    fn eliminates_cross_joins_before_reordering() {
        let request = JoinTreeRequest {
            root: JoinTreeNode::Join {
                id: 4,
                join_type: "INNER".to_string(),
                criteria: vec![clause("ax", "cx"), clause("by", "cy")],
                left: Box::new(JoinTreeNode::Join {
                    id: 3,
                    join_type: "INNER".to_string(),
                    criteria: vec![],
                    left: Box::new(leaf(0, &["ax"])),
                    right: Box::new(leaf(1, &["by"])),
                }),
                right: Box::new(leaf(2, &["cx", "cy"])),
            },
            estimates: vec![],
            reorder_joins: None,
        };
        let response = run_passes(&request, true).expect("valid request");
        assert!(response.changed);

        // Projection over (A ⋈ C) ⋈ B — the cross join is gone.
        let JoinTreeNode::Projection { input, .. } = &response.root else {
            panic!("expected projection");
        };
        let JoinTreeNode::Join { criteria, left, .. } = &**input else {
            panic!("expected join");
        };
        assert_eq!(criteria.len(), 1);
        let JoinTreeNode::Join { criteria: inner, .. } = &**left else {
            panic!("expected join");
        };
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].left, "ax");
        assert_eq!(inner[0].right, "cx");
    }

    #[test]
    fn disabled_flag_returns_the_tree_unchanged() {
        let request = JoinTreeRequest {
            root: JoinTreeNode::Join {
                id: 2,
                join_type: "INNER".to_string(),
                criteria: vec![clause("a", "b")],
                left: Box::new(leaf(0, &["a"])),
                right: Box::new(leaf(1, &["b"])),
            },
            estimates: vec![estimate(0, 10.0, 100.0), estimate(1, 1000.0, 10_000.0)],
            reorder_joins: Some(false),
        };
        let response = run_passes(&request, false).expect("valid request");
        assert!(!response.changed);
    }
}
