//! # HTTP Route Handlers
//!
//! Small informational endpoints. The optimization endpoint itself lives in
//! [`crate::join_tree`] next to its wire-protocol types.

use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /passes — list the optimization passes this server applies, in order.
pub async fn list_passes() -> impl IntoResponse {
    Json(PassesResponse {
        passes: vec![
            PassInfo {
                name: "EliminateCrossJoins".to_string(),
                kind: "rule".to_string(),
            },
            PassInfo {
                name: "JoinReorderingOptimizer".to_string(),
                kind: "optimizer".to_string(),
            },
        ],
    })
}

#[derive(Serialize)]
pub struct PassesResponse {
    pub passes: Vec<PassInfo>,
}

#[derive(Serialize)]
pub struct PassInfo {
    pub name: String,
    pub kind: String,
}
