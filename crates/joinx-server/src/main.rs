//! # joinx-server: HTTP Service for the Join Optimization Passes
//!
//! This binary exposes the joinx passes as a network service, so a
//! coordinator written in another language can hand over a join tree plus
//! per-node cost estimates and receive the rewritten tree without embedding
//! the optimizer in-process.
//!
//! ## Endpoints
//!
//! - `GET  /health`              - Health check
//! - `GET  /passes`              - List the available optimization passes
//! - `POST /optimize/join-tree`  - Rewrite a join tree (JSON protocol)
//!
//! ## Configuration
//!
//! The server listens on `0.0.0.0:3000`. Logging is controlled by the
//! `RUST_LOG` environment variable (defaults to `joinx=debug`).

mod join_tree;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("joinx=debug".parse().unwrap()),
        )
        .init();

    let state = Arc::new(state::AppState::new());

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/passes", get(routes::list_passes))
        .route("/optimize/join-tree", post(join_tree::optimize_join_tree))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("joinx-server listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}
