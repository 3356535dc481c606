//! Common routes: health, version and the compiled route tables.

use crate::response::listing;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn routes(State(state): State<AppState>) -> impl IntoResponse {
    listing(state.routes.as_ref().clone())
}

/// Paths served by [`common_routes`]; resources may not claim them.
pub const COMMON_PATHS: [&str; 3] = ["/health", "/version", "/routes"];

/// GET /health, GET /version, GET /routes.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/routes", get(routes))
        .with_state(state)
}
