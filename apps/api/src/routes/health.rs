use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the semantic backend actually in use.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let capability = state.verifier.capability();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "skillproof",
        "semantic_backend": capability.active,
        "backend_degraded": capability.degraded,
    }))
}
