use axum::Json;
use serde_json::{json, Value};

/// Liveness probe
pub async fn ping() -> Json<Value> {
    Json(json!({ "success": true }))
}
