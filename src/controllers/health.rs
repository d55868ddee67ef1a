use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::infrastructure::storage::StorageQuota;

fn round_gb(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn health(State(storage): State<Arc<StorageQuota>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "storage_used_gb": round_gb(storage.usage_gb()),
            "storage_max_gb": round_gb(storage.max_gb()),
        })),
    )
}
