use crate::server::router::WaltState;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "walt",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router() -> Router<WaltState> {
    Router::new().route("/health", get(health_handler))
}
