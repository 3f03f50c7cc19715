use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "LinguaHub API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Marketplace backend for one-on-one online tutoring",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api": "/api"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
