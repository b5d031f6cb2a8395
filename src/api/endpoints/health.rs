//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

use crate::api::types::ApiMessage;

#[derive(Serialize)]
pub struct HealthPayload {
    pub version: &'static str,
}

/// `POST /api/health`: process is up and serving.
pub async fn check() -> Json<ApiMessage<HealthPayload>> {
    Json(ApiMessage::new(
        "ok",
        HealthPayload {
            version: crate::config::APP_VERSION,
        },
    ))
}
