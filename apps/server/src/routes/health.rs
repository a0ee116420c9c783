use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::store::Storage;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    storage: &'static str,
}

/// Liveness check - is the process running?
/// Returns 200 if the server is alive.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse { status: "ok" })
}

/// Readiness check - can the promotion store be reached?
/// Returns 200 if it can, 503 otherwise.
pub async fn readiness(storage: web::Data<Storage>) -> HttpResponse {
    let healthy = storage.health_check().await;

    let (status, storage_status, http_status) = if healthy {
        ("ready", "ok", StatusCode::OK)
    } else {
        ("not_ready", "error", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = ReadinessResponse {
        status,
        checks: ReadinessChecks {
            storage: storage_status,
        },
    };

    HttpResponse::build(http_status).json(response)
}
