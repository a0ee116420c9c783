use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::auth::MaintenanceAuth;
use crate::error::AppResult;
use crate::services::MaintenanceService;
use crate::store::Storage;

/// POST /api/maintenance/expire
/// Runs the expiry sweep (external cron, hourly or more often)
pub async fn expire(storage: web::Data<Storage>, _auth: MaintenanceAuth) -> AppResult<HttpResponse> {
    let summary = MaintenanceService::expire(storage.get_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// POST /api/maintenance/daily-reset
/// Clears the day-scoped rotation score (external cron, once a day)
pub async fn daily_reset(
    storage: web::Data<Storage>,
    _auth: MaintenanceAuth,
) -> AppResult<HttpResponse> {
    let summary = MaintenanceService::daily_reset(storage.get_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Configure maintenance routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/maintenance")
            .route("/expire", web::post().to(expire))
            .route("/daily-reset", web::post().to(daily_reset)),
    );
}
