use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::PromotionType;
use crate::services::{RotationRequest, RotationService};
use crate::store::Storage;

#[derive(Debug, Deserialize)]
pub struct RotationQuery {
    pub category: Option<String>,
    pub slots: Option<usize>,
}

/// GET /api/rotation/{promotion_type}
/// Selects the promoted listings to render for a placement type.
///
/// On an error response callers fall back to their unpromoted ordering.
pub async fn select(
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    path: web::Path<String>,
    query: web::Query<RotationQuery>,
) -> AppResult<HttpResponse> {
    let promotion_type: PromotionType = path.into_inner().parse()?;
    let query = query.into_inner();

    let request = RotationRequest {
        promotion_type,
        category: query.category,
        slots: query.slots,
    };

    let rotation =
        RotationService::select(storage.get_ref(), &config.rotation, &request, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(rotation))
}

/// Configure rotation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/rotation").route("/{promotion_type}", web::get().to(select)),
    );
}
