use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::MaintenanceAuth;
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{ActivateBundle, PromotionType};
use crate::services::{pricing, ActivationService, FairShareService};
use crate::store::Storage;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FairShareQuery {
    #[serde(rename = "type")]
    pub promotion_type: Option<String>,
}

/// POST /api/promotions/quote
/// Prices a bundle of promotion types
pub async fn quote(
    config: web::Data<Config>,
    body: web::Json<QuoteRequest>,
) -> AppResult<HttpResponse> {
    let types = pricing::parse_types(&body.types)?;
    let quote = pricing::quote(&config.pricing, &types)?;
    Ok(HttpResponse::Ok().json(quote))
}

/// POST /api/promotions/activate
/// Confirmed-payment hook, called by trusted internal collaborators
pub async fn activate(
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    body: web::Json<ActivateBundle>,
    _auth: MaintenanceAuth,
) -> AppResult<HttpResponse> {
    let activation =
        ActivationService::activate(storage.get_ref(), &config.pricing, &body, Utc::now()).await?;

    let response = if activation.replayed {
        HttpResponse::Ok().json(activation)
    } else {
        HttpResponse::Created().json(activation)
    };
    Ok(response)
}

/// GET /api/promotions/listings/{listing_id}/fair-share
/// Exposure diagnostics for an advertiser
pub async fn fair_share(
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    path: web::Path<Uuid>,
    query: web::Query<FairShareQuery>,
) -> AppResult<HttpResponse> {
    let listing_id = path.into_inner();
    let promotion_type = query
        .promotion_type
        .as_deref()
        .map(str::parse::<PromotionType>)
        .transpose()?;

    let report = FairShareService::report(
        storage.get_ref(),
        &config.rotation,
        listing_id,
        promotion_type,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(report))
}

/// Configure promotion routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/promotions")
            .route("/quote", web::post().to(quote))
            .route("/activate", web::post().to(activate))
            .route(
                "/listings/{listing_id}/fair-share",
                web::get().to(fair_share),
            ),
    );
}
