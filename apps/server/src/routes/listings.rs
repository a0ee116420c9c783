use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::Storage;

/// GET /api/listings/{listing_id}
/// Returns a listing with its promotion projection
pub async fn get_listing(
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let listing_id = path.into_inner();

    let listing = storage
        .get_listing(listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing_id)))?;

    Ok(HttpResponse::Ok().json(listing))
}

/// Configure listing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/listings").route("/{listing_id}", web::get().to(get_listing)));
}
