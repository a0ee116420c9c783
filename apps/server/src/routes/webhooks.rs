use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::payment::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::services::PaymentService;
use crate::store::Storage;

/// POST /api/webhooks/payments
/// Signed payment confirmation from a gateway
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes and parsed only after the signature checks out.
pub async fn payment_confirmed(
    req: HttpRequest,
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    };
    let timestamp = header(TIMESTAMP_HEADER);
    let signature = header(SIGNATURE_HEADER);

    let activation = PaymentService::confirm(
        storage.get_ref(),
        &config.pricing,
        &config.security,
        timestamp.as_deref(),
        signature.as_deref(),
        &body,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(activation))
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/webhooks").route("/payments", web::post().to(payment_confirmed)),
    );
}
