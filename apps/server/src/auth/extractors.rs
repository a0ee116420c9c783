use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::{constant_time_eq, parse_bearer};
use crate::config::Config;
use crate::error::AppError;

/// Extractor for the shared maintenance secret (cron and internal hooks)
///
/// Usage in handlers:
/// ```ignore
/// async fn expire(_auth: MaintenanceAuth) -> HttpResponse {
///     // only reached with a valid `Authorization: Bearer <MAINTENANCE_SECRET>`
/// }
/// ```
pub struct MaintenanceAuth;

impl FromRequest for MaintenanceAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let config = match req.app_data::<web::Data<Config>>() {
            Some(config) => config,
            None => {
                return ready(Err(AppError::Internal(
                    "Configuration not registered".to_string(),
                )));
            }
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        let result = match header {
            None => Err(AppError::Unauthorized(
                "Missing Authorization header".to_string(),
            )),
            Some(header) => match parse_bearer(header) {
                None => Err(AppError::Unauthorized(
                    "Invalid Authorization header format, expected 'Bearer <secret>'".to_string(),
                )),
                Some(token)
                    if constant_time_eq(
                        token.as_bytes(),
                        config.security.maintenance_secret.as_bytes(),
                    ) =>
                {
                    Ok(MaintenanceAuth)
                }
                Some(_) => Err(AppError::Unauthorized(
                    "Invalid maintenance secret".to_string(),
                )),
            },
        };

        ready(result)
    }
}
