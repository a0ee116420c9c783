use actix_web::web;

pub mod health;
pub mod listings;
pub mod maintenance;
pub mod promotions;
pub mod rotation;
pub mod webhooks;

/// Registers every route of the service
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(health::liveness))
            .route("/ready", web::get().to(health::readiness)),
    )
    .configure(rotation::configure)
    .configure(promotions::configure)
    .configure(maintenance::configure)
    .configure(webhooks::configure)
    .configure(listings::configure);
}
