//! Unit tests for the promotion lifecycle
//!
//! Activation, extension, payment replay, expiry sweep, daily reset and
//! the fair-share report, all against the in-memory store.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use promoslot::config::{PricingConfig, RotationConfig};
use promoslot::error::AppError;
use promoslot::models::{ActivateBundle, PromotionType};
use promoslot::services::projection::project;
use promoslot::services::{
    ActivationService, FairShareService, MaintenanceService, RotationRequest, RotationService,
    ShownStatus,
};
use promoslot::store::Storage;
use uuid::Uuid;

use crate::common::{activate, create_listing, memory_storage};

async fn assert_projection_matches_live(storage: &Storage, listing_id: Uuid) {
    let now = Utc::now();
    let listing = storage.get_listing(listing_id).await.unwrap().unwrap();
    let live = storage
        .live_promotions_for_listing(listing_id, now)
        .await
        .unwrap();
    let expected = project(&live, now);

    for t in PromotionType::ALL {
        assert_eq!(listing.projection.get(t), expected.get(t), "{} drifted", t);
    }
}

// =============================================================================
// Activation
// =============================================================================

#[tokio::test]
async fn test_bundle_activation_writes_rows_and_projection() {
    let (_, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Bike", "bikes").await;

    let activation = activate(&storage, listing.id, &["urgent", "featured"], Some("P1"), now).await;

    assert!(!activation.replayed);
    assert!(activation.extended.is_empty());
    assert_eq!(activation.quote.total, 500 + 200 - 200);
    assert_eq!(activation.promotions.len(), 2);

    let featured = &activation.promotions[0];
    assert_eq!(featured.promotion_type, PromotionType::Featured);
    assert_eq!(featured.expires_at, now + Duration::days(7));
    assert_eq!(featured.payment_reference.as_deref(), Some("P1"));
    assert_eq!(featured.impressions, 0);
    assert!(featured.is_active);

    let urgent = &activation.promotions[1];
    assert_eq!(urgent.promotion_type, PromotionType::Urgent);
    assert_eq!(urgent.expires_at, now + Duration::days(5));
    assert_eq!(
        featured.amount_paid + urgent.amount_paid,
        activation.quote.total
    );

    let projection = &activation.projection;
    assert!(projection.is_featured);
    assert_eq!(projection.featured_until, Some(now + Duration::days(7)));
    assert!(projection.is_urgent);
    assert_eq!(projection.urgent_until, Some(now + Duration::days(5)));
    assert!(!projection.is_top_spot);
    assert!(!projection.is_boosted);
    assert_eq!(projection.boost_score, None);

    let stored = storage.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(&stored.projection, projection);
}

#[tokio::test]
async fn test_new_payment_extends_live_promotion() {
    let (backend, storage) = memory_storage();
    let first_at = Utc::now() - Duration::days(2);
    let listing = create_listing(&storage, "Van", "cars").await;
    let first = activate(&storage, listing.id, &["featured"], Some("P1"), first_at).await;

    let now = Utc::now();
    let second = activate(&storage, listing.id, &["featured"], Some("P2"), now).await;

    assert_eq!(second.extended, vec![PromotionType::Featured]);
    assert_eq!(second.promotions[0].id, first.promotions[0].id);
    assert_eq!(second.promotions[0].created_at, now);
    assert_eq!(second.promotions[0].expires_at, now + Duration::days(7));
    assert_eq!(second.promotions[0].payment_reference.as_deref(), Some("P2"));

    let active: Vec<_> = backend
        .all_promotions()
        .unwrap()
        .into_iter()
        .filter(|p| p.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(second.projection.featured_until, Some(now + Duration::days(7)));
}

#[tokio::test]
async fn test_replayed_payment_reference_writes_nothing() {
    let (backend, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Sofa", "home").await;
    let first = activate(&storage, listing.id, &["featured", "urgent"], Some("P1"), now).await;

    let later = now + Duration::hours(1);
    let replay = activate(&storage, listing.id, &["featured", "urgent"], Some("P1"), later).await;

    assert!(replay.replayed);
    assert!(replay.extended.is_empty());
    let ids = |a: &promoslot::services::Activation| {
        let mut ids: Vec<Uuid> = a.promotions.iter().map(|p| p.id).collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&replay), ids(&first));

    let rows = backend.all_promotions().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|p| p.created_at == now));
}

#[tokio::test]
async fn test_reference_reused_for_another_bundle_is_rejected() {
    let (backend, storage) = memory_storage();
    let pricing = PricingConfig::default();
    let now = Utc::now();
    let paid = create_listing(&storage, "Sofa", "home").await;
    let other = create_listing(&storage, "Chair", "home").await;
    activate(&storage, paid.id, &["featured"], Some("R"), now).await;

    let other_listing = ActivateBundle {
        listing_id: other.id,
        types: vec!["urgent".to_string()],
        payment_reference: Some("R".to_string()),
    };
    assert!(matches!(
        ActivationService::activate(&storage, &pricing, &other_listing, now).await,
        Err(AppError::PaymentVerification(_))
    ));

    let other_types = ActivateBundle {
        listing_id: paid.id,
        types: vec!["featured".to_string(), "boost".to_string()],
        payment_reference: Some("R".to_string()),
    };
    assert!(matches!(
        ActivationService::activate(&storage, &pricing, &other_types, now).await,
        Err(AppError::PaymentVerification(_))
    ));

    let rows = backend.all_promotions().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows.iter().all(|p| p.listing_id == paid.id));
    let untouched = storage.get_listing(other.id).await.unwrap().unwrap();
    assert!(!untouched.projection.is_urgent);

    let genuine = activate(&storage, paid.id, &["featured"], Some("R"), now).await;
    assert!(genuine.replayed);
}

#[tokio::test]
async fn test_oversized_term_fails_without_writing() {
    let (backend, storage) = memory_storage();
    let mut pricing = PricingConfig::default();
    pricing.featured.duration_days = 200_000_000;
    let listing = create_listing(&storage, "Desk", "home").await;

    let input = ActivateBundle {
        listing_id: listing.id,
        types: vec!["featured".to_string()],
        payment_reference: Some("P1".to_string()),
    };
    let result = ActivationService::activate(&storage, &pricing, &input, Utc::now()).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(backend.all_promotions().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_unswept_row_is_replaced_not_extended() {
    let (backend, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Lamp", "home").await;
    let stale = activate(&storage, listing.id, &["boost"], None, now - Duration::days(4)).await;

    let fresh = activate(&storage, listing.id, &["boost"], None, now).await;

    assert!(fresh.extended.is_empty());
    assert_ne!(fresh.promotions[0].id, stale.promotions[0].id);
    assert_eq!(fresh.projection.boost_score, Some(now));

    let rows = backend.all_promotions().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|p| p.is_active).count(), 1);
}

#[tokio::test]
async fn test_activation_rejects_bad_input() {
    let (_, storage) = memory_storage();
    let pricing = PricingConfig::default();
    let now = Utc::now();
    let listing = create_listing(&storage, "Desk", "home").await;

    let unknown_listing = ActivateBundle {
        listing_id: Uuid::new_v4(),
        types: vec!["featured".to_string()],
        payment_reference: None,
    };
    assert!(matches!(
        ActivationService::activate(&storage, &pricing, &unknown_listing, now).await,
        Err(AppError::NotFound(_))
    ));

    let blank_reference = ActivateBundle {
        listing_id: listing.id,
        types: vec!["featured".to_string()],
        payment_reference: Some("  ".to_string()),
    };
    assert!(matches!(
        ActivationService::activate(&storage, &pricing, &blank_reference, now).await,
        Err(AppError::Validation(_))
    ));

    let duplicate_types = ActivateBundle {
        listing_id: listing.id,
        types: vec!["urgent".to_string(), "urgent".to_string()],
        payment_reference: None,
    };
    assert!(matches!(
        ActivationService::activate(&storage, &pricing, &duplicate_types, now).await,
        Err(AppError::Validation(_))
    ));
}

// =============================================================================
// Expiry Sweep
// =============================================================================

#[tokio::test]
async fn test_sweep_deactivates_expired_promotions_once() {
    let (backend, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Car", "cars").await;
    activate(&storage, listing.id, &["urgent"], None, now - Duration::days(6)).await;
    activate(&storage, listing.id, &["featured"], None, now).await;

    let first = MaintenanceService::expire(&storage, now).await.unwrap();
    assert_eq!(first.deactivated, 1);
    assert_eq!(first.listings_refreshed, 1);

    let stored = storage.get_listing(listing.id).await.unwrap().unwrap();
    assert!(!stored.projection.is_urgent);
    assert_eq!(stored.projection.urgent_until, None);
    assert!(stored.projection.is_featured);

    let second = MaintenanceService::expire(&storage, now).await.unwrap();
    assert_eq!(second.deactivated, 0);
    assert_eq!(second.listings_refreshed, 0);

    // Selection never brings an expired row back
    RotationService::select(
        &storage,
        &RotationConfig::default(),
        &RotationRequest::new(PromotionType::Urgent),
        now,
    )
    .await
    .unwrap();
    let urgent = backend
        .all_promotions()
        .unwrap()
        .into_iter()
        .find(|p| p.promotion_type == PromotionType::Urgent)
        .unwrap();
    assert!(!urgent.is_active);
    assert_eq!(urgent.impressions, 0);

    assert_projection_matches_live(&storage, listing.id).await;
}

#[tokio::test]
async fn test_sweep_heals_projection_left_stale() {
    let (_, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Boat", "boats").await;
    activate(&storage, listing.id, &["boost"], None, now - Duration::days(4)).await;

    // Rows deactivated by an earlier sweep that never got to re-project
    let expired = storage.deactivate_expired(now).await.unwrap();
    assert_eq!(expired.len(), 1);
    let stale = storage.get_listing(listing.id).await.unwrap().unwrap();
    assert!(stale.projection.is_boosted);

    let summary = MaintenanceService::expire(&storage, now).await.unwrap();
    assert_eq!(summary.deactivated, 0);
    assert_eq!(summary.listings_refreshed, 1);

    let healed = storage.get_listing(listing.id).await.unwrap().unwrap();
    assert!(!healed.projection.is_boosted);
    assert_eq!(healed.projection.boost_score, None);
}

// =============================================================================
// Daily Reset
// =============================================================================

#[tokio::test]
async fn test_daily_reset_clears_rotation_score_only() {
    let (backend, storage) = memory_storage();
    let now = Utc::now();
    let listing = create_listing(&storage, "Tent", "outdoors").await;
    activate(&storage, listing.id, &["featured"], None, now).await;

    let request = RotationRequest::new(PromotionType::Featured);
    for _ in 0..3 {
        RotationService::select(&storage, &RotationConfig::default(), &request, now)
            .await
            .unwrap();
    }

    let summary = MaintenanceService::daily_reset(&storage, now).await.unwrap();
    assert_eq!(summary.reset, 1);

    let row = &backend.all_promotions().unwrap()[0];
    assert_eq!(row.rotation_score, 0);
    assert_eq!(row.impressions, 3);
    assert_eq!(row.last_shown_at, Some(now));
}

// =============================================================================
// Fair Share Report
// =============================================================================

#[tokio::test]
async fn test_fair_share_report() {
    let (_, storage) = memory_storage();
    let config = RotationConfig::default();
    let now = Utc::now();

    let mut listings = Vec::new();
    for i in 0..5 {
        let listing = create_listing(&storage, &format!("Flat {}", i), "homes").await;
        activate(&storage, listing.id, &["featured"], None, now).await;
        listings.push(listing.id);
    }

    let before = FairShareService::report(&storage, &config, listings[0], None, now)
        .await
        .unwrap();
    assert_eq!(before.promotion_type, PromotionType::Featured);
    assert_eq!(before.total_competing_ads, 5);
    assert_eq!(before.available_slots, 2);
    assert_eq!(before.fair_share_percentage, 40.0);
    assert_eq!(before.status, ShownStatus::NeverShown);

    // Keep selecting until the first listing has been shown
    let request = RotationRequest::new(PromotionType::Featured);
    for _ in 0..5 {
        RotationService::select(&storage, &config, &request, now)
            .await
            .unwrap();
    }

    let after = FairShareService::report(
        &storage,
        &config,
        listings[0],
        Some(PromotionType::Featured),
        now + Duration::minutes(5),
    )
    .await
    .unwrap();
    assert!(after.impressions > 0);
    assert_eq!(after.status, ShownStatus::ShownRecently);
    assert_eq!(after.last_shown, Some(now));

    let missing = FairShareService::report(
        &storage,
        &config,
        listings[0],
        Some(PromotionType::Urgent),
        now,
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
