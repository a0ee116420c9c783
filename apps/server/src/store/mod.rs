//! Promotion store abstraction.
//!
//! The store is the only shared mutable state in the service. Every counter
//! change goes through a relative-update primitive
//! ([`PromotionStore::increment_exposure`]) so concurrent selections of the
//! same promotion never lose an increment. [`Storage`] wraps a backend and
//! bounds every call with the configured timeout.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    BundleApplied, BundleWrite, Candidate, CreateListing, ExpiredPromotion, Listing,
    ListingProjection, Promotion, PromotionType,
};

pub use memory::MemoryPromotionStore;
pub use postgres::PgPromotionStore;

// =============================================================================
// Store Trait
// =============================================================================

/// Durable promotion storage
#[async_trait]
pub trait PromotionStore: Send + Sync {
    async fn create_listing(&self, input: &CreateListing) -> AppResult<Listing>;

    async fn get_listing(&self, id: Uuid) -> AppResult<Option<Listing>>;

    /// Rows of a listing that are active and unexpired at `now`
    async fn live_promotions_for_listing(
        &self,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Promotion>>;

    /// Overwrites every projected field of a listing in one update
    async fn write_projection(
        &self,
        listing_id: Uuid,
        projection: &ListingProjection,
    ) -> AppResult<()>;

    /// Listings whose projection still shows a flag past its expiry
    async fn listings_with_stale_projection(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>>;

    /// Writes every item of a bundle atomically, extending live rows of the
    /// same type in place. A payment reference that was already processed
    /// writes nothing and reports a replay.
    async fn apply_bundle(&self, bundle: &BundleWrite) -> AppResult<BundleApplied>;

    /// Live promotions of a type joined with their listing
    async fn rotation_candidates(
        &self,
        promotion_type: PromotionType,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Candidate>>;

    /// Adds `by` to impressions and rotation_score and stamps last_shown_at.
    /// Returns the number of rows touched.
    async fn increment_exposure(
        &self,
        promotion_ids: &[Uuid],
        by: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Deactivates every active row with `expires_at <= now`
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredPromotion>>;

    /// Zeroes rotation_score on every live row
    async fn reset_rotation_scores(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Number of live promotions of a type across all categories
    async fn count_live(&self, promotion_type: PromotionType, now: DateTime<Utc>)
        -> AppResult<i64>;

    async fn health_check(&self) -> bool;
}

// =============================================================================
// Timeout-bounded Storage Handle
// =============================================================================

/// Runs a storage future, failing with a retryable error once `limit` passes
pub async fn bounded<T, F>(limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StorageTimeout(limit)),
    }
}

/// Shared handle to the promotion store used by every service
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn PromotionStore>,
    timeout: Duration,
}

impl Storage {
    pub fn new(backend: Arc<dyn PromotionStore>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// In-memory storage, for tests and local runs
    pub fn in_memory(timeout: Duration) -> Self {
        Self::new(Arc::new(MemoryPromotionStore::new()), timeout)
    }

    pub async fn create_listing(&self, input: &CreateListing) -> AppResult<Listing> {
        bounded(self.timeout, self.backend.create_listing(input)).await
    }

    pub async fn get_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        bounded(self.timeout, self.backend.get_listing(id)).await
    }

    pub async fn live_promotions_for_listing(
        &self,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Promotion>> {
        bounded(
            self.timeout,
            self.backend.live_promotions_for_listing(listing_id, now),
        )
        .await
    }

    pub async fn write_projection(
        &self,
        listing_id: Uuid,
        projection: &ListingProjection,
    ) -> AppResult<()> {
        bounded(
            self.timeout,
            self.backend.write_projection(listing_id, projection),
        )
        .await
    }

    pub async fn listings_with_stale_projection(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        bounded(self.timeout, self.backend.listings_with_stale_projection(now)).await
    }

    pub async fn apply_bundle(&self, bundle: &BundleWrite) -> AppResult<BundleApplied> {
        bounded(self.timeout, self.backend.apply_bundle(bundle)).await
    }

    pub async fn rotation_candidates(
        &self,
        promotion_type: PromotionType,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Candidate>> {
        bounded(
            self.timeout,
            self.backend.rotation_candidates(promotion_type, category, now),
        )
        .await
    }

    pub async fn increment_exposure(
        &self,
        promotion_ids: &[Uuid],
        by: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if promotion_ids.is_empty() {
            return Ok(0);
        }
        bounded(
            self.timeout,
            self.backend.increment_exposure(promotion_ids, by, now),
        )
        .await
    }

    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredPromotion>> {
        bounded(self.timeout, self.backend.deactivate_expired(now)).await
    }

    pub async fn reset_rotation_scores(&self, now: DateTime<Utc>) -> AppResult<u64> {
        bounded(self.timeout, self.backend.reset_rotation_scores(now)).await
    }

    pub async fn count_live(
        &self,
        promotion_type: PromotionType,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        bounded(self.timeout, self.backend.count_live(promotion_type, now)).await
    }

    /// Never fails: a timed-out check reports unhealthy
    pub async fn health_check(&self) -> bool {
        tokio::time::timeout(self.timeout, self.backend.health_check())
            .await
            .unwrap_or(false)
    }
}
