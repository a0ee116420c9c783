//! Expiry sweep and daily reset.
//!
//! Both jobs are triggered from outside (cron hitting the maintenance
//! endpoints); nothing here owns a timer. Both are idempotent.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::projection::ProjectionService;
use crate::store::Storage;

/// Listing projections refreshed concurrently during a sweep
const REFRESH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct ExpirySummary {
    /// Promotions deactivated by this sweep
    pub deactivated: usize,
    /// Listings whose projection was recomputed
    pub listings_refreshed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetSummary {
    pub reset: u64,
}

pub struct MaintenanceService;

impl MaintenanceService {
    /// Deactivates every promotion whose `expires_at` has passed, then
    /// re-projects every affected listing
    ///
    /// Listings whose projection still claims an expired promotion are
    /// refreshed as well, so a sweep that failed half way heals on the next
    /// run.
    pub async fn expire(storage: &Storage, now: DateTime<Utc>) -> AppResult<ExpirySummary> {
        let expired = storage.deactivate_expired(now).await?;

        let mut listing_ids: BTreeSet<Uuid> = expired.iter().map(|p| p.listing_id).collect();
        listing_ids.extend(storage.listings_with_stale_projection(now).await?);

        let listings_refreshed = listing_ids.len();
        stream::iter(listing_ids)
            .map(|listing_id| ProjectionService::refresh(storage, listing_id, now))
            .buffer_unordered(REFRESH_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;

        if expired.is_empty() && listings_refreshed == 0 {
            log::debug!("Expiry sweep: nothing to do");
        } else {
            log::info!(
                "Expiry sweep: deactivated {} promotion(s), refreshed {} listing(s)",
                expired.len(),
                listings_refreshed
            );
        }

        Ok(ExpirySummary {
            deactivated: expired.len(),
            listings_refreshed,
        })
    }

    /// Zeroes the day-scoped rotation score of every live promotion.
    /// Lifetime impressions and last_shown_at are left untouched.
    pub async fn daily_reset(storage: &Storage, now: DateTime<Utc>) -> AppResult<ResetSummary> {
        let reset = storage.reset_rotation_scores(now).await?;
        log::info!("Daily reset: rotation score cleared on {} promotion(s)", reset);
        Ok(ResetSummary { reset })
    }
}
