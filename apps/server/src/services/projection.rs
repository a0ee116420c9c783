use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ListingProjection, Promotion, PromotionType};
use crate::store::Storage;

/// Derives the listing projection from its promotions
///
/// Rows that are inactive or already expired at `now` are ignored, so the
/// result depends only on the live set.
pub fn project(promotions: &[Promotion], now: DateTime<Utc>) -> ListingProjection {
    let mut projection = ListingProjection::default();

    for promotion in promotions.iter().filter(|p| p.is_live(now)) {
        projection.set(promotion.promotion_type, promotion.expires_at);
        if promotion.promotion_type == PromotionType::Boost {
            projection.boost_score = Some(now);
        }
    }

    projection
}

pub struct ProjectionService;

impl ProjectionService {
    /// Recomputes and writes the full projection of one listing
    pub async fn refresh(
        storage: &Storage,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ListingProjection> {
        let live = storage.live_promotions_for_listing(listing_id, now).await?;
        let projection = project(&live, now);
        storage.write_projection(listing_id, &projection).await?;

        log::debug!(
            "Projected listing {} from {} live promotion(s)",
            listing_id,
            live.len()
        );

        Ok(projection)
    }
}
