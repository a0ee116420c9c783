use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::PromotionType;

/// Listing model - only the fields the promotion engine reads or owns
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub projection: ListingProjection,
}

/// Denormalized promotion fields on a listing
///
/// A pure cache over the listing's live promotions; only the projector
/// writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct ListingProjection {
    pub is_featured: bool,
    pub featured_until: Option<DateTime<Utc>>,
    pub is_top_spot: bool,
    pub top_spot_until: Option<DateTime<Utc>>,
    pub is_boosted: bool,
    pub boosted_until: Option<DateTime<Utc>>,
    pub is_urgent: bool,
    pub urgent_until: Option<DateTime<Utc>>,
    /// Recency tiebreaker for boosted listings in browse ordering
    pub boost_score: Option<DateTime<Utc>>,
}

impl ListingProjection {
    /// Marks `promotion_type` as live until `until`
    pub fn set(&mut self, promotion_type: PromotionType, until: DateTime<Utc>) {
        match promotion_type {
            PromotionType::Featured => {
                self.is_featured = true;
                self.featured_until = Some(until);
            }
            PromotionType::TopSpot => {
                self.is_top_spot = true;
                self.top_spot_until = Some(until);
            }
            PromotionType::Boost => {
                self.is_boosted = true;
                self.boosted_until = Some(until);
            }
            PromotionType::Urgent => {
                self.is_urgent = true;
                self.urgent_until = Some(until);
            }
        }
    }

    /// Flag and expiry projected for `promotion_type`
    pub fn get(&self, promotion_type: PromotionType) -> (bool, Option<DateTime<Utc>>) {
        match promotion_type {
            PromotionType::Featured => (self.is_featured, self.featured_until),
            PromotionType::TopSpot => (self.is_top_spot, self.top_spot_until),
            PromotionType::Boost => (self.is_boosted, self.boosted_until),
            PromotionType::Urgent => (self.is_urgent, self.urgent_until),
        }
    }

    /// True when any flag claims a promotion that has already expired
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        PromotionType::ALL.iter().any(|t| match self.get(*t) {
            (true, Some(until)) => until <= now,
            (true, None) => true,
            _ => false,
        })
    }
}

/// DTO for creating a listing
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListing {
    pub title: String,
    pub category: String,
}
