use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::RotationConfig;
use crate::error::{AppError, AppResult};
use crate::models::PromotionType;
use crate::store::Storage;

/// How recently a promotion was shown, as reported to the advertiser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShownStatus {
    #[serde(rename = "Never shown")]
    NeverShown,
    #[serde(rename = "Shown recently")]
    ShownRecently,
    #[serde(rename = "Shown today")]
    ShownToday,
    #[serde(rename = "Shown yesterday")]
    ShownYesterday,
    #[serde(rename = "Not shown recently")]
    NotShownRecently,
}

impl ShownStatus {
    pub fn from_last_shown(last_shown_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(shown) = last_shown_at else {
            return ShownStatus::NeverShown;
        };
        let minutes = (now - shown).num_minutes();
        if minutes < 60 {
            ShownStatus::ShownRecently
        } else if minutes < 6 * 60 {
            ShownStatus::ShownToday
        } else if minutes < 24 * 60 {
            ShownStatus::ShownYesterday
        } else {
            ShownStatus::NotShownRecently
        }
    }
}

/// Exposure diagnostics for one promotion of a listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FairShareReport {
    pub listing_id: Uuid,
    pub promotion_type: PromotionType,
    /// Expected share of display opportunities, 0–100
    pub fair_share_percentage: f64,
    pub total_competing_ads: i64,
    pub available_slots: usize,
    pub impressions: i64,
    /// Selections since the last daily reset
    pub impressions_today: i64,
    pub avg_daily_impressions: f64,
    pub last_shown: Option<DateTime<Utc>>,
    pub status: ShownStatus,
}

/// Expected share of selections for one of `competing` ads over `slots`
pub fn fair_share_percentage(slots: usize, competing: i64) -> f64 {
    if competing <= 0 {
        return 0.0;
    }
    let share = (slots as f64 / competing as f64).min(1.0) * 100.0;
    (share * 10.0).round() / 10.0
}

/// Lifetime impressions averaged over the days of the current term
/// (at least one day)
pub fn avg_daily_impressions(
    impressions: i64,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let days = ((now - started_at).num_seconds() as f64 / 86_400.0).max(1.0);
    ((impressions as f64 / days) * 10.0).round() / 10.0
}

pub struct FairShareService;

impl FairShareService {
    /// Builds the fair-share report for a listing
    ///
    /// Without an explicit type the most recently started live promotion of
    /// the listing is reported.
    pub async fn report(
        storage: &Storage,
        config: &RotationConfig,
        listing_id: Uuid,
        promotion_type: Option<PromotionType>,
        now: DateTime<Utc>,
    ) -> AppResult<FairShareReport> {
        let live = storage.live_promotions_for_listing(listing_id, now).await?;

        let promotion = match promotion_type {
            Some(t) => live.iter().find(|p| p.promotion_type == t),
            None => live.iter().max_by_key(|p| p.created_at),
        }
        .ok_or_else(|| {
            AppError::NotFound(match promotion_type {
                Some(t) => format!("Listing {} has no active {} promotion", listing_id, t),
                None => format!("Listing {} has no active promotion", listing_id),
            })
        })?;

        let competing = storage.count_live(promotion.promotion_type, now).await?;
        let slots = config.slots_for(promotion.promotion_type);

        Ok(FairShareReport {
            listing_id,
            promotion_type: promotion.promotion_type,
            fair_share_percentage: fair_share_percentage(slots, competing),
            total_competing_ads: competing,
            available_slots: slots,
            impressions: promotion.impressions,
            impressions_today: promotion.rotation_score,
            avg_daily_impressions: avg_daily_impressions(
                promotion.impressions,
                promotion.created_at,
                now,
            ),
            last_shown: promotion.last_shown_at,
            status: ShownStatus::from_last_shown(promotion.last_shown_at, now),
        })
    }
}
