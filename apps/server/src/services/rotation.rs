//! Rotation scheduler.
//!
//! Decides on every read which promoted listings occupy the visible slots of
//! a placement type, then records the exposure of exactly the selected rows
//! with a relative counter update.
//!
//! Featured, top spot and urgent slots are ranked by a fairness score:
//!
//! ```text
//! score = hours_since_last_shown
//!       - impression_weight     * impressions
//!       - daily_exposure_weight * rotation_score
//!       + uniform(0, random_factor)
//! ```
//!
//! A never-shown promotion counts as [`NEVER_SHOWN_HOURS`] stale. Boosted
//! listings are instead shuffled with a generator seeded by the hourly
//! rotation group and the candidate set, so the order is stable within a
//! bucket and needs no per-request randomness.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::RotationConfig;
pub use crate::config::MAX_SLOTS;
use crate::error::{AppError, AppResult};
use crate::models::{Candidate, PromotedListing, Promotion, PromotionType};
use crate::store::Storage;

/// Staleness assigned to a promotion that has never been shown
pub const NEVER_SHOWN_HOURS: f64 = 1_000_000.0;


// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RotationRequest {
    pub promotion_type: PromotionType,
    pub category: Option<String>,
    /// Overrides the configured slot count for the type
    pub slots: Option<usize>,
}

impl RotationRequest {
    pub fn new(promotion_type: PromotionType) -> Self {
        Self {
            promotion_type,
            category: None,
            slots: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = Some(slots);
        self
    }
}

/// Result of one rotation call
#[derive(Debug, Clone, Serialize)]
pub struct Rotation {
    pub promotion_type: PromotionType,
    pub slots: usize,
    pub total_candidates: usize,
    /// Shuffle bucket, boost only
    pub rotation_group: Option<i64>,
    pub listings: Vec<PromotedListing>,
}

// =============================================================================
// Scoring
// =============================================================================

/// Hours since the promotion was last selected, or [`NEVER_SHOWN_HOURS`]
pub fn hours_since_last_shown(last_shown_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_shown_at {
        None => NEVER_SHOWN_HOURS,
        Some(shown) => (now - shown).num_milliseconds().max(0) as f64 / 3_600_000.0,
    }
}

/// Fairness score with an explicit jitter value
pub fn fairness_score(
    promotion: &Promotion,
    config: &RotationConfig,
    now: DateTime<Utc>,
    jitter: f64,
) -> f64 {
    hours_since_last_shown(promotion.last_shown_at, now)
        - config.impression_weight * promotion.impressions as f64
        - config.daily_exposure_weight * promotion.rotation_score as f64
        + jitter
}

/// Uniform jitter in `[0, random_factor)`
pub fn draw_jitter<R: Rng + ?Sized>(config: &RotationConfig, rng: &mut R) -> f64 {
    if config.random_factor > 0.0 {
        rng.random_range(0.0..config.random_factor)
    } else {
        0.0
    }
}

/// Picks the top `slots` candidates by fairness score
///
/// With no more candidates than slots every candidate is returned unscored.
pub fn rank_by_fairness<R: Rng + ?Sized>(
    candidates: Vec<Candidate>,
    slots: usize,
    config: &RotationConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Candidate> {
    if candidates.len() <= slots {
        return candidates;
    }

    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| {
            let jitter = draw_jitter(config, rng);
            (fairness_score(&c.promotion, config, now, jitter), c)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(slots);
    scored.into_iter().map(|(_, c)| c).collect()
}

// =============================================================================
// Boost Shuffle
// =============================================================================

/// Hourly bucket: `floor(hours_since_epoch / interval_hours)`
pub fn boost_rotation_group(now: DateTime<Utc>, interval_hours: i64) -> i64 {
    now.timestamp()
        .div_euclid(3600)
        .div_euclid(interval_hours.max(1))
}

/// Seed derived from the rotation group and the (sorted) candidate ids
pub fn boost_seed(sorted_ids: &[Uuid], rotation_group: i64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(rotation_group.to_be_bytes());
    for id in sorted_ids {
        hasher.update(id.as_bytes());
    }
    let digest = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(seed)
}

/// Deterministic permutation of the candidates for a rotation group,
/// truncated to `slots`
pub fn shuffle_boosted(
    mut candidates: Vec<Candidate>,
    slots: usize,
    rotation_group: i64,
) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.promotion.id);
    let ids: Vec<Uuid> = candidates.iter().map(|c| c.promotion.id).collect();

    let mut rng = StdRng::seed_from_u64(boost_seed(&ids, rotation_group));
    candidates.shuffle(&mut rng);
    candidates.truncate(slots);
    candidates
}

// =============================================================================
// Service
// =============================================================================

pub struct RotationService;

impl RotationService {
    /// Selects the listings to show for a placement type and records their
    /// exposure
    pub async fn select(
        storage: &Storage,
        config: &RotationConfig,
        request: &RotationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Rotation> {
        let slots = Self::resolve_slots(config, request)?;
        let candidates = Self::load(storage, request, now).await?;
        let total_candidates = candidates.len();

        let (selected, rotation_group) =
            Self::choose(config, request.promotion_type, candidates, slots, now, &mut rand::rng());

        Self::record(storage, request, slots, total_candidates, rotation_group, selected, now).await
    }

    /// Same as [`RotationService::select`] with a caller-supplied generator
    pub async fn select_with_rng<R: Rng + ?Sized>(
        storage: &Storage,
        config: &RotationConfig,
        request: &RotationRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> AppResult<Rotation> {
        let slots = Self::resolve_slots(config, request)?;
        let candidates = Self::load(storage, request, now).await?;
        let total_candidates = candidates.len();

        let (selected, rotation_group) =
            Self::choose(config, request.promotion_type, candidates, slots, now, rng);

        Self::record(storage, request, slots, total_candidates, rotation_group, selected, now).await
    }

    fn resolve_slots(config: &RotationConfig, request: &RotationRequest) -> AppResult<usize> {
        match request.slots {
            Some(slots) if (1..=MAX_SLOTS).contains(&slots) => Ok(slots),
            Some(slots) => Err(AppError::Validation(format!(
                "slots must be between 1 and {}, got {}",
                MAX_SLOTS, slots
            ))),
            None => Ok(config.slots_for(request.promotion_type)),
        }
    }

    async fn load(
        storage: &Storage,
        request: &RotationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Candidate>> {
        let category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        storage
            .rotation_candidates(request.promotion_type, category, now)
            .await
    }

    fn choose<R: Rng + ?Sized>(
        config: &RotationConfig,
        promotion_type: PromotionType,
        candidates: Vec<Candidate>,
        slots: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> (Vec<Candidate>, Option<i64>) {
        match promotion_type {
            PromotionType::Boost => {
                let group = boost_rotation_group(now, config.boost_rotation_interval_hours);
                (shuffle_boosted(candidates, slots, group), Some(group))
            }
            _ => (rank_by_fairness(candidates, slots, config, now, rng), None),
        }
    }

    async fn record(
        storage: &Storage,
        request: &RotationRequest,
        slots: usize,
        total_candidates: usize,
        rotation_group: Option<i64>,
        selected: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> AppResult<Rotation> {
        let ids: Vec<Uuid> = selected.iter().map(|c| c.promotion.id).collect();
        storage.increment_exposure(&ids, 1, now).await?;

        log::debug!(
            "Rotation {}: {} of {} candidate(s) selected for {} slot(s)",
            request.promotion_type,
            selected.len(),
            total_candidates,
            slots
        );

        Ok(Rotation {
            promotion_type: request.promotion_type,
            slots,
            total_candidates,
            rotation_group,
            listings: selected.iter().map(PromotedListing::from).collect(),
        })
    }
}
