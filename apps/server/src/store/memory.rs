//! In-memory promotion store.
//!
//! Every operation runs inside one short critical section of a std mutex,
//! so relative counter updates and bundle writes are atomic. The lock is
//! never held across an await point.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::PromotionStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    BundleApplied, BundlePayment, BundleWrite, Candidate, CreateListing, ExpiredPromotion,
    Listing, ListingProjection, Promotion, PromotionType,
};

#[derive(Default)]
struct MemoryState {
    listings: HashMap<Uuid, Listing>,
    promotions: Vec<Promotion>,
    payments: HashMap<String, BundlePayment>,
}

impl MemoryState {
    fn live_for_listing(&self, listing_id: Uuid, now: DateTime<Utc>) -> Vec<Promotion> {
        let mut live: Vec<Promotion> = self
            .promotions
            .iter()
            .filter(|p| p.listing_id == listing_id && p.is_live(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        live
    }
}

#[derive(Default)]
pub struct MemoryPromotionStore {
    state: Mutex<MemoryState>,
}

impl MemoryPromotionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Memory store lock poisoned".to_string()))
    }

    /// Every row ever written, including expired ones
    pub fn all_promotions(&self) -> AppResult<Vec<Promotion>> {
        Ok(self.lock()?.promotions.clone())
    }
}

#[async_trait]
impl PromotionStore for MemoryPromotionStore {
    async fn create_listing(&self, input: &CreateListing) -> AppResult<Listing> {
        let listing = Listing {
            id: Uuid::new_v4(),
            title: input.title.clone(),
            category: input.category.clone(),
            created_at: Utc::now(),
            projection: ListingProjection::default(),
        };
        self.lock()?.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn get_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        Ok(self.lock()?.listings.get(&id).cloned())
    }

    async fn live_promotions_for_listing(
        &self,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Promotion>> {
        Ok(self.lock()?.live_for_listing(listing_id, now))
    }

    async fn write_projection(
        &self,
        listing_id: Uuid,
        projection: &ListingProjection,
    ) -> AppResult<()> {
        let mut state = self.lock()?;
        let listing = state
            .listings
            .get_mut(&listing_id)
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing_id)))?;
        listing.projection = projection.clone();
        Ok(())
    }

    async fn listings_with_stale_projection(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        Ok(self
            .lock()?
            .listings
            .values()
            .filter(|l| l.projection.is_stale(now))
            .map(|l| l.id)
            .collect())
    }

    async fn apply_bundle(&self, bundle: &BundleWrite) -> AppResult<BundleApplied> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        if !state.listings.contains_key(&bundle.listing_id) {
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                bundle.listing_id
            )));
        }

        if let Some(reference) = &bundle.payment_reference {
            if let Some(payment) = state.payments.get(reference) {
                payment.check_replay(bundle)?;
                return Ok(BundleApplied {
                    promotions: state.live_for_listing(bundle.listing_id, bundle.now),
                    extended: Vec::new(),
                    replayed: true,
                });
            }
            state.payments.insert(
                reference.clone(),
                BundlePayment {
                    payment_reference: reference.clone(),
                    listing_id: bundle.listing_id,
                    promotion_types: bundle.type_names(),
                    total_amount: bundle.total_amount,
                    processed_at: bundle.now,
                },
            );
        }

        let mut promotions = Vec::with_capacity(bundle.items.len());
        let mut extended = Vec::new();

        for item in &bundle.items {
            let same_type = |p: &Promotion| {
                p.listing_id == bundle.listing_id && p.promotion_type == item.promotion_type
            };

            for p in state.promotions.iter_mut() {
                if same_type(p) && p.is_active && p.expires_at <= bundle.now {
                    p.is_active = false;
                }
            }

            match state
                .promotions
                .iter()
                .position(|p| same_type(p) && p.is_active)
            {
                Some(index) => {
                    let existing = &mut state.promotions[index];
                    existing.amount_paid = item.amount;
                    existing.payment_reference = bundle.payment_reference.clone();
                    existing.created_at = bundle.now;
                    existing.expires_at = item.expires_at;
                    extended.push(item.promotion_type);
                    promotions.push(existing.clone());
                }
                None => {
                    let promotion = Promotion {
                        id: Uuid::new_v4(),
                        listing_id: bundle.listing_id,
                        promotion_type: item.promotion_type,
                        amount_paid: item.amount,
                        payment_reference: bundle.payment_reference.clone(),
                        created_at: bundle.now,
                        expires_at: item.expires_at,
                        is_active: true,
                        impressions: 0,
                        rotation_score: 0,
                        last_shown_at: None,
                    };
                    state.promotions.push(promotion.clone());
                    promotions.push(promotion);
                }
            }
        }

        Ok(BundleApplied {
            promotions,
            extended,
            replayed: false,
        })
    }

    async fn rotation_candidates(
        &self,
        promotion_type: PromotionType,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Candidate>> {
        let state = self.lock()?;
        let mut candidates: Vec<Candidate> = state
            .promotions
            .iter()
            .filter(|p| p.promotion_type == promotion_type && p.is_live(now))
            .filter_map(|p| {
                let listing = state.listings.get(&p.listing_id)?;
                if category.is_some_and(|c| c != listing.category) {
                    return None;
                }
                Some(Candidate {
                    promotion: p.clone(),
                    title: listing.title.clone(),
                    category: listing.category.clone(),
                })
            })
            .collect();
        candidates.sort_by_key(|c| c.promotion.id);
        Ok(candidates)
    }

    async fn increment_exposure(
        &self,
        promotion_ids: &[Uuid],
        by: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let ids: HashSet<&Uuid> = promotion_ids.iter().collect();
        let mut state = self.lock()?;
        let mut touched = 0;
        for p in state.promotions.iter_mut().filter(|p| ids.contains(&p.id)) {
            p.impressions += by;
            p.rotation_score += by;
            p.last_shown_at = Some(now);
            touched += 1;
        }
        Ok(touched)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredPromotion>> {
        let mut state = self.lock()?;
        let mut expired = Vec::new();
        for p in state
            .promotions
            .iter_mut()
            .filter(|p| p.is_active && p.expires_at <= now)
        {
            p.is_active = false;
            expired.push(ExpiredPromotion {
                id: p.id,
                listing_id: p.listing_id,
                promotion_type: p.promotion_type,
            });
        }
        Ok(expired)
    }

    async fn reset_rotation_scores(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.lock()?;
        let mut reset = 0;
        for p in state.promotions.iter_mut().filter(|p| p.is_live(now)) {
            p.rotation_score = 0;
            reset += 1;
        }
        Ok(reset)
    }

    async fn count_live(
        &self,
        promotion_type: PromotionType,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        Ok(self
            .lock()?
            .promotions
            .iter()
            .filter(|p| p.promotion_type == promotion_type && p.is_live(now))
            .count() as i64)
    }

    async fn health_check(&self) -> bool {
        self.lock().is_ok()
    }
}
