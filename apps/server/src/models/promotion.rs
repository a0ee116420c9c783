//! Promotion models.
//!
//! A promotion is one advertiser's purchase of one placement type for one
//! listing. Rows are never deleted: expiry flips `is_active` and the row is
//! kept for reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

// =============================================================================
// Promotion Type Enum
// =============================================================================

/// Placement type sold on a listing
///
/// The declaration order is the canonical order used for quotes and bundle
/// writes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    Featured,
    TopSpot,
    Boost,
    Urgent,
}

impl PromotionType {
    pub const ALL: [PromotionType; 4] = [
        PromotionType::Featured,
        PromotionType::TopSpot,
        PromotionType::Boost,
        PromotionType::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::Featured => "featured",
            PromotionType::TopSpot => "top_spot",
            PromotionType::Boost => "boost",
            PromotionType::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for PromotionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "featured" => Ok(PromotionType::Featured),
            "top_spot" | "topspot" => Ok(PromotionType::TopSpot),
            "boost" | "boosted" => Ok(PromotionType::Boost),
            "urgent" => Ok(PromotionType::Urgent),
            _ => Err(AppError::Validation(format!(
                "Unknown promotion type '{}'",
                s
            ))),
        }
    }
}

// =============================================================================
// Promotion Model
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Promotion {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub promotion_type: PromotionType,
    pub amount_paid: i64,
    pub payment_reference: Option<String>,
    /// Start of the current paid term
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// Lifetime number of times this promotion was selected for display
    pub impressions: i64,
    /// Selections since the last daily reset
    pub rotation_score: i64,
    pub last_shown_at: Option<DateTime<Utc>>,
}

impl Promotion {
    /// Active and not yet past its expiry at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// A promotion competing for a slot, joined with the listing it promotes
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Candidate {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub promotion: Promotion,
    pub title: String,
    pub category: String,
}

/// Listing as returned by a rotation call
#[derive(Debug, Clone, Serialize)]
pub struct PromotedListing {
    pub listing_id: Uuid,
    pub promotion_id: Uuid,
    pub title: String,
    pub category: String,
    pub promotion_type: PromotionType,
    pub expires_at: DateTime<Utc>,
}

impl From<&Candidate> for PromotedListing {
    fn from(candidate: &Candidate) -> Self {
        Self {
            listing_id: candidate.promotion.listing_id,
            promotion_id: candidate.promotion.id,
            title: candidate.title.clone(),
            category: candidate.category.clone(),
            promotion_type: candidate.promotion.promotion_type,
            expires_at: candidate.promotion.expires_at,
        }
    }
}

/// Row retired by the expiry sweep
#[derive(Debug, Clone, FromRow)]
pub struct ExpiredPromotion {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub promotion_type: PromotionType,
}

// =============================================================================
// Bundle Writes
// =============================================================================

/// Processed payment reference (replay ledger)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BundlePayment {
    pub payment_reference: String,
    pub listing_id: Uuid,
    pub promotion_types: Vec<String>,
    pub total_amount: i64,
    pub processed_at: DateTime<Utc>,
}

impl BundlePayment {
    /// True when `bundle` re-delivers this payment: same listing, same types
    pub fn covers(&self, bundle: &BundleWrite) -> bool {
        self.listing_id == bundle.listing_id && self.promotion_types == bundle.type_names()
    }

    /// Accepts a re-delivery of this payment, rejecting a reference reused
    /// for another listing or another set of types
    pub fn check_replay(&self, bundle: &BundleWrite) -> Result<(), AppError> {
        if self.covers(bundle) {
            return Ok(());
        }
        Err(AppError::PaymentVerification(format!(
            "Payment reference {} was already used for a different bundle",
            self.payment_reference
        )))
    }
}

/// One promotion term to write as part of a bundle
#[derive(Debug, Clone)]
pub struct BundleItem {
    pub promotion_type: PromotionType,
    pub amount: i64,
    pub expires_at: DateTime<Utc>,
}

/// Everything the store needs to materialize a paid bundle atomically
#[derive(Debug, Clone)]
pub struct BundleWrite {
    pub listing_id: Uuid,
    pub payment_reference: Option<String>,
    pub total_amount: i64,
    pub now: DateTime<Utc>,
    pub items: Vec<BundleItem>,
}

impl BundleWrite {
    /// Type names in bundle order, as recorded in the payment ledger
    pub fn type_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.promotion_type.as_str().to_string())
            .collect()
    }
}

/// Outcome of a bundle write
#[derive(Debug, Clone)]
pub struct BundleApplied {
    /// Rows written by this call, or the listing's live rows on replay
    pub promotions: Vec<Promotion>,
    /// Types whose existing active row was extended instead of inserted
    pub extended: Vec<PromotionType>,
    /// The payment reference had already been processed; nothing was written
    pub replayed: bool,
}

/// Request to activate a paid bundle
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateBundle {
    pub listing_id: Uuid,
    pub types: Vec<String>,
    pub payment_reference: Option<String>,
}
