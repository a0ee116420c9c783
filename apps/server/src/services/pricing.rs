//! Bundle pricing.
//!
//! Pure functions: a set of promotion types maps to a discounted total and a
//! validity window per type. No storage access.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::PricingConfig;
use crate::error::{AppError, AppResult};
use crate::models::PromotionType;

/// Priced line of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteItem {
    pub promotion_type: PromotionType,
    pub list_price: i64,
    /// Share of the bundle total charged to this type
    pub amount: i64,
    pub duration_days: i64,
}

impl QuoteItem {
    /// End of a term starting at `now`; fails instead of overflowing
    pub fn expires_at(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        Duration::try_days(self.duration_days)
            .and_then(|term| now.checked_add_signed(term))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "A {} day {} term is out of range",
                    self.duration_days, self.promotion_type
                ))
            })
    }
}

/// Price quote for a bundle of promotion types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleQuote {
    /// In canonical type order
    pub items: Vec<QuoteItem>,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

impl BundleQuote {
    pub fn types(&self) -> Vec<PromotionType> {
        self.items.iter().map(|i| i.promotion_type).collect()
    }
}

/// Parses requested type names, rejecting empty sets, unknown names and
/// duplicates. Returns the types in canonical order.
pub fn parse_types<S: AsRef<str>>(names: &[S]) -> AppResult<Vec<PromotionType>> {
    if names.is_empty() {
        return Err(AppError::Validation(
            "At least one promotion type is required".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for name in names {
        let promotion_type: PromotionType = name.as_ref().parse()?;
        if !seen.insert(promotion_type) {
            return Err(AppError::Validation(format!(
                "Promotion type '{}' requested more than once",
                promotion_type
            )));
        }
    }

    Ok(seen.into_iter().collect())
}

/// Quotes a bundle of distinct promotion types
///
/// The discount is spread evenly over the items; any remainder is charged
/// against the first item. Amounts never go below zero.
pub fn quote(config: &PricingConfig, types: &[PromotionType]) -> AppResult<BundleQuote> {
    let unique: BTreeSet<PromotionType> = types.iter().copied().collect();
    if unique.is_empty() {
        return Err(AppError::Validation(
            "At least one promotion type is required".to_string(),
        ));
    }
    if unique.len() != types.len() {
        return Err(AppError::Validation(
            "Promotion types in a bundle must be distinct".to_string(),
        ));
    }

    let count = unique.len() as i64;
    let subtotal: i64 = unique.iter().map(|t| config.for_type(*t).price).sum();
    let discount = config.discount_for(unique.len()).min(subtotal);
    let share = discount / count;
    let remainder = discount % count;

    let items = unique
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let pricing = config.for_type(*t);
            let reduction = if i == 0 { share + remainder } else { share };
            QuoteItem {
                promotion_type: *t,
                list_price: pricing.price,
                amount: (pricing.price - reduction).max(0),
                duration_days: pricing.duration_days,
            }
        })
        .collect();

    Ok(BundleQuote {
        items,
        subtotal,
        discount,
        total: subtotal - discount,
    })
}
