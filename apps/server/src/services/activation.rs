use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    ActivateBundle, BundleItem, BundleWrite, ListingProjection, Promotion, PromotionType,
};
use crate::services::pricing::{self, BundleQuote};
use crate::services::projection::ProjectionService;
use crate::store::Storage;

/// Longest accepted payment reference
const MAX_PAYMENT_REFERENCE_LEN: usize = 255;

/// Result of activating a paid bundle
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub listing_id: Uuid,
    pub quote: BundleQuote,
    pub promotions: Vec<Promotion>,
    /// Types whose live promotion was extended rather than created
    pub extended: Vec<PromotionType>,
    /// The payment reference was already processed; nothing new was written
    pub replayed: bool,
    pub projection: ListingProjection,
}

pub struct ActivationService;

impl ActivationService {
    /// Materializes the promotions of a confirmed bundle
    ///
    /// Every row of the bundle is written atomically: a live promotion of
    /// the same type is extended in place, anything else is inserted. The
    /// listing projection is refreshed before returning. Re-delivery of a
    /// processed payment reference is a no-op replay.
    pub async fn activate(
        storage: &Storage,
        pricing_config: &PricingConfig,
        input: &ActivateBundle,
        now: DateTime<Utc>,
    ) -> AppResult<Activation> {
        let types = pricing::parse_types(&input.types)?;
        let quote = pricing::quote(pricing_config, &types)?;
        let payment_reference = Self::normalize_reference(input.payment_reference.as_deref())?;

        if storage.get_listing(input.listing_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                input.listing_id
            )));
        }

        let bundle = BundleWrite {
            listing_id: input.listing_id,
            payment_reference: payment_reference.clone(),
            total_amount: quote.total,
            now,
            items: quote
                .items
                .iter()
                .map(|item| {
                    Ok(BundleItem {
                        promotion_type: item.promotion_type,
                        amount: item.amount,
                        expires_at: item.expires_at(now)?,
                    })
                })
                .collect::<AppResult<Vec<_>>>()?,
        };

        let applied = storage.apply_bundle(&bundle).await?;

        if applied.replayed {
            log::warn!(
                "Payment reference {} already processed for listing {}, skipping activation",
                payment_reference.as_deref().unwrap_or("-"),
                input.listing_id
            );
        } else {
            log::info!(
                "Activated bundle [{}] for listing {} (total {}, extended {})",
                types
                    .iter()
                    .map(PromotionType::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                input.listing_id,
                quote.total,
                applied.extended.len()
            );
        }

        let projection = ProjectionService::refresh(storage, input.listing_id, now).await?;

        Ok(Activation {
            listing_id: input.listing_id,
            quote,
            promotions: applied.promotions,
            extended: applied.extended,
            replayed: applied.replayed,
            projection,
        })
    }

    fn normalize_reference(reference: Option<&str>) -> AppResult<Option<String>> {
        match reference.map(str::trim) {
            None => Ok(None),
            Some("") => Err(AppError::Validation(
                "payment_reference must not be blank".to_string(),
            )),
            Some(r) if r.len() > MAX_PAYMENT_REFERENCE_LEN => Err(AppError::Validation(format!(
                "payment_reference must be at most {} characters",
                MAX_PAYMENT_REFERENCE_LEN
            ))),
            Some(r) => Ok(Some(r.to_string())),
        }
    }
}
