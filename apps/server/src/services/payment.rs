//! Payment confirmation from external gateways.
//!
//! Gateways call back with a body signed by HMAC-SHA256 over
//! `"{timestamp}.{raw body}"`. A confirmation is only trusted when the
//! signature matches, the timestamp is fresh, and the paid amount equals
//! the current quote for the requested bundle. Anything else fails with
//! [`AppError::PaymentVerification`] before a single row is written.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{PricingConfig, SecurityConfig};
use crate::error::{AppError, AppResult};
use crate::models::ActivateBundle;
use crate::services::activation::{Activation, ActivationService};
use crate::services::pricing::{self, BundleQuote};
use crate::store::Storage;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Payment-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Payment-Timestamp";

/// Body of a payment confirmation webhook
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub listing_id: Uuid,
    pub types: Vec<String>,
    pub payment_reference: String,
    /// Amount collected by the gateway, whole currency units
    pub amount: i64,
}

fn mac(secret: &str) -> AppResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))
}

/// Hex HMAC-SHA256 signature of a webhook payload
pub fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> AppResult<String> {
    let mut mac = mac(secret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the timestamp window and the `sha256=<hex>` signature
pub fn verify_signature(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    payload: &[u8],
    tolerance: Duration,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let timestamp = timestamp
        .ok_or_else(|| AppError::PaymentVerification(format!("Missing {}", TIMESTAMP_HEADER)))?;
    let signature = signature
        .ok_or_else(|| AppError::PaymentVerification(format!("Missing {}", SIGNATURE_HEADER)))?;

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| AppError::PaymentVerification("Malformed timestamp".to_string()))?;
    let age = now.timestamp().abs_diff(sent_at);
    if age > tolerance.as_secs() {
        return Err(AppError::PaymentVerification(
            "Timestamp outside the accepted window".to_string(),
        ));
    }

    let hex_signature = signature.trim().strip_prefix("sha256=").unwrap_or(signature.trim());
    let expected = hex::decode(hex_signature)
        .map_err(|_| AppError::PaymentVerification("Malformed signature".to_string()))?;

    let mut mac = mac(secret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::PaymentVerification("Signature mismatch".to_string()))
}

/// The gateway must have collected exactly the quoted total
pub fn verify_amount(quote: &BundleQuote, amount: i64) -> AppResult<()> {
    if quote.total != amount {
        return Err(AppError::PaymentVerification(format!(
            "Paid amount {} does not match bundle total {}",
            amount, quote.total
        )));
    }
    Ok(())
}

pub struct PaymentService;

impl PaymentService {
    /// Verifies a signed gateway confirmation and activates the bundle
    pub async fn confirm(
        storage: &Storage,
        pricing_config: &PricingConfig,
        security: &SecurityConfig,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> AppResult<Activation> {
        if let Err(e) = verify_signature(
            &security.payment_webhook_secret,
            timestamp,
            signature,
            body,
            security.webhook_tolerance,
            now,
        ) {
            log::warn!("Rejected payment webhook: {}", e);
            return Err(e);
        }

        let confirmation: PaymentConfirmation = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid confirmation body: {}", e)))?;

        let types = pricing::parse_types(&confirmation.types)?;
        let quote = pricing::quote(pricing_config, &types)?;
        if let Err(e) = verify_amount(&quote, confirmation.amount) {
            log::warn!(
                "Rejected payment {} for listing {}: {}",
                confirmation.payment_reference,
                confirmation.listing_id,
                e
            );
            return Err(e);
        }

        let input = ActivateBundle {
            listing_id: confirmation.listing_id,
            types: confirmation.types,
            payment_reference: Some(confirmation.payment_reference),
        };

        ActivationService::activate(storage, pricing_config, &input, now).await
    }
}
