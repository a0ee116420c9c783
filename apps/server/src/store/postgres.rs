//! PostgreSQL promotion store.
//!
//! Counter updates are relative SQL expressions (`impressions = impressions
//! + $2`), so concurrent rotation calls never lose increments. Bundle writes
//! run in one transaction and upsert against the
//! `promotions_one_active_per_type` partial unique index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::PromotionStore;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{
    BundleApplied, BundlePayment, BundleWrite, Candidate, CreateListing, ExpiredPromotion,
    Listing, ListingProjection, Promotion, PromotionType,
};

/// Upsert result: the row plus whether it was freshly inserted
#[derive(sqlx::FromRow)]
struct UpsertedPromotion {
    #[sqlx(flatten)]
    promotion: Promotion,
    inserted: bool,
}

/// Maps a foreign key violation on `listing_id` to [`AppError::NotFound`]
fn missing_listing(e: sqlx::Error, listing_id: Uuid) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound(format!("Listing {} not found", listing_id));
        }
    }
    AppError::Storage(e)
}

pub struct PgPromotionStore {
    pool: PgPool,
}

impl PgPromotionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionStore for PgPromotionStore {
    async fn create_listing(&self, input: &CreateListing) -> AppResult<Listing> {
        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (title, category)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn get_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(listing)
    }

    async fn live_promotions_for_listing(
        &self,
        listing_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Promotion>> {
        let promotions = sqlx::query_as::<_, Promotion>(
            r#"
            SELECT * FROM promotions
            WHERE listing_id = $1 AND is_active AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(listing_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(promotions)
    }

    async fn write_projection(
        &self,
        listing_id: Uuid,
        projection: &ListingProjection,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET is_featured = $2,
                featured_until = $3,
                is_top_spot = $4,
                top_spot_until = $5,
                is_boosted = $6,
                boosted_until = $7,
                is_urgent = $8,
                urgent_until = $9,
                boost_score = $10
            WHERE id = $1
            "#,
        )
        .bind(listing_id)
        .bind(projection.is_featured)
        .bind(projection.featured_until)
        .bind(projection.is_top_spot)
        .bind(projection.top_spot_until)
        .bind(projection.is_boosted)
        .bind(projection.boosted_until)
        .bind(projection.is_urgent)
        .bind(projection.urgent_until)
        .bind(projection.boost_score)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Listing {} not found",
                listing_id
            )));
        }

        Ok(())
    }

    async fn listings_with_stale_projection(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM listings
            WHERE (is_featured AND (featured_until IS NULL OR featured_until <= $1))
               OR (is_top_spot AND (top_spot_until IS NULL OR top_spot_until <= $1))
               OR (is_boosted AND (boosted_until IS NULL OR boosted_until <= $1))
               OR (is_urgent AND (urgent_until IS NULL OR urgent_until <= $1))
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn apply_bundle(&self, bundle: &BundleWrite) -> AppResult<BundleApplied> {
        let mut tx = self.pool.begin().await?;

        if let Some(reference) = &bundle.payment_reference {
            let types = bundle.type_names();

            let recorded = sqlx::query(
                r#"
                INSERT INTO bundle_payments
                    (payment_reference, listing_id, promotion_types, total_amount, processed_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (payment_reference) DO NOTHING
                "#,
            )
            .bind(reference)
            .bind(bundle.listing_id)
            .bind(&types)
            .bind(bundle.total_amount)
            .bind(bundle.now)
            .execute(&mut *tx)
            .await
            .map_err(|e| missing_listing(e, bundle.listing_id))?;

            if recorded.rows_affected() == 0 {
                let payment = sqlx::query_as::<_, BundlePayment>(
                    "SELECT * FROM bundle_payments WHERE payment_reference = $1",
                )
                .bind(reference)
                .fetch_one(&mut *tx)
                .await?;
                tx.rollback().await?;
                payment.check_replay(bundle)?;

                let promotions = self
                    .live_promotions_for_listing(bundle.listing_id, bundle.now)
                    .await?;
                return Ok(BundleApplied {
                    promotions,
                    extended: Vec::new(),
                    replayed: true,
                });
            }
        }

        let mut promotions = Vec::with_capacity(bundle.items.len());
        let mut extended = Vec::new();

        for item in &bundle.items {
            // An expired row still flagged active would otherwise absorb the
            // new term through the upsert below
            sqlx::query(
                r#"
                UPDATE promotions
                SET is_active = FALSE
                WHERE listing_id = $1 AND promotion_type = $2
                  AND is_active AND expires_at <= $3
                "#,
            )
            .bind(bundle.listing_id)
            .bind(item.promotion_type.as_str())
            .bind(bundle.now)
            .execute(&mut *tx)
            .await?;

            let upserted = sqlx::query_as::<_, UpsertedPromotion>(
                r#"
                INSERT INTO promotions
                    (listing_id, promotion_type, amount_paid, payment_reference,
                     created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (listing_id, promotion_type) WHERE is_active
                DO UPDATE SET amount_paid = EXCLUDED.amount_paid,
                              payment_reference = EXCLUDED.payment_reference,
                              created_at = EXCLUDED.created_at,
                              expires_at = EXCLUDED.expires_at
                RETURNING *, (xmax = 0) AS inserted
                "#,
            )
            .bind(bundle.listing_id)
            .bind(item.promotion_type.as_str())
            .bind(item.amount)
            .bind(&bundle.payment_reference)
            .bind(bundle.now)
            .bind(item.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| missing_listing(e, bundle.listing_id))?;

            if !upserted.inserted {
                extended.push(item.promotion_type);
            }
            promotions.push(upserted.promotion);
        }

        tx.commit().await?;

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
        let candidates = sqlx::query_as::<_, Candidate>(
            r#"
            SELECT p.*, l.title, l.category
            FROM promotions p
            JOIN listings l ON l.id = p.listing_id
            WHERE p.promotion_type = $1
              AND p.is_active
              AND p.expires_at > $2
              AND ($3::varchar IS NULL OR l.category = $3)
            ORDER BY p.id
            "#,
        )
        .bind(promotion_type.as_str())
        .bind(now)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    async fn increment_exposure(
        &self,
        promotion_ids: &[Uuid],
        by: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET impressions = impressions + $2,
                rotation_score = rotation_score + $2,
                last_shown_at = $3
            WHERE id = ANY($1)
            "#,
        )
        .bind(promotion_ids)
        .bind(by)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredPromotion>> {
        let expired = sqlx::query_as::<_, ExpiredPromotion>(
            r#"
            UPDATE promotions
            SET is_active = FALSE
            WHERE is_active AND expires_at <= $1
            RETURNING id, listing_id, promotion_type
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(expired)
    }

    async fn reset_rotation_scores(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET rotation_score = 0
            WHERE is_active AND expires_at > $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_live(
        &self,
        promotion_type: PromotionType,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM promotions
            WHERE promotion_type = $1 AND is_active AND expires_at > $2
            "#,
        )
        .bind(promotion_type.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        db::health_check(&self.pool).await
    }
}
