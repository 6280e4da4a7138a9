//! Validated, transactional coupon creation.
//!
//! A coupon row and all of its applicability links are written inside one
//! transaction. Every early return drops the transaction, which rolls it back,
//! so a failed request never leaves a partial coupon behind.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{
    Coupon, CouponCategory, CouponMedicine, CreateCouponRequest, DiscountType, UsageType,
};

pub const CTX_CREATE_COUPON: &str = "failed to create coupon";
pub const CTX_LINK_MEDICINES: &str = "failed to link medicines";
pub const CTX_LINK_CATEGORIES: &str = "failed to link categories";
pub const CTX_COMMIT: &str = "failed to commit coupon";

#[derive(Debug, Error)]
pub enum CouponError {
    /// The request is malformed; nothing was written.
    #[error("{0}")]
    Validation(String),
    /// A storage operation failed and the transaction was rolled back.
    #[error("{context}")]
    Persistence {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

fn persistence(context: &'static str) -> impl FnOnce(sqlx::Error) -> CouponError {
    move |source| CouponError::Persistence { context, source }
}

/// A creation request whose fields have all been checked and parsed.
#[derive(Debug)]
pub struct NewCoupon {
    pub coupon_code: String,
    pub expiry_date: DateTime<Utc>,
    pub usage_type: UsageType,
    pub min_order_value: f64,
    pub valid_time_window_start: Option<DateTime<Utc>>,
    pub valid_time_window_end: Option<DateTime<Utc>>,
    pub terms_and_conditions: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub max_usage_per_user: i64,
    pub medicine_ids: Vec<String>,
    pub category_ids: Vec<i64>,
}

/// Checks and parses a request without touching storage.
pub fn validate(req: CreateCouponRequest) -> Result<NewCoupon, CouponError> {
    if req.coupon_code.trim().is_empty() {
        return Err(CouponError::Validation("coupon_code is required".into()));
    }

    let expiry_date = parse_rfc3339(&req.expiry_date).ok_or_else(|| {
        CouponError::Validation("invalid expiry_date format, use RFC3339".into())
    })?;

    Ok(NewCoupon {
        coupon_code: req.coupon_code,
        expiry_date,
        usage_type: req.usage_type,
        min_order_value: req.min_order_value,
        valid_time_window_start: parse_window_bound(req.valid_time_window_start.as_deref()),
        valid_time_window_end: parse_window_bound(req.valid_time_window_end.as_deref()),
        terms_and_conditions: req.terms_and_conditions,
        discount_type: req.discount_type,
        discount_value: req.discount_value,
        max_usage_per_user: req.max_usage_per_user,
        medicine_ids: parse_medicine_ids(&req.applicable_medicine_ids),
        category_ids: parse_category_ids(&req.applicable_categories)?,
    })
}

/// Strict RFC3339: chrono also takes a space between date and time, which is refused here.
fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    if raw.as_bytes().get(10) != Some(&b'T') {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Unparsable window bounds mean "no restriction" rather than an error.
fn parse_window_bound(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let parsed = parse_rfc3339(raw);
    if parsed.is_none() {
        debug!(value = raw, "ignoring unparsable time window bound");
    }
    parsed
}

pub fn parse_medicine_ids(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|id| id.trim().to_string()).collect()
}

pub fn parse_category_ids(raw: &str) -> Result<Vec<i64>, CouponError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .map(|id| {
            // u64::from_str alone would accept a leading '+'.
            Some(id)
                .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|id| id.parse::<u64>().ok())
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| CouponError::Validation(format!("invalid category ID: {id}")))
        })
        .collect()
}

/// Validates the request and persists the coupon with its links as one unit.
pub async fn create_coupon(
    pool: &SqlitePool,
    req: CreateCouponRequest,
) -> Result<Coupon, CouponError> {
    let new = validate(req)?;
    insert_coupon(pool, new).await
}

pub async fn insert_coupon(pool: &SqlitePool, new: NewCoupon) -> Result<Coupon, CouponError> {
    let mut tx = pool.begin().await.map_err(persistence(CTX_CREATE_COUPON))?;

    let now = Utc::now();
    let id = sqlx::query(
        r#"INSERT INTO coupons (coupon_code, expiry_date, usage_type, min_order_value,
             valid_time_window_start, valid_time_window_end, terms_and_conditions,
             discount_type, discount_value, max_usage_per_user, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&new.coupon_code)
    .bind(new.expiry_date)
    .bind(new.usage_type)
    .bind(new.min_order_value)
    .bind(new.valid_time_window_start)
    .bind(new.valid_time_window_end)
    .bind(&new.terms_and_conditions)
    .bind(new.discount_type)
    .bind(new.discount_value)
    .bind(new.max_usage_per_user)
    .bind(now)
    .bind(now)
    .execute(tx.as_mut())
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                warn!(coupon_code = %new.coupon_code, "coupon code already exists");
            }
        }
        persistence(CTX_CREATE_COUPON)(e)
    })?
    .last_insert_rowid();

    let coupon_medicines = link_medicines(&mut tx, id, &new.medicine_ids)
        .await
        .map_err(persistence(CTX_LINK_MEDICINES))?;
    let coupon_categories = link_categories(&mut tx, id, &new.category_ids)
        .await
        .map_err(persistence(CTX_LINK_CATEGORIES))?;

    tx.commit().await.map_err(persistence(CTX_COMMIT))?;

    info!(
        coupon_id = id,
        coupon_code = %new.coupon_code,
        medicines = coupon_medicines.len(),
        categories = coupon_categories.len(),
        "coupon created"
    );

    Ok(Coupon {
        id,
        coupon_code: new.coupon_code,
        expiry_date: new.expiry_date,
        usage_type: new.usage_type,
        min_order_value: new.min_order_value,
        valid_time_window_start: new.valid_time_window_start,
        valid_time_window_end: new.valid_time_window_end,
        terms_and_conditions: new.terms_and_conditions,
        discount_type: new.discount_type,
        discount_value: new.discount_value,
        max_usage_per_user: new.max_usage_per_user,
        created_at: now,
        updated_at: now,
        coupon_medicines,
        coupon_categories,
    })
}

async fn link_medicines(
    tx: &mut Transaction<'_, Sqlite>,
    coupon_id: i64,
    medicine_ids: &[String],
) -> Result<Vec<CouponMedicine>, sqlx::Error> {
    let mut links = Vec::with_capacity(medicine_ids.len());
    for medicine_id in medicine_ids {
        let id = sqlx::query("INSERT INTO coupon_medicines (coupon_id, medicine_id) VALUES (?, ?)")
            .bind(coupon_id)
            .bind(medicine_id)
            .execute(tx.as_mut())
            .await?
            .last_insert_rowid();
        links.push(CouponMedicine {
            id,
            coupon_id,
            medicine_id: medicine_id.clone(),
        });
    }
    Ok(links)
}

async fn link_categories(
    tx: &mut Transaction<'_, Sqlite>,
    coupon_id: i64,
    category_ids: &[i64],
) -> Result<Vec<CouponCategory>, sqlx::Error> {
    let mut links = Vec::with_capacity(category_ids.len());
    for &category_id in category_ids {
        let id = sqlx::query("INSERT INTO coupon_categories (coupon_id, category_id) VALUES (?, ?)")
            .bind(coupon_id)
            .bind(category_id)
            .execute(tx.as_mut())
            .await?
            .last_insert_rowid();
        links.push(CouponCategory {
            id,
            coupon_id,
            category_id,
        });
    }
    Ok(links)
}

/// Reads a coupon back together with its link rows.
pub async fn find_coupon(pool: &SqlitePool, id: i64) -> Result<Option<Coupon>, sqlx::Error> {
    let Some(mut coupon) = sqlx::query_as::<_, Coupon>(
        r#"SELECT id, coupon_code, expiry_date, usage_type, min_order_value,
             valid_time_window_start, valid_time_window_end, terms_and_conditions,
             discount_type, discount_value, max_usage_per_user, created_at, updated_at
           FROM coupons WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    coupon.coupon_medicines = sqlx::query_as(
        "SELECT id, coupon_id, medicine_id FROM coupon_medicines WHERE coupon_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    coupon.coupon_categories = sqlx::query_as(
        "SELECT id, coupon_id, category_id FROM coupon_categories WHERE coupon_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(coupon))
}
