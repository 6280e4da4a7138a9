use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;

use crate::config::Config;

/// The application state.
#[derive(Clone)]
pub struct AppState {
    /// The database pool.
    pub pool: SqlitePool,
    /// The application configuration.
    pub config: Config,
}

/// How often, and under which condition, a coupon may be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UsageType {
    OneTime,
    MultiUse,
    TimeBased,
}

/// Whether the discount value is an absolute amount or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DiscountType {
    Flat,
    Percent,
}

/// The request to create a new coupon.
///
/// Medicine and category applicability travel as comma-separated strings; an
/// empty or absent list means the coupon applies to everything. Optional fields
/// accept an explicit `null` the same as a missing key.
#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    /// The unique code customers enter.
    pub coupon_code: String,
    /// When the coupon stops being valid, as an RFC3339 timestamp.
    pub expiry_date: String,
    /// How often the coupon may be redeemed.
    pub usage_type: UsageType,
    /// Comma-separated medicine IDs the coupon is limited to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub applicable_medicine_ids: String,
    /// Comma-separated category IDs the coupon is limited to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub applicable_categories: String,
    /// The smallest order total the coupon applies to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_order_value: f64,
    /// Start of the daily redemption window. Unparsable values are dropped rather than rejected.
    #[serde(default)]
    pub valid_time_window_start: Option<String>,
    /// End of the daily redemption window, with the same leniency as the start.
    #[serde(default)]
    pub valid_time_window_end: Option<String>,
    /// Free-form terms shown to the customer.
    #[serde(default, deserialize_with = "null_as_default")]
    pub terms_and_conditions: String,
    /// Whether `discount_value` is an amount or a percentage.
    pub discount_type: DiscountType,
    /// The discount granted. Zero is allowed.
    pub discount_value: f64,
    /// How many times a single user may redeem the coupon.
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_usage_per_user: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The response after creating a new coupon.
#[derive(Serialize)]
pub struct CreateCouponResponse {
    /// The stored coupon with its links.
    pub coupon: Coupon,
}

/// A medicine category.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A medicine in the catalog.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Medicine {
    /// Catalog identifier, e.g. `med_123`.
    pub id: String,
    pub name: String,
    pub batch_no: String,
    pub expiry_date: DateTime<Utc>,
    pub quantity: i64,
    pub category_id: i64,
}

/// A coupon together with the applicability links written alongside it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Coupon {
    /// The ID of the coupon.
    pub id: i64,
    /// The unique coupon code.
    pub coupon_code: String,
    /// When the coupon expires.
    pub expiry_date: DateTime<Utc>,
    /// How often the coupon may be redeemed.
    pub usage_type: UsageType,
    /// The smallest order total the coupon applies to.
    pub min_order_value: f64,
    /// Start of the daily redemption window, if any.
    pub valid_time_window_start: Option<DateTime<Utc>>,
    /// End of the daily redemption window, if any.
    pub valid_time_window_end: Option<DateTime<Utc>>,
    /// Terms shown to the customer.
    pub terms_and_conditions: String,
    /// Whether the discount is flat or a percentage.
    pub discount_type: DiscountType,
    /// The discount granted.
    pub discount_value: f64,
    /// How many times a single user may redeem the coupon.
    pub max_usage_per_user: i64,
    /// The timestamp when the coupon was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the coupon was last updated.
    pub updated_at: DateTime<Utc>,
    /// Medicines the coupon is limited to; empty means all.
    #[sqlx(skip)]
    pub coupon_medicines: Vec<CouponMedicine>,
    /// Categories the coupon is limited to; empty means all.
    #[sqlx(skip)]
    pub coupon_categories: Vec<CouponCategory>,
}

/// Links a coupon to a medicine it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CouponMedicine {
    pub id: i64,
    pub coupon_id: i64,
    pub medicine_id: String,
}

/// Links a coupon to a category it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CouponCategory {
    pub id: i64,
    pub coupon_id: i64,
    pub category_id: i64,
}
