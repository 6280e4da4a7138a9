//! A small HTTP service that creates pharmacy coupons and their applicability links.

mod api;
mod config;
mod coupons;
mod db;
mod error;
mod responses;
mod types;

pub use api::init_router;
pub use crate::config::Config;
pub use coupons::{CouponError, create_coupon, find_coupon};
pub use db::{init_pool, migrate};
pub use types::{
    AppState, Category, Coupon, CouponCategory, CouponMedicine, CreateCouponRequest,
    DiscountType, Medicine, UsageType,
};
