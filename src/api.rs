use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::coupons::create_coupon;
use crate::error::{ApiError, ApiErrorWithMeta, E_INVALID_PAYLOAD};
use crate::responses::{ApiOk, RequestMeta, meta_middleware};
use crate::types::{AppState, CreateCouponRequest, CreateCouponResponse};

pub fn init_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/coupons", post(create_coupon_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(meta_middleware))
}

async fn create_coupon_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    payload: Result<Json<CreateCouponRequest>, JsonRejection>,
) -> Result<ApiOk<CreateCouponResponse>, ApiErrorWithMeta> {
    // Binding failures are client errors, whatever status axum would pick.
    let Json(req) = payload.map_err(|rejection| {
        ApiError::BadRequest(rejection.body_text())
            .with_meta(meta.clone())
            .with_code(E_INVALID_PAYLOAD)
    })?;

    let coupon = create_coupon(&st.pool, req).await.map_err(|e| {
        let (error, code) = ApiError::from_coupon(e);
        error.with_meta(meta.clone()).with_code(code)
    })?;

    Ok(ApiOk::created(
        "Coupon created successfully",
        CreateCouponResponse { coupon },
        meta,
    ))
}
