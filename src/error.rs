use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::coupons::{CTX_LINK_CATEGORIES, CTX_LINK_MEDICINES, CouponError};
use crate::responses::RequestMeta;

pub const E_INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
pub const E_INVALID_COUPON: &str = "INVALID_COUPON";
pub const E_COUPON_CREATE_FAILURE: &str = "COUPON_CREATE_FAILURE";
pub const E_MEDICINE_LINK_FAILURE: &str = "MEDICINE_LINK_FAILURE";
pub const E_CATEGORY_LINK_FAILURE: &str = "CATEGORY_LINK_FAILURE";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// `message` is what the caller sees; `source` is only logged.
    Internal {
        message: String,
        source: anyhow::Error,
    },
}

#[derive(Debug)]
pub struct ApiErrorWithMeta {
    error: ApiError,
    meta: RequestMeta,
    code: Option<String>,
}

impl ApiError {
    pub fn with_meta(self, meta: RequestMeta) -> ApiErrorWithMeta {
        ApiErrorWithMeta {
            error: self,
            meta,
            code: None,
        }
    }

    /// Maps a service failure to its API error and machine-readable code.
    pub fn from_coupon(err: CouponError) -> (Self, &'static str) {
        match err {
            CouponError::Validation(msg) => (ApiError::BadRequest(msg), E_INVALID_COUPON),
            CouponError::Persistence { context, source } => {
                let code = match context {
                    CTX_LINK_MEDICINES => E_MEDICINE_LINK_FAILURE,
                    CTX_LINK_CATEGORIES => E_CATEGORY_LINK_FAILURE,
                    _ => E_COUPON_CREATE_FAILURE,
                };
                (
                    ApiError::Internal {
                        message: context.to_string(),
                        source: source.into(),
                    },
                    code,
                )
            }
        }
    }
}

impl ApiErrorWithMeta {
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

impl IntoResponse for ApiErrorWithMeta {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.error {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal { message, source } => {
                error!(request_id = %self.meta.request_id, "internal error: {:?}", source);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let mut body = json!({
            "request_id": self.meta.request_id,
            "error": error_message,
        });
        if let Some(code) = self.code {
            body["code"] = json!(code);
        }

        (status, Json(body)).into_response()
    }
}
