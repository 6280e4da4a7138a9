use axum::{
    Json,
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request metadata echoed in every response body.
#[derive(Clone, Debug, Serialize)]
pub struct RequestMeta {
    pub request_id: String,
    /// RFC3339 receive time.
    pub received_at: String,
}

impl RequestMeta {
    /// Reuses a caller-supplied request id when it is printable, otherwise mints one.
    fn for_request(req: &Request<Body>) -> Self {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        RequestMeta {
            request_id,
            received_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Stores `RequestMeta` for handlers and mirrors its id in the `x-request-id` response header.
pub async fn meta_middleware(mut req: Request<Body>, next: Next) -> Response {
    let meta = RequestMeta::for_request(&req);
    let header = HeaderValue::from_str(&meta.request_id).ok();
    req.extensions_mut().insert(meta);

    let mut response = next.run(req).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Success body: the payload's fields sit next to `message` and `meta`.
#[derive(Serialize)]
pub struct SuccessEnvelope<T> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
    pub meta: RequestMeta,
}

pub struct ApiOk<T> {
    status: StatusCode,
    body: SuccessEnvelope<T>,
}

impl<T> ApiOk<T> {
    pub fn created(message: impl Into<String>, data: T, meta: RequestMeta) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: SuccessEnvelope {
                message: message.into(),
                data,
                meta,
            },
        }
    }
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
