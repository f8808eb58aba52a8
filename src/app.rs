use crate::ports::PushSender;
use crate::state;

use axum::Json;
use axum::Router;
use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

mod admin;
mod push;
mod reminders;
mod subscriptions;

pub(crate) const SERVICE_NAME: &str = "push-reminders";

pub fn app<S: PushSender>(state: state::AppState<S>) -> Router {
    let admin_routes = Router::new()
        .route("/api/vapid/check", get(admin::vapid_check::<S>))
        .route("/api/push/test", post(push::push_test::<S>))
        .route("/api/push/broadcast", post(push::push_broadcast::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin::<S>,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/vapid/public-key", get(push::public_key::<S>))
        .route(
            "/api/subscriptions",
            post(subscriptions::subscribe::<S>).delete(subscriptions::unsubscribe::<S>),
        )
        .route("/api/reminders/sync", post(reminders::sync::<S>))
        .merge(admin_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(middleware::from_fn(preflight))
}

#[derive(Serialize)]
pub(crate) struct OkResponse {
    pub(crate) ok: bool,
}

impl OkResponse {
    pub(crate) fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) ok: bool,
    pub(crate) error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            ok: false,
            error: error.into(),
        }),
    )
}

/// Last-resort mapping for failures the caller cannot act on.
pub(crate) fn internal_error(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME,
    })
}

async fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found")
}

async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,DELETE,OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "content-type,x-admin-token"),
        ],
    )
        .into_response()
}
