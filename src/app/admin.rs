use super::api_error;
use crate::ports::PushSender;
use crate::state;
use crate::types::push::KeyPairCheck;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub(crate) const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Gate for admin routes. Open when no token is configured.
pub(crate) async fn require_admin<S: PushSender>(
    State(state): State<state::AppState<S>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return next.run(req).await;
    };

    if admin_token(req.headers()) == Some(expected) {
        return next.run(req).await;
    }

    api_error(StatusCode::UNAUTHORIZED, "admin_token_invalid").into_response()
}

fn admin_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(ADMIN_TOKEN_HEADER)?.to_str().ok()
}

#[derive(Serialize)]
pub(crate) struct VapidCheckResponse {
    ok: bool,
    #[serde(flatten)]
    check: KeyPairCheck,
}

pub(crate) async fn vapid_check<S: PushSender>(
    State(state): State<state::AppState<S>>,
) -> Json<VapidCheckResponse> {
    Json(VapidCheckResponse {
        ok: true,
        check: state.signer.check_key_pair(),
    })
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admin_token__should_read_header_verbatim() {
        // Given
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("s3cret"));

        // Then
        assert_eq!(admin_token(&headers), Some("s3cret"));
        assert_eq!(admin_token(&HeaderMap::new()), None);
    }
}
