use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{convert::Infallible, sync::Arc};
use subtle::ConstantTimeEq;
use tracing::warn;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared secret Telegram echoes back on every webhook delivery. `None`
/// leaves the webhook open, which is the default.
#[derive(Clone, Default)]
pub struct WebhookGuard {
    secret: Option<Arc<str>>,
}

impl WebhookGuard {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(Into::into),
        }
    }

    fn admits(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.secret else {
            return true;
        };
        headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|presented| presented.as_bytes().ct_eq(expected.as_bytes()).into())
    }
}

pub async fn require_webhook_secret(
    State(guard): State<WebhookGuard>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    if !guard.admits(request.headers()) {
        warn!(target = "affilink.api", "webhook call with missing or wrong secret token");
        return Ok(unauthorized_response(
            "invalid_secret_token",
            "Secret token header missing or wrong",
        ));
    }
    Ok(next.run(request).await)
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware, routing::post};
    use tower::ServiceExt;

    fn app(guard: WebhookGuard) -> Router {
        Router::new()
            .route("/webhook", post(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(guard, require_webhook_secret))
    }

    fn request(secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/webhook");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn open_when_no_secret_configured() {
        let response = app(WebhookGuard::default())
            .oneshot(request(None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_secret() {
        let guard = WebhookGuard::new(Some("s3cret".into()));
        let missing = app(guard.clone()).oneshot(request(None)).await.expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let wrong = app(guard).oneshot(request(Some("s3cre7"))).await.expect("response");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admits_matching_secret() {
        let response = app(WebhookGuard::new(Some("s3cret".into())))
            .oneshot(request(Some("s3cret")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
