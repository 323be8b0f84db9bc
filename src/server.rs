//! HTTP surface: the Telegram webhook receiver and a health probe.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::bot::{self, AppState, LOG_PREVIEW_CHARS};
use crate::platform::telegram::{self, SECRET_HEADER};

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
enum HealthResponse {
    Ok { bot_username: String },
    Error { message: String },
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/", post(webhook))
        .route("/health/", get(health))
        .with_state(state)
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let secret = headers.get(SECRET_HEADER).map(|v| v.as_bytes());
    if secret != Some(state.config.telegram.secret_token.as_bytes()) {
        warn!("Rejected webhook call with missing or wrong secret token");
        return StatusCode::FORBIDDEN;
    }

    let update = match telegram::parse_update(&body) {
        Ok(update) => update,
        Err(e) => {
            error!(
                "Failed to parse update: {} (payload: {})",
                e,
                bot::truncate(&String::from_utf8_lossy(&body), LOG_PREVIEW_CHARS)
            );
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    info!(
        "Update {} from {} ({})",
        update.update_id,
        update.sender_name.as_deref().unwrap_or("unknown"),
        update
            .sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    bot::dispatch(&state, &update).await;
    StatusCode::OK
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.messenger.bot_username().await {
        Ok(bot_username) => (StatusCode::OK, Json(HealthResponse::Ok { bot_username })),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse::Error {
                    message: e.to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::tests::{state_with, RecordingMessenger};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn text_update(text: &str) -> String {
        serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": { "id": 99, "type": "private" },
                "from": { "id": 5, "is_bot": false, "first_name": "Ada" },
                "text": text,
            }
        })
        .to_string()
    }

    fn webhook_request(secret: Option<&str>, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook/")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(body.into()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_wrong_secret_is_forbidden() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger.clone())));

        for secret in [Some("wrong"), Some("S3CRET"), Some(""), None] {
            let response = app
                .clone()
                .oneshot(webhook_request(secret, text_update("hi")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_text_update_is_echoed() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger.clone())));

        let response = app
            .oneshot(webhook_request(Some("s3cret"), text_update("ping")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.chat_id, 99);
        assert_eq!(sent[0].0.message_id, 3);
        assert_eq!(sent[0].1, "You said: ping");
    }

    #[tokio::test]
    async fn test_malformed_body_is_server_error() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger.clone())));

        for body in ["{not json", "{}", "[]"] {
            let response = app
                .clone()
                .oneshot(webhook_request(Some("s3cret"), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_photo_update_is_acknowledged() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger.clone())));

        let body = serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 4,
                "date": 1700000000,
                "chat": { "id": 99, "type": "private" },
                "photo": [{ "file_id": "x", "file_unique_id": "y", "width": 90, "height": 90 }],
            }
        })
        .to_string();

        let response = app
            .oneshot(webhook_request(Some("s3cret"), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            messenger.sent_texts(),
            vec!["I received your photo! But I only echo text messages.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_failure_still_returns_ok() {
        let messenger = Arc::new(RecordingMessenger::default());
        *messenger.failing_sends.lock().unwrap() = 2;
        let app = router(Arc::new(state_with(messenger.clone())));

        let response = app
            .oneshot(webhook_request(Some("s3cret"), text_update("ping")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_non_message_update_returns_ok_without_reply() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger.clone())));

        let response = app
            .oneshot(webhook_request(
                Some("s3cret"),
                r#"{"update_id": 12, "poll": {"id": "p"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_username() {
        let messenger = Arc::new(RecordingMessenger::with_username("echo_test_bot"));
        let app = router(Arc::new(state_with(messenger)));

        let response = app
            .oneshot(Request::get("/health/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "ok", "bot_username": "echo_test_bot" })
        );
    }

    #[tokio::test]
    async fn test_health_reports_api_failure() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger)));

        let response = app
            .oneshot(Request::get("/health/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn test_webhook_rejects_get() {
        let messenger = Arc::new(RecordingMessenger::default());
        let app = router(Arc::new(state_with(messenger)));

        let response = app
            .oneshot(Request::get("/webhook/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
