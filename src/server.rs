//! Inbound webhook adapter — the thin stand-in for the messaging-platform
//! edge (signature verification, payload encryption and format conversion
//! live upstream of this process).
//!
//! The platform delivers each inbound message synchronously and expects a
//! string acknowledgment body in the response; replies generated in the
//! background go out through the push channel instead.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppError;
use crate::router::CommandRouter;

/// Inbound text message: `{source: user key, content: text}`.
#[derive(Debug, Deserialize)]
struct InboundMessage {
    source: String,
    content: String,
}

/// Subscribe event carrying only the new subscriber's key.
#[derive(Debug, Deserialize)]
struct SubscribeEvent {
    source: String,
}

/// Build the webhook router.
pub fn app(router: Arc<CommandRouter>) -> Router {
    Router::new()
        .route("/message", post(inbound_message))
        .route("/subscribe", post(subscribe))
        .route("/healthz", get(healthz))
        .with_state(router)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(
    bind: &str,
    router: Arc<CommandRouter>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind}: {e}")))?;

    info!(%bind, "webhook listening");

    axum::serve(listener, app(router))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("serve failed: {e}")))
}

async fn inbound_message(
    State(router): State<Arc<CommandRouter>>,
    Json(msg): Json<InboundMessage>,
) -> Result<String, (StatusCode, String)> {
    router.handle(&msg.source, &msg.content).map_err(|e| {
        warn!(user = %msg.source, error = %e, "inbound message handling failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

async fn subscribe(
    State(router): State<Arc<CommandRouter>>,
    Json(event): Json<SubscribeEvent>,
) -> String {
    info!(user = %event.source, "new subscriber");
    router.greet().to_string()
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::util::ServiceExt;

    use crate::config::CommandsConfig;
    use crate::dispatch::{PipelineCtx, ReplyDispatcher};
    use crate::llm::{CompletionClient, dummy::DummyClient};
    use crate::push::{CapturePush, PushChannel};
    use crate::retry::RetryPolicy;
    use crate::router;
    use crate::session::{MemoryStore, Sessions};

    fn test_app() -> Router {
        let sessions = Sessions::new(Arc::new(MemoryStore::new()));
        let ctx = Arc::new(PipelineCtx {
            sessions: sessions.clone(),
            client: CompletionClient::Dummy(DummyClient::new()),
            push: PushChannel::Capture(CapturePush::new()),
            retry: RetryPolicy::default(),
        });
        let (dispatcher, _pool) =
            ReplyDispatcher::start(ctx, 2, 8, CancellationToken::new());
        let commands = CommandsConfig { setup: "/system".into(), reset: "/reset".into() };
        app(Arc::new(CommandRouter::new(commands, sessions, dispatcher)))
    }

    async fn post_json(app: Router, path: &str, body: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let response = test_app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn conversational_message_acks_empty() {
        let (status, body) = post_json(
            test_app(),
            "/message",
            r#"{"source": "alice", "content": "hello"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn setup_command_acks_with_prompt() {
        let (status, body) = post_json(
            test_app(),
            "/message",
            r#"{"source": "alice", "content": "/system"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, router::SETUP_PROMPT);
    }

    #[tokio::test]
    async fn subscribe_returns_greeting() {
        let (status, body) =
            post_json(test_app(), "/subscribe", r#"{"source": "alice"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, router::GREETING);
    }

    #[tokio::test]
    async fn malformed_body_is_client_error() {
        let (status, _) = post_json(test_app(), "/message", "not json").await;
        assert!(status.is_client_error());
    }
}
