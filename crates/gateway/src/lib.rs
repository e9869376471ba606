//! HTTP gateway for streamgate.
//!
//! Exposes an OpenAI-style streaming chat-completion endpoint backed by the
//! agent loop, plus a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod completions;
pub mod error;

use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use streamgate_agent::AgentOrchestrator;
use streamgate_config::AppConfig;
use streamgate_core::NoExternalTools;
use streamgate_providers::UpstreamDispatcher;

pub use error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: AgentOrchestrator,
    /// Wall-clock budget for one request, streaming included
    pub request_timeout: Duration,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/v1/chat/completions",
            post(completions::chat_completions_handler),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the gateway state from configuration.
///
/// External tools come from a tool host that is not bundled, so the agent
/// starts with an empty catalogue.
pub fn state_from_config(config: &AppConfig) -> Result<SharedState, streamgate_core::UpstreamError> {
    let upstream = Arc::new(UpstreamDispatcher::from_config(config)?);
    let tools = Arc::new(NoExternalTools);
    let agent = AgentOrchestrator::from_config(config, upstream, tools.clone(), tools);
    Ok(Arc::new(GatewayState {
        agent,
        request_timeout: Duration::from_secs(config.agent.request_timeout_secs),
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = state_from_config(&config)?;
    let app = build_router(state);

    info!(addr = %addr, upstream = %config.upstream.base_url, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use streamgate_core::{
        ChatRequest, ChunkBuilder, FramedEvent, FramedEventStream, UpstreamClient,
        UpstreamCredentials, UpstreamError,
    };
    use streamgate_providers::{ConfiguredEndpointSelector, StaticCredentials};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    enum Behavior {
        Answer(&'static str),
        Fail(UpstreamError),
        Hang,
    }

    struct MockUpstream {
        behavior: Behavior,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl UpstreamClient for MockUpstream {
        async fn stream_primary(
            &self,
            request: &ChatRequest,
            _credentials: &UpstreamCredentials,
        ) -> Result<FramedEventStream, UpstreamError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.behavior {
                Behavior::Answer(text) => {
                    let b = ChunkBuilder::new(request.model.clone());
                    let (tx, rx) = mpsc::channel(8);
                    for event in [
                        b.role().to_event(),
                        b.content(*text).to_event(),
                        b.finish("stop").to_event(),
                        FramedEvent::done(),
                    ] {
                        tx.try_send(Ok(event)).unwrap();
                    }
                    Ok(rx)
                }
                Behavior::Fail(err) => Err(err.clone()),
                Behavior::Hang => futures::future::pending().await,
            }
        }

        async fn stream_alternate(
            &self,
            _body: &serde_json::Value,
            _credentials: &UpstreamCredentials,
        ) -> Result<FramedEventStream, UpstreamError> {
            Err(UpstreamError::Transport("unused".into()))
        }
    }

    fn app_with(behavior: Behavior, token: Option<&str>) -> Router {
        let dispatcher = UpstreamDispatcher::new(
            Arc::new(StaticCredentials::new(token.map(String::from), "http://upstream")),
            Arc::new(MockUpstream {
                behavior,
                seen: Mutex::new(Vec::new()),
            }),
            Arc::new(ConfiguredEndpointSelector::new(Vec::new(), true)),
        );
        let tools = Arc::new(NoExternalTools);
        let agent = AgentOrchestrator::from_config(
            &AppConfig::default(),
            Arc::new(dispatcher),
            tools.clone(),
            tools,
        );
        build_router(Arc::new(GatewayState {
            agent,
            request_timeout: Duration::from_secs(300),
        }))
    }

    fn post_completion(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const HELLO: &str = r#"{"model":"gpt-4.1","messages":[{"role":"user","content":"hi"}],"stream":true}"#;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = app_with(Behavior::Answer("unused"), Some("t"));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn streams_answer_as_sse() {
        let app = app_with(Behavior::Answer("Hello there"), Some("t"));
        let response = app.oneshot(post_completion(HELLO)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();

        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.starts_with("data: ")));
        assert!(frames[0].contains(r#""role":"assistant""#));
        assert!(frames[1].contains("Hello there"));
        assert!(frames[2].contains(r#""finish_reason":"stop""#));
        assert_eq!(frames[3], "data: [DONE]");
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_request() {
        let app = app_with(Behavior::Answer("unused"), Some("t"));
        let response = app.oneshot(post_completion("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn empty_messages_rejected() {
        let app = app_with(Behavior::Answer("unused"), Some("t"));
        let response = app
            .oneshot(post_completion(r#"{"model":"gpt-4.1","messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"]["message"].as_str().unwrap().contains("messages"));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = app_with(Behavior::Answer("unused"), None);
        let response = app.oneshot(post_completion(HELLO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["type"], "authentication_error");
    }

    #[tokio::test]
    async fn upstream_rejection_keeps_status() {
        let app = app_with(
            Behavior::Fail(UpstreamError::Rejected {
                status: 422,
                body: "model not supported".into(),
            }),
            Some("t"),
        );
        let response = app.oneshot(post_completion(HELLO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "upstream_error");
        assert!(json["error"]["message"].as_str().unwrap().contains("model not supported"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_before_first_byte_is_gateway_timeout() {
        let app = app_with(Behavior::Hang, Some("t"));
        let response = app.oneshot(post_completion(HELLO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["error"]["type"], "timeout_error");
    }
}
