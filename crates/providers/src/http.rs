//! reqwest-backed upstream client.

use async_trait::async_trait;
use streamgate_core::{
    ChatRequest, FramedEventStream, UpstreamClient, UpstreamCredentials, UpstreamError,
};
use tracing::{debug, warn};

use crate::sse::spawn_event_stream;

/// Error bodies longer than this are cut before they are surfaced.
const MAX_ERROR_BODY: usize = 4096;

/// Opens streaming completions over HTTP.
///
/// Primary requests go to `{base}/chat/completions`, alternate ones to
/// `{base}/responses`. No overall timeout is set on the client; the gateway
/// owns the request deadline.
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| UpstreamError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn open(
        &self,
        path: &str,
        body: &serde_json::Value,
        credentials: &UpstreamCredentials,
    ) -> Result<FramedEventStream, UpstreamError> {
        let url = format!("{}/{path}", credentials.base_url.trim_end_matches('/'));
        debug!(url = %url, "Opening upstream stream");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", credentials.token))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(UpstreamError::Unauthorized(format!(
                "upstream refused credentials (status {status})"
            )));
        }

        if !response.status().is_success() {
            let body = truncate(response.text().await.unwrap_or_default());
            warn!(status, body = %body, "Upstream returned error");
            return Err(UpstreamError::Rejected { status, body });
        }

        Ok(spawn_event_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn stream_primary(
        &self,
        request: &ChatRequest,
        credentials: &UpstreamCredentials,
    ) -> Result<FramedEventStream, UpstreamError> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| UpstreamError::Transport(format!("failed to encode request: {e}")))?;
        body["stream"] = serde_json::json!(true);
        self.open("chat/completions", &body, credentials).await
    }

    async fn stream_alternate(
        &self,
        body: &serde_json::Value,
        credentials: &UpstreamCredentials,
    ) -> Result<FramedEventStream, UpstreamError> {
        self.open("responses", body, credentials).await
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(body);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn short_bodies_untouched() {
        assert_eq!(truncate("bad effort: xhigh".into()), "bad effort: xhigh");
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let client = HttpUpstreamClient::new().unwrap();
        let creds = UpstreamCredentials {
            token: "t".into(),
            base_url: "http://127.0.0.1:9".into(),
        };
        let result = client
            .stream_alternate(&serde_json::json!({"model": "m"}), &creds)
            .await;
        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }
}
