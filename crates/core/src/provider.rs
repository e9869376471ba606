//! Upstream abstractions: the turn request and the collaborators that carry it.
//!
//! A turn request is always expressed in the caller-facing chat shape. Which
//! upstream protocol actually serves it is decided by an [`EndpointSelector`];
//! an [`UpstreamClient`] knows how to open either stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::message::Message;
use crate::stream::FramedEventStream;

/// A chat-completion request in the caller-facing shape.
///
/// Fields the gateway does not interpret (`top_p`, `stop`, `user`, ...) are
/// kept in `extra` and forwarded verbatim to the primary upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "gpt-4.1", "gpt-5.1-codex")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Requested depth of reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A tool definition in the caller-facing shape
/// (`{"type": "function", "function": {...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type", default = "default_tool_type")]
    pub kind: String,

    pub function: FunctionSpec,
}

fn default_tool_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema describing the tool's parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind: default_tool_type(),
            function: FunctionSpec {
                name: name.into(),
                description,
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Requested reasoning depth. Totally ordered: `low < medium < high < xhigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
    #[serde(rename = "xhigh")]
    XHigh,
}

impl ReasoningEffort {
    /// The wire label, also what upstreams quote back when they reject it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }

    /// The next level down, `None` for `low`.
    pub fn next_lower(self) -> Option<Self> {
        match self {
            Self::Low => None,
            Self::Medium => Some(Self::Low),
            Self::High => Some(Self::Medium),
            Self::XHigh => Some(Self::High),
        }
    }
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upstream protocol serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Chat-completions stream, already in the caller-facing chunk shape
    Primary,
    /// Responses-style event stream, translated before reaching the caller
    Alternate,
}

/// Credentials for one upstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub token: String,
    pub base_url: String,
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Source of the current upstream token.
#[async_trait]
pub trait Credentials: Send + Sync {
    async fn current(&self) -> Result<UpstreamCredentials, UpstreamError>;
}

/// Opens upstream event streams.
///
/// Both methods return once the upstream accepted the request; the returned
/// receiver then yields framed events until the stream ends. Dropping the
/// receiver cancels the underlying transfer.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Open a chat-completions stream. Event data is chunk JSON or `[DONE]`.
    async fn stream_primary(
        &self,
        request: &ChatRequest,
        credentials: &UpstreamCredentials,
    ) -> Result<FramedEventStream, UpstreamError>;

    /// Open a responses-style stream with an already translated body.
    async fn stream_alternate(
        &self,
        body: &serde_json::Value,
        credentials: &UpstreamCredentials,
    ) -> Result<FramedEventStream, UpstreamError>;
}

/// Decides which protocol serves a model.
pub trait EndpointSelector: Send + Sync {
    fn select(&self, model: &str) -> Endpoint;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effort_is_totally_ordered() {
        assert!(ReasoningEffort::Low < ReasoningEffort::Medium);
        assert!(ReasoningEffort::High < ReasoningEffort::XHigh);
        assert_eq!(
            ReasoningEffort::XHigh.min(ReasoningEffort::Medium),
            ReasoningEffort::Medium
        );
    }

    #[test]
    fn next_lower_walks_down_to_low() {
        assert_eq!(ReasoningEffort::XHigh.next_lower(), Some(ReasoningEffort::High));
        assert_eq!(ReasoningEffort::Medium.next_lower(), Some(ReasoningEffort::Low));
        assert_eq!(ReasoningEffort::Low.next_lower(), None);
    }

    #[test]
    fn effort_labels_match_wire_format() {
        let effort: ReasoningEffort = serde_json::from_str("\"xhigh\"").unwrap();
        assert_eq!(effort, ReasoningEffort::XHigh);
        assert_eq!(serde_json::to_string(&ReasoningEffort::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn chat_request_keeps_unknown_fields() {
        let raw = r#"{"model":"gpt-4.1","messages":[{"role":"user","content":"hi"}],"top_p":0.5,"stream":true}"#;
        let req: ChatRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.extra["top_p"], 0.5);
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["top_p"], 0.5);
        assert!(back.get("tools").is_none());
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = UpstreamCredentials {
            token: "ghu_secret".into(),
            base_url: "https://api.example.com".into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("ghu_secret"));
        assert!(debug.contains("REDACTED"));
    }
}
