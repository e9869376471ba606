//! Streaming types: framed SSE events and caller-facing delta chunks.
//!
//! Everything that moves between the upstream and the caller is a
//! [`FramedEvent`]. When it carries caller-shape data its `data` is the JSON
//! of a [`ChatChunk`], or the literal [`DONE_SENTINEL`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::UpstreamError;
use crate::message::{Role, ToolCall};

/// `data` value that means "no more events".
pub const DONE_SENTINEL: &str = "[DONE]";

/// A pull-driven stream of framed events fed by a producer task.
///
/// A transport failure arrives as an `Err` item and ends the stream.
pub type FramedEventStream = mpsc::Receiver<Result<FramedEvent, UpstreamError>>;

/// One discrete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramedEvent {
    /// Payload; multi-line frames are joined with `\n`
    pub data: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FramedEvent {
    /// An event carrying only data.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            event: None,
            id: None,
        }
    }

    /// The `[DONE]` sentinel.
    pub fn done() -> Self {
        Self::data(DONE_SENTINEL)
    }

    pub fn is_done(&self) -> bool {
        self.data == DONE_SENTINEL
    }
}

/// A `chat.completion.chunk` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub id: String,

    #[serde(default = "default_chunk_object")]
    pub object: String,

    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

fn default_chunk_object() -> String {
    "chat.completion.chunk".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,

    #[serde(default)]
    pub delta: ChunkDelta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool-call fragment. Arrives incrementally across chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ChatChunk {
    /// Serialize into an SSE event.
    pub fn to_event(&self) -> FramedEvent {
        FramedEvent::data(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Stamps out chunks that share one completion id, timestamp and model.
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    id: String,
    created: i64,
    model: String,
}

impl ChunkBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
        }
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ChatChunk {
        ChatChunk {
            id: self.id.clone(),
            object: default_chunk_object(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    /// `{"role": "assistant"}` delta.
    pub fn role(&self) -> ChatChunk {
        self.chunk(
            ChunkDelta {
                role: Some(Role::Assistant),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    pub fn content(&self, text: impl Into<String>) -> ChatChunk {
        self.chunk(
            ChunkDelta {
                content: Some(text.into()),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    /// Opens a tool call: id, type and name, with empty arguments.
    pub fn tool_call_start(&self, index: u32, id: impl Into<String>, name: impl Into<String>) -> ChatChunk {
        self.tool_call_deltas(vec![ToolCallDelta {
            index: Some(index),
            id: Some(id.into()),
            kind: Some("function".into()),
            function: Some(FunctionDelta {
                name: Some(name.into()),
                arguments: Some(String::new()),
            }),
        }])
    }

    /// An argument fragment for an already opened tool call.
    pub fn tool_call_arguments(&self, index: u32, arguments: impl Into<String>) -> ChatChunk {
        self.tool_call_deltas(vec![ToolCallDelta {
            index: Some(index),
            function: Some(FunctionDelta {
                name: None,
                arguments: Some(arguments.into()),
            }),
            ..ToolCallDelta::default()
        }])
    }

    /// Complete tool calls in one chunk, indexed by position.
    pub fn tool_calls(&self, calls: &[ToolCall]) -> ChatChunk {
        let deltas = calls
            .iter()
            .enumerate()
            .map(|(i, call)| ToolCallDelta {
                index: Some(i as u32),
                id: Some(call.id.clone()),
                kind: Some(call.kind.clone()),
                function: Some(FunctionDelta {
                    name: Some(call.function.name.clone()),
                    arguments: Some(call.function.arguments.clone()),
                }),
            })
            .collect();
        self.tool_call_deltas(deltas)
    }

    fn tool_call_deltas(&self, deltas: Vec<ToolCallDelta>) -> ChatChunk {
        self.chunk(
            ChunkDelta {
                tool_calls: Some(deltas),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    /// Empty delta carrying the finish reason.
    pub fn finish(&self, reason: &str) -> ChatChunk {
        self.chunk(ChunkDelta::default(), Some(reason))
    }
}
