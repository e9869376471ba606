//! Responses-style protocol translation.
//!
//! Models served by the alternate endpoint speak a typed event stream
//! (`response.output_text.delta`, `response.completed`, ...) instead of
//! chat-completion chunks. This module converts caller requests into that
//! shape and converts the resulting event stream back into chunks.

use serde::Deserialize;
use serde_json::{Value, json};
use streamgate_core::{
    ChatChunk, ChatRequest, ChunkBuilder, FramedEvent, FramedEventStream, Message, Role,
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::sse::EVENT_CHANNEL_CAPACITY;

/// Event types the translator acts on.
pub mod event_types {
    pub const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";
    pub const OUTPUT_ITEM_ADDED: &str = "response.output_item.added";
    pub const FUNCTION_CALL_ARGUMENTS_DELTA: &str = "response.function_call_arguments.delta";
    pub const COMPLETED: &str = "response.completed";
    pub const FAILED: &str = "response.failed";
    pub const INCOMPLETE: &str = "response.incomplete";
}

// ========================================================================
// Request direction
// ========================================================================

/// Convert a caller request into a responses-style request body.
pub fn build_responses_request(request: &ChatRequest) -> Value {
    let mut instructions: Vec<String> = Vec::new();
    let mut input: Vec<Value> = Vec::new();

    for message in &request.messages {
        match message.role {
            Role::System | Role::Developer => instructions.push(message.text()),
            Role::User => input.push(message_item("user", message)),
            Role::Assistant if !message.tool_calls.is_empty() => {
                if !message.text().is_empty() {
                    input.push(message_item("assistant", message));
                }
                for call in &message.tool_calls {
                    let call_id = if call.id.is_empty() {
                        format!("call_{}", uuid::Uuid::new_v4().simple())
                    } else {
                        call.id.clone()
                    };
                    input.push(json!({
                        "type": "function_call",
                        "call_id": call_id,
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                    }));
                }
            }
            Role::Assistant => input.push(message_item("assistant", message)),
            Role::Tool => input.push(json!({
                "type": "function_call_output",
                "call_id": message.tool_call_id.clone().unwrap_or_default(),
                "output": message.text(),
            })),
        }
    }

    let mut body = serde_json::Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert("input".to_string(), Value::Array(input));
    body.insert("stream".to_string(), json!(true));

    if !instructions.is_empty() {
        body.insert("instructions".to_string(), json!(instructions.join("\n")));
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "name": tool.function.name,
                    "description": tool.function.description,
                    "parameters": tool.function.parameters,
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
    }

    if let Some(effort) = request.reasoning_effort {
        body.insert("reasoning".to_string(), json!({ "effort": effort.as_str() }));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        body.insert("max_output_tokens".to_string(), json!(max_tokens));
    }

    Value::Object(body)
}

fn message_item(role: &str, message: &Message) -> Value {
    json!({
        "type": "message",
        "role": role,
        "content": message.text(),
    })
}

// ========================================================================
// Response direction
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    TextDelta,
    OutputItemAdded,
    ArgumentsDelta,
    Completed,
    Failed,
    Incomplete,
}

impl EventKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            event_types::OUTPUT_TEXT_DELTA => Some(Self::TextDelta),
            event_types::OUTPUT_ITEM_ADDED => Some(Self::OutputItemAdded),
            event_types::FUNCTION_CALL_ARGUMENTS_DELTA => Some(Self::ArgumentsDelta),
            event_types::COMPLETED => Some(Self::Completed),
            event_types::FAILED => Some(Self::Failed),
            event_types::INCOMPLETE => Some(Self::Incomplete),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    #[serde(default)]
    delta: String,
}

#[derive(Debug, Deserialize)]
struct ItemAdded {
    item: OutputItem,
}

#[derive(Debug, Deserialize)]
struct ArgumentsDelta {
    #[serde(default)]
    delta: String,
}

#[derive(Debug, Deserialize)]
struct Completed {
    #[serde(default)]
    response: ResponseSummary,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseSummary {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputContent {
    OutputText {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Prefer `call_id`, fall back to the item id, else make one up.
fn resolve_call_id(id: Option<String>, call_id: Option<String>) -> String {
    call_id
        .filter(|s| !s.is_empty())
        .or(id.filter(|s| !s.is_empty()))
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()))
}

/// Converts responses-style events into chat-completion chunks.
///
/// Feed events in order with [`translate`](Self::translate). The role chunk
/// is emitted once, ahead of the first content or tool-call chunk. When the
/// stream completes without having streamed anything, the output items of
/// the completion summary are replayed as chunks.
#[derive(Debug)]
pub struct ResponsesTranslator {
    chunks: ChunkBuilder,
    role_sent: bool,
    content_streamed: bool,
    tool_calls_started: u32,
    finished: bool,
}

impl ResponsesTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            chunks: ChunkBuilder::new(model),
            role_sent: false,
            content_streamed: false,
            tool_calls_started: 0,
            finished: false,
        }
    }

    /// Whether a terminal event has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Translate one event into zero or more chunks.
    pub fn translate(&mut self, event: &FramedEvent) -> Vec<ChatChunk> {
        let payload: Value = match serde_json::from_str(&event.data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, event = ?event.event, "Skipping malformed upstream event");
                return Vec::new();
            }
        };

        let kind = event
            .event
            .as_deref()
            .and_then(EventKind::from_name)
            .or_else(|| payload.get("type").and_then(Value::as_str).and_then(EventKind::from_name));
        let Some(kind) = kind else {
            trace!(event = ?event.event, "Ignoring inert upstream event");
            return Vec::new();
        };

        let mut out = Vec::new();
        match kind {
            EventKind::TextDelta => {
                if let Some(delta) = decode::<TextDelta>(payload)
                    && !delta.delta.is_empty()
                {
                    self.push_content(&mut out, delta.delta);
                }
            }
            EventKind::OutputItemAdded => {
                if let Some(ItemAdded {
                    item:
                        OutputItem::FunctionCall {
                            id, call_id, name, ..
                        },
                }) = decode::<ItemAdded>(payload)
                {
                    self.push_tool_call_start(&mut out, resolve_call_id(id, call_id), name);
                }
            }
            EventKind::ArgumentsDelta => {
                if let Some(delta) = decode::<ArgumentsDelta>(payload) {
                    match self.tool_calls_started.checked_sub(1) {
                        Some(index) => out.push(self.chunks.tool_call_arguments(index, delta.delta)),
                        None => debug!("Arguments delta before any tool call, skipping"),
                    }
                }
            }
            EventKind::Completed => {
                if !self.content_streamed
                    && self.tool_calls_started == 0
                    && let Some(completed) = decode::<Completed>(payload)
                {
                    self.replay_summary(&mut out, completed.response);
                }
                let reason = if self.tool_calls_started > 0 {
                    "tool_calls"
                } else {
                    "stop"
                };
                out.push(self.chunks.finish(reason));
                self.finished = true;
            }
            EventKind::Failed | EventKind::Incomplete => {
                debug!(?kind, "Upstream response ended without completing");
                out.push(self.chunks.finish("stop"));
                self.finished = true;
            }
        }
        out
    }

    fn replay_summary(&mut self, out: &mut Vec<ChatChunk>, summary: ResponseSummary) {
        for item in summary.output {
            match item {
                OutputItem::Message { content } => {
                    let text: String = content
                        .into_iter()
                        .filter_map(|part| match part {
                            OutputContent::OutputText { text } => Some(text),
                            OutputContent::Other => None,
                        })
                        .collect();
                    if !text.is_empty() {
                        self.push_content(out, text);
                    }
                }
                OutputItem::FunctionCall {
                    id,
                    call_id,
                    name,
                    arguments,
                } => {
                    let index =
                        self.push_tool_call_start(out, resolve_call_id(id, call_id), name);
                    out.push(self.chunks.tool_call_arguments(index, arguments));
                }
                OutputItem::Other => {}
            }
        }
    }

    fn ensure_role(&mut self, out: &mut Vec<ChatChunk>) {
        if !self.role_sent {
            out.push(self.chunks.role());
            self.role_sent = true;
        }
    }

    fn push_content(&mut self, out: &mut Vec<ChatChunk>, text: String) {
        self.ensure_role(out);
        out.push(self.chunks.content(text));
        self.content_streamed = true;
    }

    fn push_tool_call_start(&mut self, out: &mut Vec<ChatChunk>, id: String, name: String) -> u32 {
        self.ensure_role(out);
        let index = self.tool_calls_started;
        out.push(self.chunks.tool_call_start(index, id, name));
        self.tool_calls_started += 1;
        index
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Skipping upstream event with unexpected shape");
            None
        }
    }
}

/// Translate a responses-style event stream into a chunk stream on a
/// background task.
///
/// The output always ends with `[DONE]` unless the source fails, in which
/// case the failure is forwarded instead. Dropping the returned receiver
/// drops `source`, which in turn stops the upstream read.
pub fn translate_stream(mut source: FramedEventStream, model: impl Into<String>) -> FramedEventStream {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut translator = ResponsesTranslator::new(model);

    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                _ = tx.closed() => return,
                item = source.recv() => item,
            };
            let event = match item {
                None => break,
                Some(Err(e)) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                Some(Ok(event)) => event,
            };
            if event.is_done() {
                break;
            }
            for chunk in translator.translate(&event) {
                if tx.send(Ok(chunk.to_event())).await.is_err() {
                    return;
                }
            }
            if translator.is_finished() {
                break;
            }
        }
        let _ = tx.send(Ok(FramedEvent::done())).await;
    });

    rx
}
