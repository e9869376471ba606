//! What the agent hands back to the gateway.

use streamgate_core::{ChunkBuilder, FramedEvent, FramedEventStream, ToolCall};
use tokio::sync::mpsc;

/// The final answer of one agent run.
#[derive(Debug)]
pub enum AgentReply {
    /// A buffered answer, rendered as a short chunk sequence.
    Complete {
        content: String,
        tool_calls: Vec<ToolCall>,
        finish_reason: String,
    },
    /// A live upstream turn forwarded as-is.
    Stream(FramedEventStream),
}

impl AgentReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Complete {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".into(),
        }
    }

    /// Tool calls for the caller to execute.
    pub fn tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Complete {
            content: content.into(),
            tool_calls,
            finish_reason: "tool_calls".into(),
        }
    }

    /// No content, no tool calls, finish `stop`.
    pub fn empty() -> Self {
        Self::text(String::new())
    }

    /// Turn the reply into a chunk event stream ending in `[DONE]`.
    pub fn into_event_stream(self, model: &str) -> FramedEventStream {
        match self {
            Self::Stream(stream) => stream,
            Self::Complete {
                content,
                tool_calls,
                finish_reason,
            } => {
                let events = render_complete(model, &content, &tool_calls, &finish_reason);
                let (tx, rx) = mpsc::channel(events.len().max(1));
                for event in events {
                    if tx.try_send(Ok(event)).is_err() {
                        break;
                    }
                }
                rx
            }
        }
    }
}

/// Role chunk, content chunk if any, one chunk with every tool call if
/// any, finish chunk, `[DONE]`.
pub fn render_complete(
    model: &str,
    content: &str,
    tool_calls: &[ToolCall],
    finish_reason: &str,
) -> Vec<FramedEvent> {
    let chunks = ChunkBuilder::new(model);
    let mut events = vec![chunks.role().to_event()];
    if !content.is_empty() {
        events.push(chunks.content(content).to_event());
    }
    if !tool_calls.is_empty() {
        events.push(chunks.tool_calls(tool_calls).to_event());
    }
    events.push(chunks.finish(finish_reason).to_event());
    events.push(FramedEvent::done());
    events
}
