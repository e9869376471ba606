//! Draining a chunk stream into one assistant turn.

use streamgate_core::{ChatChunk, FramedEventStream, ToolCall, ToolCallAccumulator, UpstreamError};
use tracing::debug;

/// Everything one upstream turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

/// Read chunks until `[DONE]` or the first chunk carrying a finish reason.
///
/// Malformed chunks are skipped. A transport failure aborts collection.
/// The stream is dropped on return, which cancels any remaining upstream
/// transfer.
pub async fn collect_turn(mut stream: FramedEventStream) -> Result<CollectedTurn, UpstreamError> {
    let mut content = String::new();
    let mut calls = ToolCallAccumulator::new();
    let mut finish_reason = None;

    while let Some(item) = stream.recv().await {
        let event = item?;
        if event.is_done() {
            break;
        }

        let chunk: ChatChunk = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Skipping malformed chunk");
                continue;
            }
        };
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };

        if let Some(text) = choice.delta.content {
            content.push_str(&text);
        }
        if let Some(deltas) = &choice.delta.tool_calls {
            calls.push_all(deltas);
        }
        if choice.finish_reason.is_some() {
            finish_reason = choice.finish_reason;
            break;
        }
    }

    Ok(CollectedTurn {
        content,
        tool_calls: calls.build(),
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_core::{ChunkBuilder, FramedEvent};
    use tokio::sync::mpsc;

    fn stream_of(items: Vec<Result<FramedEvent, UpstreamError>>) -> FramedEventStream {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn merges_content_and_tool_calls() {
        let b = ChunkBuilder::new("m");
        let turn = collect_turn(stream_of(vec![
            Ok(b.role().to_event()),
            Ok(b.content("Let me ").to_event()),
            Ok(b.content("check.").to_event()),
            Ok(b.tool_call_start(0, "call_1", "search").to_event()),
            Ok(b.tool_call_arguments(0, "{\"q\":").to_event()),
            Ok(b.tool_call_arguments(0, "\"rust\"}").to_event()),
            Ok(b.finish("tool_calls").to_event()),
            Ok(FramedEvent::done()),
        ]))
        .await
        .unwrap();

        assert_eq!(turn.content, "Let me check.");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "call_1");
        assert_eq!(turn.tool_calls[0].function.arguments, "{\"q\":\"rust\"}");
        assert_eq!(turn.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn stops_at_first_finish_reason() {
        let b = ChunkBuilder::new("m");
        let turn = collect_turn(stream_of(vec![
            Ok(b.content("a").to_event()),
            Ok(b.finish("stop").to_event()),
            Ok(b.content("ignored").to_event()),
        ]))
        .await
        .unwrap();
        assert_eq!(turn.content, "a");
    }

    #[tokio::test]
    async fn skips_malformed_chunks() {
        let b = ChunkBuilder::new("m");
        let turn = collect_turn(stream_of(vec![
            Ok(FramedEvent::data("{broken")),
            Ok(FramedEvent::data(r#"{"choices":[]}"#)),
            Ok(b.content("fine").to_event()),
            Ok(FramedEvent::done()),
            Ok(b.content("after done").to_event()),
        ]))
        .await
        .unwrap();
        assert_eq!(turn.content, "fine");
        assert!(turn.finish_reason.is_none());
    }

    #[tokio::test]
    async fn transport_error_aborts() {
        let b = ChunkBuilder::new("m");
        let result = collect_turn(stream_of(vec![
            Ok(b.content("partial").to_event()),
            Err(UpstreamError::Transport("reset".into())),
        ]))
        .await;
        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }
}
