//! `POST /v1/chat/completions`.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event as SseEvent, Sse};
use futures::{Stream, StreamExt, future};
use streamgate_core::{ChatRequest, Error, FramedEventStream};
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::SharedState;
use crate::error::ApiError;

/// Run the agent for one request and stream the answer.
///
/// Everything up to the first byte races the request deadline and fails
/// with a JSON error. After that the body is cut silently on deadline or
/// upstream failure.
pub async fn chat_completions_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    validate(&request)?;

    info!(
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.len(),
        "Chat completion request"
    );

    let deadline = Instant::now() + state.request_timeout;
    let model = request.model.clone();
    let reply = timeout_at(deadline, state.agent.run(request))
        .await
        .map_err(|_| {
            warn!(model = %model, "Request deadline reached before streaming");
            ApiError::timeout()
        })??;

    Ok(Sse::new(sse_body(reply.into_event_stream(&model), deadline)))
}

fn validate(request: &ChatRequest) -> streamgate_core::Result<()> {
    if request.model.trim().is_empty() {
        return Err(Error::InvalidRequest("'model' is required".into()));
    }
    if request.messages.is_empty() {
        return Err(Error::InvalidRequest("'messages' must not be empty".into()));
    }
    Ok(())
}

/// Frame events for the wire until the stream ends, fails, or the deadline
/// passes. Dropping the source cancels the upstream.
pub fn sse_body(
    events: FramedEventStream,
    deadline: Instant,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    let expired = async move {
        sleep_until(deadline).await;
        warn!("Request deadline reached, truncating stream");
    };

    ReceiverStream::new(events)
        .take_until(expired)
        .scan((), |_, item| {
            future::ready(match item {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Upstream failed mid-stream, ending response");
                    None
                }
            })
        })
        .map(|event| Ok(SseEvent::default().data(event.data)))
}
