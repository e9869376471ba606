//! Server-sent event framing.
//!
//! Turns raw response bytes into [`FramedEvent`]s. Besides the usual
//! blank-line delimiter, a pending payload is also flushed when a new
//! `event:` or `id:` field arrives, because some upstreams start the next
//! frame without a separating blank line.

use futures::{Stream, StreamExt};
use streamgate_core::{FramedEvent, FramedEventStream, UpstreamError};
use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of the channel between the framing task and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Line-oriented SSE parser.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator. Returns an event when the line
    /// completes one.
    pub fn push_line(&mut self, line: &str) -> Option<FramedEvent> {
        if line.is_empty() {
            let event = self.take_event();
            if event.is_some() {
                self.event = None;
                self.id = None;
            }
            return event;
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':')?;
        match field {
            "data" => {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.data.push(value.to_string());
                None
            }
            "event" => {
                let flushed = self.take_event();
                if flushed.is_some() {
                    self.id = None;
                }
                self.event = Some(value.trim().to_string());
                flushed
            }
            "id" => {
                let flushed = self.take_event();
                if flushed.is_some() {
                    self.event = None;
                    self.id = None;
                }
                self.id = Some(value.trim().to_string());
                flushed
            }
            _ => None,
        }
    }

    /// End of input: emit whatever is still buffered.
    pub fn finish(&mut self) -> Option<FramedEvent> {
        self.take_event()
    }

    /// Parse a complete sequence of lines.
    pub fn parse_all<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<FramedEvent> {
        let mut parser = Self::new();
        let mut events: Vec<FramedEvent> = lines
            .into_iter()
            .filter_map(|line| parser.push_line(line))
            .collect();
        events.extend(parser.finish());
        events
    }

    fn take_event(&mut self) -> Option<FramedEvent> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(FramedEvent {
            data,
            event: self.event.clone(),
            id: self.id.clone(),
        })
    }
}

/// Splits a byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped. Bytes are buffered until
/// the line is complete, so multi-byte characters split across network
/// chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let rest = self.buffer.split_off(end + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop();
            lines.push(decode_line(line));
        }
        lines
    }

    /// The unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(decode_line(std::mem::take(&mut self.buffer)))
        }
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Frame a byte stream on a background task.
///
/// Events are delivered through a bounded channel, one upstream item at a
/// time. Dropping the receiver stops the task and drops `source`, without
/// flushing a partially buffered event. A source error is forwarded as
/// [`UpstreamError::Transport`] and ends the stream.
pub fn spawn_event_stream<S, B, E>(source: S) -> FramedEventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut source = std::pin::pin!(source);
        let mut lines = LineSplitter::default();
        let mut parser = EventStreamParser::new();

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    trace!("Event consumer dropped, stopping upstream read");
                    return;
                }
                next = source.next() => next,
            };

            let Some(chunk) = next else { break };
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(Err(UpstreamError::Transport(e.to_string()))).await;
                    return;
                }
            };

            for line in lines.push(bytes.as_ref()) {
                if let Some(event) = parser.push_line(&line)
                    && tx.send(Ok(event)).await.is_err()
                {
                    return;
                }
            }
        }

        if let Some(line) = lines.finish()
            && let Some(event) = parser.push_line(&line)
            && tx.send(Ok(event)).await.is_err()
        {
            return;
        }
        if let Some(event) = parser.finish() {
            let _ = tx.send(Ok(event)).await;
        }
    });

    rx
}
