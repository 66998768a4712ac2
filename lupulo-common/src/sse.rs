//! Server-Sent Events (SSE) utilities
//!
//! Inbound: [`SseParser`] incrementally decodes a `text/event-stream` body
//! into [`SseFrame`]s, as the upstream source client receives it in
//! arbitrary chunks.
//!
//! [`decode_sse_stream`] wraps the parser around a byte stream.
//!
//! Outbound: [`event_bus_sse_stream`] turns an [`EventBus`] subscription into
//! an axum SSE response for UI clients.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Default SSE event name when a frame has no `event:` field
pub const DEFAULT_EVENT: &str = "message";

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`message` unless the frame set one)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds
    pub retry: Option<u64>,
}

impl SseFrame {
    pub fn new(event: &str, data: &str) -> Self {
        Self {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
            retry: None,
        }
    }
}

/// Default cap on a single line and on one frame's accumulated data
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental `text/event-stream` decoder
///
/// Bytes may arrive split anywhere, including inside a multi-byte UTF-8
/// sequence; only complete lines are decoded.
///
/// A line longer than the limit is discarded up to its terminating newline,
/// and so is the rest of the frame it belongs to. The same applies to a frame
/// whose joined `data:` lines exceed the limit. Decoding resumes at the next
/// frame boundary.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line_bytes: usize,
    skip_line: bool,
    skip_frame: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    retry: Option<u64>,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            skip_line: false,
            skip_frame: false,
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            retry: None,
        }
    }

    /// Feed a chunk of bytes, returning every frame completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;

        loop {
            let from = start.max(self.scanned);
            let Some(rel) = self.buffer[from..].iter().position(|&b| b == b'\n') else {
                break;
            };
            let end = from + rel;
            let line_start = start;
            start = end + 1;

            if self.skip_line {
                self.skip_line = false;
                continue;
            }
            if end - line_start > self.max_line_bytes {
                warn!(
                    "Dropping SSE line over {} bytes and the rest of its frame",
                    self.max_line_bytes
                );
                self.abandon_frame();
                continue;
            }

            let mut line = &self.buffer[line_start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            warn!(
                "Dropping SSE line over {} bytes and the rest of its frame",
                self.max_line_bytes
            );
            self.buffer.clear();
            self.scanned = 0;
            self.skip_line = true;
            self.abandon_frame();
        }

        frames
    }

    /// Last `retry:` value received, if any
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Last `id:` value received, if any
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if self.skip_frame {
            if line.is_empty() {
                self.skip_frame = false;
            }
            return None;
        }

        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.data.len() + value.len() + 1 > self.max_line_bytes {
                    warn!(
                        "Dropping SSE frame with over {} bytes of data",
                        self.max_line_bytes
                    );
                    self.abandon_frame();
                    return None;
                }
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => match value.parse::<u64>() {
                Ok(ms) => self.retry = Some(ms),
                Err(_) => debug!("Ignoring non-numeric SSE retry value: {}", value),
            },
            other => debug!("Ignoring unknown SSE field: {}", other),
        }

        None
    }

    fn abandon_frame(&mut self) {
        self.event = None;
        self.data.clear();
        self.has_data = false;
        self.skip_frame = true;
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}

/// Decode a `text/event-stream` body into frames
///
/// The first transport error ends the stream after being yielded.
pub fn decode_sse_stream<S, B, E>(body: S) -> impl Stream<Item = Result<SseFrame, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        let mut parser = SseParser::new();
        let mut body = Box::pin(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in parser.feed(chunk.as_ref()) {
                yield frame;
            }
        }
    }
}

/// Create an SSE response streaming every EventBus event to one client
///
/// The SSE event name is the event type; the data is the event as JSON.
/// Lagged clients skip the events they missed.
pub fn event_bus_sse_stream(
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(
        "New SSE client connected, total clients: {}",
        bus.subscriber_count() + 1
    );

    let stream = BroadcastStream::new(bus.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => match Event::default().event(event.event_type()).json_data(&event) {
                Ok(sse_event) => Some(Ok(sse_event)),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("SSE client lagged: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: new_devices\ndata: {\"added\":[\"1\"]}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "new_devices");
        assert_eq!(frames[0].data, "{\"added\":[\"1\"]}");
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: id1-batt").is_empty());
        assert!(parser.feed(b"ery\ndata: 4").is_empty());
        let frames = parser.feed(b"2\n\n");
        assert_eq!(frames, vec![SseFrame::new("id1-battery", "42")]);
    }

    #[test]
    fn test_multibyte_utf8_split() {
        let mut parser = SseParser::new();
        let bytes = "data: \"caña\"\n\n".as_bytes();
        // Split inside the two-byte 'ñ'
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let frames = parser.feed(&bytes[split..]);
        assert_eq!(frames[0].data, "\"caña\"");
        assert_eq!(frames[0].event, DEFAULT_EVENT);
    }

    #[test]
    fn test_oversized_line_is_dropped_and_stream_recovers() {
        let mut parser = SseParser::with_max_line_bytes(64);
        assert!(parser.feed(b"event: noisy\ndata: ").is_empty());
        for _ in 0..10 {
            assert!(parser.feed(&[b'x'; 50]).is_empty());
            assert!(parser.buffer.len() <= 64);
        }
        assert!(parser.feed(b"xxx\ndata: tail of dropped frame\n\n").is_empty());
        let frames = parser.feed(b"event: id1-battery\ndata: 42\n\n");
        assert_eq!(frames, vec![SseFrame::new("id1-battery", "42")]);
    }

    #[test]
    fn test_oversized_complete_line_in_one_chunk() {
        let mut parser = SseParser::with_max_line_bytes(16);
        let mut body = b"event: ".to_vec();
        body.extend_from_slice(&[b'e'; 40]);
        body.extend_from_slice(b"\ndata: lost\n\ndata: kept\n\n");
        let frames = parser.feed(&body);
        assert_eq!(frames, vec![SseFrame::new(DEFAULT_EVENT, "kept")]);
    }

    #[test]
    fn test_oversized_frame_data_is_dropped() {
        let mut parser = SseParser::with_max_line_bytes(16);
        let frames = parser.feed(
            b"data: aaaaaaaa\ndata: bbbbbbbb\ndata: cccc\n\ndata: ok\n\n",
        );
        assert_eq!(frames, vec![SseFrame::new(DEFAULT_EVENT, "ok")]);
    }

    #[test]
    fn test_many_small_chunks_before_newline() {
        let mut parser = SseParser::new();
        for b in b"data: {\"level\":3}" {
            assert!(parser.feed(std::slice::from_ref(b)).is_empty());
        }
        assert_eq!(parser.scanned, parser.buffer.len());
        let frames = parser.feed(b"\n\n");
        assert_eq!(frames, vec![SseFrame::new(DEFAULT_EVENT, "{\"level\":3}")]);
    }

    #[test]
    fn test_multiline_data_crlf_and_comments() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b": keep-alive\r\ndata: first\r\ndata:second\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn test_id_and_retry_fields() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"id: 7\nretry: 1500\nevent: x\ndata: 1\n\ndata: 2\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        // id persists until replaced
        assert_eq!(frames[1].id.as_deref(), Some("7"));
        assert_eq!(frames[1].event, DEFAULT_EVENT);
        assert_eq!(parser.retry(), Some(1500));
        assert_eq!(parser.last_event_id(), Some("7"));
    }

    #[test]
    fn test_event_without_data_is_not_dispatched() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: lonely\n\n").is_empty());
        // The dangling event name must not leak into the next frame
        let frames = parser.feed(b"data: x\n\n");
        assert_eq!(frames[0].event, DEFAULT_EVENT);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_error() {
        let chunks: Vec<Result<&[u8], &str>> = vec![
            Ok(&b"event: a\ndata: 1\n"[..]),
            Ok(&b"\ndata: 2\n\n"[..]),
            Err("connection reset"),
            Ok(&b"data: never\n\n"[..]),
        ];
        let results: Vec<_> = decode_sse_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(
            results,
            vec![
                Ok(SseFrame::new("a", "1")),
                Ok(SseFrame::new(DEFAULT_EVENT, "2")),
                Err("connection reset"),
            ]
        );
    }
}
