//! Server-sent event framing
//!
//! Frames are separated by a blank line. Within a frame, `event:` names the
//! type (default `message`), `data:` lines are joined with `\n`, and lines
//! starting with `:` are comments. Network reads can split a frame anywhere,
//! including inside a UTF-8 sequence, so the decoder buffers raw bytes until a
//! full frame is available.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::stream::events::ChatEvent;

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every frame completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw[..end])) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let raw = std::mem::take(&mut self.buffer);
        parse_frame(&String::from_utf8_lossy(&raw))
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Split a complete SSE document into frames.
pub fn parse_sse_text(text: &str) -> Vec<SseFrame> {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.push(text.as_bytes());
    frames.extend(decoder.finish());
    frames
}

/// Turn a byte stream (an HTTP response body) into typed events.
///
/// Frames that fail to decode are logged and dropped; a read error ends the
/// stream after yielding [`Error::StreamTransport`].
pub fn decode_event_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<ChatEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = BodyState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.queue(frames);
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(Error::StreamTransport(e.to_string())));
                }
                None => {
                    state.done = true;
                    let trailing = state.decoder.finish();
                    state.queue(trailing.into_iter().collect());
                }
            }
        }
    })
}

struct BodyState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<ChatEvent>>,
    done: bool,
}

impl<S> BodyState<S> {
    fn queue(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            match ChatEvent::decode(&frame.event, &frame.data) {
                Ok(events) => self.pending.extend(events.into_iter().map(Ok)),
                Err(e) => {
                    tracing::warn!(event_type = %frame.event, error = %e, "Dropping undecodable frame");
                }
            }
        }
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: message_chunk\nda").is_empty());
        assert!(decoder.push(b"ta: {\"id\": \"m1\"}\n").is_empty());
        let frames = decoder.push(b"\nevent: finish\ndata: {}\n\n");
        assert_eq!(
            frames,
            vec![
                SseFrame {
                    event: "message_chunk".to_string(),
                    data: "{\"id\": \"m1\"}".to_string(),
                },
                SseFrame {
                    event: "finish".to_string(),
                    data: "{}".to_string(),
                },
            ]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_split_inside_utf8() {
        let text = "event: message_chunk\ndata: 股价\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let (a, b) = text.split_at(text.len() - 4);
        assert!(decoder.push(a).is_empty());
        let frames = decoder.push(b);
        assert_eq!(frames[0].data, "股价");
    }

    #[test]
    fn test_crlf_comments_and_multiline_data() {
        let frames = parse_sse_text(": keep-alive\r\n\r\nevent: error\r\ndata: line one\r\ndata: line two\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "error");
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[tokio::test]
    async fn test_decode_event_stream() {
        let body: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"event: message_chunk\ndata: {\"id\": \"m1\", \"content\": \"He\"}\n\nevent: mess".to_vec()),
            Ok(b"age_chunk\ndata: {broken}\n\n".to_vec()),
            Ok(b"event: message_chunk\ndata: {\"id\": \"m1\", \"content\": \"llo\"}\n\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"event: message_chunk\ndata: {\"id\": \"m1\", \"content\": \"!\"}\n\n".to_vec()),
        ];
        let items: Vec<_> = decode_event_stream(futures::stream::iter(body)).collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &ChatEvent::chunk("m1", "He"));
        assert_eq!(items[1].as_ref().unwrap(), &ChatEvent::chunk("m1", "llo"));
        assert!(matches!(items[2], Err(Error::StreamTransport(_))));
    }

    #[test]
    fn test_trailing_frame_without_blank_line() {
        let frames = parse_sse_text("data: {\"id\": \"m1\"}");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
    }
}
