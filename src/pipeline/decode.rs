//! Streaming decoder (Bytes -> JSON Value)
//!
//! Splits a server-sent-events body into frames and yields each `data:` payload
//! that parses as JSON. Frames are located on raw bytes, so a chunk boundary may
//! fall inside a UTF-8 character or a CRLF pair.

use crate::{BoxStream, Result};
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde_json::Value;

/// A minimal SSE decoder:
/// - splits frames on a blank line (`\n\n`, `\r\n\r\n` or `\r\r`)
/// - strips the `data:` prefix
/// - stops on `[DONE]`
/// - skips comments and non-JSON frames
pub struct SseDecoder {
    prefix: String,
    done_signal: String,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            prefix: "data:".to_string(),
            done_signal: "[DONE]".to_string(),
        }
    }
}

/// Find the first blank line in `buf`.
///
/// Returns `(frame_len, consumed)`: the frame is `buf[..frame_len]` and the blank
/// line ends at `consumed`. A trailing `\r` is ambiguous until the next byte
/// arrives, so it yields `None`.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    let mut i = 0;
    while i < buf.len() {
        let eol = match buf[i] {
            b'\n' => 1,
            b'\r' => match buf.get(i + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None => return None,
            },
            _ => {
                i += 1;
                continue;
            }
        };
        if i == line_start {
            return Some((line_start, i + eol));
        }
        i += eol;
        line_start = i;
    }
    None
}

fn frame_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_frame(&self, frame: &str) -> Option<Value> {
        // A frame may span several `data:` lines; join their payloads.
        let mut payload = String::new();
        for line in frame.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix(&self.prefix) {
                payload.push_str(rest.trim_start());
            }
        }
        let payload = payload.trim();
        if payload.is_empty() || payload == self.done_signal {
            return None;
        }
        serde_json::from_str(payload).ok()
    }

    fn is_done(&self, frame: &str) -> bool {
        frame
            .lines()
            .filter_map(|l| l.trim().strip_prefix(&self.prefix))
            .any(|p| p.trim() == self.done_signal)
    }

    /// Incrementally buffer bytes and emit one JSON value per complete frame.
    pub fn decode_stream(self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
        let stream = stream::unfold(
            (input, BytesMut::new(), self, false),
            |(mut input, mut buf, decoder, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some((frame_len, consumed)) = frame_boundary(&buf) {
                        let raw = buf.split_to(consumed);
                        let frame = frame_text(&raw[..frame_len]);

                        if decoder.is_done(&frame) {
                            return None;
                        }
                        if let Some(v) = decoder.parse_frame(&frame) {
                            return Some((Ok(v), (input, buf, decoder, false)));
                        }
                        continue;
                    }

                    // Need more data.
                    match input.next().await {
                        Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                        Some(Err(e)) => {
                            return Some((Err(e), (input, buf, decoder, true)));
                        }
                        None => {
                            // EOF: try parse remaining buffer once
                            let rest = frame_text(&buf.split());
                            if decoder.is_done(&rest) {
                                return None;
                            }
                            return decoder
                                .parse_frame(&rest)
                                .map(|v| (Ok(v), (input, buf, decoder, true)));
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }
}

/// Convenience wrapper around [`SseDecoder::decode_stream`].
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, Value> {
    SseDecoder::new().decode_stream(input)
}

/// Collect a decoded stream, stopping at the first error.
pub async fn collect_values(mut s: BoxStream<'static, Value>) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    while let Some(item) = s.next().await {
        out.push(item?);
    }
    Ok(out)
}
