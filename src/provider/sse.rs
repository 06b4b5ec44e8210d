//! Incremental decoder for the agent's server-sent event stream.
//!
//! The body is a sequence of `data: <json>` lines ending in `data: [DONE]` or
//! EOF. Each payload is one of two record shapes:
//!
//! ```text
//! {"type": "text", "text": "..."}
//! {"delta": {"role": "assistant", "content": [{"type": "text", ...}, {"type": "tool_use", ...}]}}
//! ```
//!
//! Both are normalized into a [`StreamChunk`]. Anything else is counted and
//! skipped; a payload that fails to parse is logged and skipped.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::types::{DecodeStats, Delta, Role, StreamChunk, ToolUse};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Payload of a single `data:` line.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireChunk {
    Text(TextRecord),
    Delta(DeltaRecord),
    Unrecognized(IgnoredAny),
}

#[derive(Deserialize)]
struct TextRecord {
    #[serde(rename = "type")]
    _kind: TextTag,
    text: String,
}

#[derive(Deserialize)]
enum TextTag {
    #[serde(rename = "text")]
    Text,
}

#[derive(Deserialize)]
struct DeltaRecord {
    delta: DeltaBody,
}

#[derive(Deserialize)]
struct DeltaBody {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text { text: String },
    ToolUse { tool_use: ToolUse },
    #[serde(other)]
    Other,
}

/// Decoder for one HTTP response body. Not reusable across calls.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    stats: DecodeStats,
    finished: bool,
    recent: VecDeque<String>,
    recent_capacity: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the last `capacity` raw payloads for inspection.
    pub fn with_debug_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Drain the retained raw payloads, oldest first.
    pub fn take_recent(&mut self) -> Vec<String> {
        self.recent.drain(..).collect()
    }

    /// Feed raw body bytes; returns every chunk completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(chunk) = self.decode_line(&line) {
                chunks.push(chunk);
            }
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        chunks
    }

    /// Flush a trailing line that had no newline before EOF.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        if self.finished || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        self.decode_line(&line).into_iter().collect()
    }

    /// Decode a single line. Returns `None` for comments, keep-alives, the
    /// sentinel, malformed payloads and unrecognized shapes.
    pub fn decode_line(&mut self, line: &str) -> Option<StreamChunk> {
        if self.finished {
            return None;
        }
        let line = line.trim();
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_SENTINEL {
            debug!("agent stream: [DONE]");
            self.finished = true;
            self.stats.saw_done = true;
            return None;
        }

        self.remember(payload);

        let wire: WireChunk = match serde_json::from_str(payload) {
            Ok(wire) => wire,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, payload = %payload, "skipping malformed stream chunk");
                return None;
            }
        };

        let chunk = match wire {
            WireChunk::Text(record) => StreamChunk {
                role: None,
                deltas: vec![Delta::Text(record.text)],
            },
            WireChunk::Delta(record) => self.normalize_delta(record.delta),
            WireChunk::Unrecognized(_) => {
                self.stats.ignored += 1;
                debug!(payload = %payload, "ignoring unrecognized stream chunk");
                return None;
            }
        };

        self.stats.chunks += 1;
        Some(chunk)
    }

    fn normalize_delta(&mut self, body: DeltaBody) -> StreamChunk {
        let role = body.role.as_deref().and_then(|r| r.parse::<Role>().ok());
        let mut deltas = Vec::with_capacity(body.content.len());

        for item in body.content {
            match serde_json::from_value::<WireContent>(item) {
                Ok(WireContent::Text { text }) => deltas.push(Delta::Text(text)),
                Ok(WireContent::ToolUse { tool_use }) => {
                    debug!(tool_use_id = %tool_use.tool_use_id, name = %tool_use.name, "tool_use delta");
                    deltas.push(Delta::ToolUse(tool_use));
                }
                Ok(WireContent::Other) => {}
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!(error = %e, "skipping malformed delta content item");
                }
            }
        }

        StreamChunk { role, deltas }
    }

    fn remember(&mut self, payload: &str) {
        if self.recent_capacity == 0 {
            return;
        }
        if self.recent.len() == self.recent_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(payload.to_string());
    }
}

/// Lazily decode a response body stream into chunks.
///
/// Stats-free adapter for callers that only want the chunks. Counters and
/// recent payloads stay inside the adapter; drive a [`StreamDecoder`]
/// directly (as `AgentSession` does) when those are needed.
///
/// Transport errors from the body are forwarded and end the stream.
pub fn decode<S>(body: S) -> impl Stream<Item = Result<StreamChunk, AgentError>>
where
    S: Stream<Item = Result<Bytes, AgentError>> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = StreamDecoder::new();
        let mut failed = false;
        futures::pin_mut!(body);

        while let Some(next) = body.next().await {
            match next {
                Ok(bytes) => {
                    for chunk in decoder.feed(&bytes) {
                        yield Ok(chunk);
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }

        if !failed {
            for chunk in decoder.finish() {
                yield Ok(chunk);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text_line(text: &str) -> String {
        format!(
            "data: {}\n",
            json!({"delta": {"role": "assistant", "content": [{"type": "text", "text": text}]}})
        )
    }

    fn texts(chunks: &[StreamChunk]) -> Vec<String> {
        chunks.iter().map(StreamChunk::text).collect()
    }

    #[test]
    fn decodes_text_deltas_until_done() {
        let body = format!(
            "{}{}data: [DONE]\n",
            text_line("Total "),
            text_line("sales by category: ...")
        );
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(texts(&chunks), vec!["Total ", "sales by category: ..."]);
        assert_eq!(chunks[0].role, Some(Role::Assistant));
        assert!(decoder.is_finished());
        assert!(decoder.stats().saw_done);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let body = format!(
            "{}data: {{not json\n{}data: [DONE]\n",
            text_line("a"),
            text_line("b")
        );
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(texts(&chunks), vec!["a", "b"]);
        assert_eq!(decoder.stats().malformed, 1);
        assert_eq!(decoder.stats().chunks, 2);
    }

    #[test]
    fn top_level_text_record_is_normalized() {
        let mut decoder = StreamDecoder::new();
        let chunk = decoder
            .decode_line(r#"data: {"type": "text", "text": "hello"}"#)
            .unwrap();

        assert_eq!(chunk.deltas, vec![Delta::Text("hello".to_string())]);
        assert_eq!(chunk.role, None);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let body = format!(": keep-alive\nevent: message.delta\n\n{}", text_line("x"));
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(texts(&chunks), vec!["x"]);
        assert_eq!(decoder.stats().malformed, 0);
    }

    #[test]
    fn sentinel_stops_decoding_early() {
        let body = format!("{}data: [DONE]\n{}", text_line("kept"), text_line("dropped"));
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(texts(&chunks), vec!["kept"]);
        assert!(decoder.feed(text_line("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn lines_split_across_reads_are_reassembled() {
        let line = text_line("héllo wörld");
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&bytes[..split]).is_empty());
        let chunks = decoder.feed(&bytes[split..]);

        assert_eq!(texts(&chunks), vec!["héllo wörld"]);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let body = "data: {\"type\": \"text\", \"text\": \"a\"}\r\ndata: [DONE]\r\n";
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(texts(&chunks), vec!["a"]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder
            .feed(br#"data: {"type": "text", "text": "tail"}"#)
            .is_empty());
        let chunks = decoder.finish();

        assert_eq!(texts(&chunks), vec!["tail"]);
        assert!(!decoder.stats().saw_done);
    }

    #[test]
    fn tool_use_is_surfaced_as_its_own_delta() {
        let line = format!(
            "data: {}\n",
            json!({"delta": {"content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "tool_use": {
                    "tool_use_id": "toolu_1",
                    "name": "sql_exec",
                    "input": {"query": "SELECT 1"}
                }}
            ]}})
        );
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(line.as_bytes());

        assert_eq!(chunks.len(), 1);
        match &chunks[0].deltas[1] {
            Delta::ToolUse(tool_use) => {
                assert_eq!(tool_use.tool_use_id, "toolu_1");
                assert_eq!(tool_use.query(), Some("SELECT 1"));
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn unknown_shapes_and_items_are_ignored() {
        let body = format!(
            "data: {}\ndata: {}\n",
            json!({"object": "message.status", "status": "planning"}),
            json!({"delta": {"content": [{"type": "tool_results", "tool_results": {}}]}})
        );
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(body.as_bytes());

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].deltas.is_empty());
        assert_eq!(decoder.stats().ignored, 1);
        assert_eq!(decoder.stats().malformed, 0);
    }

    #[test]
    fn malformed_tool_use_item_is_counted() {
        let line = format!(
            "data: {}\n",
            json!({"delta": {"content": [
                {"type": "tool_use", "tool_use": {"name": "sql_exec"}},
                {"type": "text", "text": "still here"}
            ]}})
        );
        let mut decoder = StreamDecoder::new();
        let chunks = decoder.feed(line.as_bytes());

        assert_eq!(texts(&chunks), vec!["still here"]);
        assert_eq!(decoder.stats().malformed, 1);
    }

    #[test]
    fn debug_capacity_bounds_retained_payloads() {
        let body = format!("{}{}{}", text_line("1"), text_line("2"), text_line("3"));
        let mut decoder = StreamDecoder::new().with_debug_capacity(2);
        decoder.feed(body.as_bytes());

        let recent = decoder.take_recent();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].contains("\"2\""));
        assert!(recent[1].contains("\"3\""));
    }

    #[tokio::test]
    async fn decode_stream_yields_lazily_and_forwards_errors() {
        let parts: Vec<Result<Bytes, AgentError>> = vec![
            Ok(Bytes::from(text_line("a"))),
            Err(AgentError::Timeout(10)),
            Ok(Bytes::from(text_line("never"))),
        ];
        let items: Vec<_> = decode(futures::stream::iter(parts)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text(), "a");
        assert!(matches!(items[1], Err(AgentError::Timeout(10))));
    }
}
