//! Stream decoder behavior over realistic agent responses.

mod common;

use bytes::Bytes;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{delta_line, text_line, tool_use_line, DONE};
use cortex_agent::error::AgentError;
use cortex_agent::provider::{decode, StreamDecoder};
use cortex_agent::types::{Delta, StreamChunk};

fn agent_response() -> String {
    format!(
        "event: message.delta\n{}: ping\n{}{}data: {{truncated\n{}{}",
        tool_use_line("toolu_a", "cortex_analyst_text_to_sql", "sales by region"),
        text_line("Sales by région: "),
        delta_line(json!([
            {"type": "tool_results", "tool_results": {"content": []}},
            {"type": "text", "text": "West leads."}
        ])),
        text_line(" 🎉"),
        DONE
    )
}

fn decode_all(body: &str, split: usize) -> (Vec<StreamChunk>, u64) {
    let mut decoder = StreamDecoder::new();
    let bytes = body.as_bytes();
    let mut chunks = decoder.feed(&bytes[..split]);
    chunks.extend(decoder.feed(&bytes[split..]));
    chunks.extend(decoder.finish());
    (chunks, decoder.stats().malformed)
}

fn text_of(chunks: &[StreamChunk]) -> String {
    chunks.iter().map(StreamChunk::text).collect()
}

#[test]
fn any_read_boundary_yields_the_same_chunks() {
    let body = agent_response();
    let (expected, malformed) = decode_all(&body, 0);

    assert_eq!(text_of(&expected), "Sales by région: West leads. 🎉");
    assert_eq!(malformed, 1);

    for split in 1..body.len() {
        let (chunks, malformed) = decode_all(&body, split);
        assert_eq!(chunks, expected, "split at byte {split}");
        assert_eq!(malformed, 1, "split at byte {split}");
    }
}

#[test]
fn server_side_tool_use_is_surfaced_first() {
    let (chunks, _) = decode_all(&agent_response(), 0);
    match &chunks[0].deltas[0] {
        Delta::ToolUse(tool_use) => assert_eq!(tool_use.name, "cortex_analyst_text_to_sql"),
        other => panic!("expected tool_use, got {other:?}"),
    }
}

#[tokio::test]
async fn decode_stream_over_many_small_reads() {
    let body = agent_response();
    let parts: Vec<Result<Bytes, AgentError>> = body
        .as_bytes()
        .chunks(7)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let chunks: Vec<StreamChunk> = decode(futures::stream::iter(parts))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(text_of(&chunks), "Sales by région: West leads. 🎉");
}

#[tokio::test]
async fn decode_stream_stops_at_sentinel() {
    let body = format!("{}{}{}", text_line("kept"), DONE, text_line("after"));
    let parts: Vec<Result<Bytes, AgentError>> = vec![Ok(Bytes::from(body))];

    let chunks: Vec<StreamChunk> = decode(futures::stream::iter(parts))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(text_of(&chunks), "kept");
}
