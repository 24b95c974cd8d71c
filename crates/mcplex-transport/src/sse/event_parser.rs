//! A minimal incremental parser for `text/event-stream` blocks, used by
//! the SSE client to pull `event:`/`data:` pairs out of a byte stream
//! without depending on a full SSE client library (spec §4.2.2, §6).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Accumulates bytes and yields complete events as they appear. SSE
/// blocks are separated by a blank line (`\n\n`); within a block, each
/// `data:` line is joined with `\n` per the spec, and `event:` defaults to
/// `"message"` when absent.
#[derive(Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds new bytes in and drains every complete event currently
    /// buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}
