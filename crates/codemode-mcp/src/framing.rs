//! Lenient NDJSON framing for tool-server stdout.
//!
//! Tool-servers print diagnostics on the same stream as protocol traffic, so
//! every complete line is classified instead of being trusted as JSON-RPC.

use serde_json::Value;

use crate::protocol::{JsonRpcMessage, JsonRpcResponse};

/// Why a line was not treated as protocol traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Empty or whitespace-only line.
    Blank,
    /// Not parseable as JSON (log output, banners).
    NotJson,
    /// Valid JSON that is not a JSON-RPC response or message.
    NotRpc,
}

/// One classified line of tool-server output.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A response to one of our requests.
    Response(JsonRpcResponse),
    /// A server-originated notification or request.
    Message(JsonRpcMessage),
    /// Anything else.
    Ignorable(Ignored),
}

impl Frame {
    /// Classify a single line (without its trailing newline).
    pub fn parse(line: &str) -> Frame {
        let line = line.trim();
        if line.is_empty() {
            return Frame::Ignorable(Ignored::Blank);
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => return Frame::Ignorable(Ignored::NotJson),
        };

        let Some(object) = value.as_object() else {
            return Frame::Ignorable(Ignored::NotRpc);
        };

        if object.contains_key("method") {
            return match serde_json::from_value::<JsonRpcMessage>(value) {
                Ok(msg) => Frame::Message(msg),
                Err(_) => Frame::Ignorable(Ignored::NotRpc),
            };
        }

        let has_outcome = object.contains_key("result") || object.contains_key("error");
        if !has_outcome || !object.contains_key("id") {
            return Frame::Ignorable(Ignored::NotRpc);
        }

        match serde_json::from_value::<JsonRpcResponse>(value) {
            Ok(resp) if resp.id.is_some() => Frame::Response(resp),
            _ => Frame::Ignorable(Ignored::NotRpc),
        }
    }
}

/// Accumulates stdout chunks and yields frames for every complete line.
///
/// The trailing, possibly incomplete, fragment is retained until the next
/// chunk completes it.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the frames of all lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| Frame::parse(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Bytes received after the last newline.
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }
}
