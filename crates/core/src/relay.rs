use crate::models::Citation;
use crate::traits::CompletionByteStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// One discrete, typed message on the caller-facing event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Token { text: String },
    Sources { items: Vec<Citation> },
    Error { message: String },
    Done,
}

/// Prefix marking the upstream lines the relay inspects; everything else is
/// keep-alive noise and is ignored.
const EVENT_PREFIX: &str = "data:";

/// Payload value that terminates the upstream stream.
const TERMINATION_SENTINEL: &str = "[DONE]";

enum StreamEnd {
    Sentinel,
    UpstreamClosed,
    Transport(String),
    ReceiverGone,
}

/// Relays one completion byte stream to the caller as typed frames.
///
/// Token deltas are forwarded as they arrive; the citation manifest is held
/// back until the termination sentinel and dropped when the upstream closes
/// without one. Exactly one done frame is emitted on every path.
pub struct CompletionRelay {
    citations: Vec<Citation>,
}

impl CompletionRelay {
    pub fn new(citations: Vec<Citation>) -> Self {
        Self { citations }
    }

    /// Drives the upstream stream to completion.
    ///
    /// When the receiver is already gone the terminal frame is still
    /// attempted and its failure swallowed; a dead receiver also stops the
    /// upstream read loop, releasing the upstream connection.
    pub async fn run(self, upstream: CompletionByteStream, tx: &mpsc::Sender<Frame>) {
        match pump(upstream, tx).await {
            StreamEnd::Sentinel => {
                let _ = tx
                    .send(Frame::Sources {
                        items: self.citations,
                    })
                    .await;
            }
            StreamEnd::Transport(message) => {
                let _ = tx.send(Frame::Error { message }).await;
            }
            // Upstream closed without the sentinel: citations are dropped.
            StreamEnd::UpstreamClosed => {}
            StreamEnd::ReceiverGone => {}
        }
        let _ = tx.send(Frame::Done).await;
    }
}

async fn pump(mut upstream: CompletionByteStream, tx: &mpsc::Sender<Frame>) -> StreamEnd {
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => return StreamEnd::Transport(error.to_string()),
        };

        buffer.extend_from_slice(&chunk);

        // Incomplete trailing lines stay buffered across reads.
        while let Some(newline) = buffer.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let trimmed = line.trim();

            let payload = match trimmed.strip_prefix(EVENT_PREFIX) {
                Some(rest) => rest.trim(),
                None => continue,
            };

            if payload == TERMINATION_SENTINEL {
                return StreamEnd::Sentinel;
            }

            // Lines that fail to parse or carry no delta are tolerated, not
            // treated as errors.
            let parsed: Value = match serde_json::from_str(payload) {
                Ok(value) => value,
                Err(_) => continue,
            };
            let delta = match parsed
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
            {
                Some(delta) if !delta.is_empty() => delta.to_string(),
                _ => continue,
            };

            if tx.send(Frame::Token { text: delta }).await.is_err() {
                return StreamEnd::ReceiverGone;
            }
        }
    }

    StreamEnd::UpstreamClosed
}
