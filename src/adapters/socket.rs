//! Streaming-socket adapter: frames each `ProgressEvent` as one JSON
//! message over an `axum` WebSocket and parses the client's `decision`/
//! `message` frames (`SPEC_FULL.md` §6). Grounded on the teacher's
//! `axum` dependency (already pulled in with the `ws` feature) — there is
//! no Rust WebSocket precedent elsewhere in the pack, so the handler
//! shape follows `original_source/src/api/websockets/*.py`'s framing
//! contract rather than any Rust file.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::events::ProgressEvent;
use crate::runner::{Decision, EventStream};
use crate::runner::editor::TextSelection;

/// One inbound frame from the client, per the two shapes `SPEC_FULL.md`
/// §6 defines: a HITL decision, or a conversational follow-up message.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    Decision {
        approved: bool,
        #[serde(default)]
        modified_args: Option<Value>,
        #[serde(default)]
        feedback: Option<String>,
    },
    Message {
        content: String,
        #[serde(default)]
        selection: Option<ClientSelection>,
        #[serde(default)]
        document_content: Option<String>,
        #[serde(default)]
        image: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ClientSelection {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl From<ClientSelection> for TextSelection {
    fn from(value: ClientSelection) -> Self {
        TextSelection {
            text: value.text,
            start_offset: value.start_offset,
            end_offset: value.end_offset,
        }
    }
}

impl ClientFrame {
    /// `None` if this frame isn't a decision (a conversational `message`
    /// frame arriving while the caller expects a decision is a protocol
    /// error the Compiler Runner itself will raise).
    pub fn into_decision(self) -> Option<Decision> {
        match self {
            ClientFrame::Decision {
                approved,
                modified_args,
                feedback,
            } => Some(Decision {
                approved,
                modified_args,
                feedback,
            }),
            ClientFrame::Message { .. } => None,
        }
    }
}

/// Read and parse the next client frame, skipping ping/pong control
/// frames transparently. Returns `None` on socket close, a protocol
/// violation (non-text frame, malformed JSON), or disconnect.
pub async fn read_client_frame(socket: &mut WebSocket) -> Option<ClientFrame> {
    loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                Ok(frame) => return Some(frame),
                Err(err) => {
                    warn!(error = %err, "malformed client frame");
                    return None;
                }
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "websocket recv failed");
                return None;
            }
        }
    }
}

/// Drain a runner's event stream into the socket, one JSON frame per
/// event, closing the connection once a terminal event has been sent
/// (`SPEC_FULL.md` §6: "the server closes the stream after Complete or
/// Error").
pub async fn forward_events(socket: &mut WebSocket, mut stream: EventStream) {
    let started_at = Instant::now();
    while let Some(event) = stream.next().await {
        let frame = event.to_frame(started_at.elapsed().as_secs_f64());
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize progress event");
                break;
            }
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            // Consumer disconnected; the background thread is allowed to
            // run to its next checkpoint before the stream is dropped
            // (`SPEC_FULL.md` §5 cancellation semantics).
            break;
        }
        if matches!(event, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }) {
            break;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
