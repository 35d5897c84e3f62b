//! Streaming progress events emitted by every runner flavor.
//!
//! Grounded on `original_source/src/core/events.py`'s per-variant
//! dataclasses for field shapes, and on the teacher's status-enum style
//! (`src/internal/object/run.rs`) for documenting each transition inline
//! rather than in a separate design doc.
//!
//! # Ordering per run
//!
//! ```text
//! StageStarted ──▶ (Token | ToolCall)* ──▶ StageCompleted ──▶ ...
//!                                              │
//!                              HumanApprovalRequired
//!                                              │
//!                                     resume ──┴── cancel/Error
//! ```
//!
//! `Complete` or `Error` is always the final event of a logical
//! invocation (`SPEC_FULL.md` §8, property 6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged progress event. `#[serde(tag = "event_type", content = "data")]`
/// matches the wire shape in `SPEC_FULL.md` §6
/// (`{ "event_type": ..., "data": { ... } }`), with `timestamp` flattened
/// alongside by `ProgressEvent::to_frame`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Emitted before a pipeline stage begins.
    StageStarted {
        stage_name: String,
        index: u32,
        total: u32,
    },
    /// Emitted when a stage finishes successfully.
    StageCompleted {
        stage_name: String,
        index: u32,
        total: u32,
        details: serde_json::Map<String, Value>,
    },
    /// One delta from a streaming text generator. `is_first`/`is_last`
    /// delimit one contiguous response.
    Token {
        token: String,
        is_first: bool,
        is_last: bool,
    },
    /// The agent committed a tool invocation.
    ToolCall {
        tool_name: String,
        tool_id: String,
        arguments: Value,
    },
    /// The agent proposed an editable change (Editor Runner).
    PendingChange {
        change_id: String,
        change_type: String,
        change_data: Value,
    },
    /// Execution is paused awaiting a decision (Compiler Runner).
    HumanApprovalRequired {
        interrupt_id: String,
        tool_name: String,
        tool_args: Value,
        message: String,
    },
    /// Terminal or recoverable failure.
    Error {
        error_message: String,
        stage_name: Option<String>,
        recoverable: bool,
    },
    /// Terminal success.
    Complete {
        result: serde_json::Map<String, Value>,
        message: String,
    },
}

impl ProgressEvent {
    /// Whether this variant ends the event stream for a logical
    /// invocation (property 6: exactly one terminal event, and it's
    /// last).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    pub fn is_approval_request(&self) -> bool {
        matches!(self, ProgressEvent::HumanApprovalRequired { .. })
    }

    /// Wrap this event with a wall-clock timestamp for wire transmission,
    /// per `SPEC_FULL.md` §6's `{ event_type, timestamp, data }` frame.
    pub fn to_frame(&self, timestamp_secs: f64) -> EventFrame<'_> {
        EventFrame {
            event: self,
            timestamp: timestamp_secs,
        }
    }
}

/// A `ProgressEvent` plus the timestamp it was emitted at, serialized as
/// one flat JSON object: `{ event_type, timestamp, data }`.
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame<'a> {
    #[serde(flatten)]
    event: &'a ProgressEvent,
    timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_tagged_event_type_and_data() {
        let event = ProgressEvent::StageStarted {
            stage_name: "analyze".to_string(),
            index: 0,
            total: 3,
        };
        let json = serde_json::to_value(event.to_frame(1.5)).unwrap();
        assert_eq!(json["event_type"], "stage_started");
        assert_eq!(json["timestamp"], 1.5);
        assert_eq!(json["data"]["stage_name"], "analyze");
    }

    #[test]
    fn terminal_classification_matches_complete_and_error_only() {
        let complete = ProgressEvent::Complete {
            result: serde_json::Map::new(),
            message: "done".to_string(),
        };
        let error = ProgressEvent::Error {
            error_message: "boom".to_string(),
            stage_name: None,
            recoverable: false,
        };
        let token = ProgressEvent::Token {
            token: "x".to_string(),
            is_first: true,
            is_last: false,
        };
        assert!(complete.is_terminal());
        assert!(error.is_terminal());
        assert!(!token.is_terminal());
    }
}
