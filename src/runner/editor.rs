//! Editor Runner: a conversational agent that edits a single document in
//! place. Streams tokens, proposes changes as `PendingChange` events, and
//! optionally takes a screenshot attachment as a vision input.
//!
//! Grounded on `original_source/src/core/runners.py`'s `ManualEditorRunner`
//! for the `emitted_change_ids` dedup set, the 5 MiB image-size check, and
//! the offset-to-line-number conversion for text selections.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use serde_json::Value;

use crate::errors::{DocsError, Result};
use crate::events::ProgressEvent;
use crate::runner::bridge::{EventSender, RunnerBridge};
use crate::runner::EventStream;

const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// A caller-supplied text selection, as character offsets into the
/// document the caller believes is current.
#[derive(Debug, Clone)]
pub struct TextSelection {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// The same selection, converted to 1-based line numbers for the agent.
#[derive(Debug, Clone)]
pub struct LineSelection {
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
}

fn line_of(document: &str, byte_offset: usize) -> u32 {
    let clamped = byte_offset.min(document.len());
    document.as_bytes()[..clamped].iter().filter(|b| **b == b'\n').count() as u32 + 1
}

fn offsets_to_lines(document: &str, selection: TextSelection) -> LineSelection {
    LineSelection {
        start_line: line_of(document, selection.start_offset),
        end_line: line_of(document, selection.end_offset),
        text: selection.text,
    }
}

/// A screenshot, fetched and base64-encoded, ready to hand to the agent
/// as a vision input.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub base64_data: String,
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        _ => "image/png",
    }
}

fn resolve_image(path: &Path) -> Result<ImageAttachment> {
    let metadata = std::fs::metadata(path).map_err(|_| DocsError::NotFound(format!("screenshot not found: {}", path.display())))?;
    if metadata.len() > MAX_IMAGE_BYTES {
        return Err(DocsError::InvalidInput(format!(
            "image {} exceeds the 5 MiB attachment limit ({} bytes)",
            path.display(),
            metadata.len()
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(ImageAttachment {
        media_type: media_type_for(path).to_string(),
        base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

/// One raw tool result for a text-mutation tool, as the agent framework
/// reports it. The same logical change may arrive twice (once per
/// delivery channel); the runner, not the agent, is responsible for
/// deduping on `change_id`.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub change_id: String,
    pub change_type: String,
    pub change_data: Value,
}

/// The conversational agent itself — out of scope as a model
/// (spec.md §1); the runner only needs this boundary to drive it.
pub trait EditorAgent: Send {
    fn send_message(
        &mut self,
        text: &str,
        selection: Option<LineSelection>,
        document_content: &str,
        image: Option<ImageAttachment>,
        on_event: &mut dyn FnMut(ProgressEvent),
    ) -> Result<Vec<ToolResult>>;
}

pub struct EditorRunner {
    user_id: String,
    screenshots_dir: PathBuf,
    agent: Arc<Mutex<Box<dyn EditorAgent>>>,
    document_content: Arc<Mutex<Option<String>>>,
    emitted_change_ids: Arc<Mutex<HashSet<String>>>,
}

impl EditorRunner {
    pub fn new(user_id: impl Into<String>, screenshots_dir: impl Into<PathBuf>, agent: Box<dyn EditorAgent>) -> Self {
        Self {
            user_id: user_id.into(),
            screenshots_dir: screenshots_dir.into(),
            agent: Arc::new(Mutex::new(agent)),
            document_content: Arc::new(Mutex::new(None)),
            emitted_change_ids: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Idempotent after the first call for this runner instance — a
    /// second `start` on an already-initialized session is a no-op
    /// rather than clobbering any edits already cached.
    pub fn start(&self, document_content: String) {
        let mut cached = self.document_content.lock().unwrap();
        if cached.is_none() {
            *cached = Some(document_content);
        }
    }

    /// `document_content`, when given, replaces the cached document as
    /// the authoritative current state before this turn runs — the
    /// agent must never operate on a stale version.
    pub fn send_message(
        &self,
        text: String,
        selection: Option<TextSelection>,
        document_content: Option<String>,
        image_filename: Option<String>,
    ) -> EventStream {
        if let Some(fresh) = document_content {
            *self.document_content.lock().unwrap() = Some(fresh);
        }
        let current_doc = self.document_content.lock().unwrap().clone().unwrap_or_default();
        let line_selection = selection.map(|sel| offsets_to_lines(&current_doc, sel));

        let image = match image_filename {
            None => Ok(None),
            Some(filename) => resolve_image(&self.screenshots_dir.join(&filename)).map(Some),
        };

        let image = match image {
            Ok(image) => image,
            Err(err) => {
                let (bridge, stream) = RunnerBridge::spawn(4, move |tx: EventSender| {
                    tx.send(ProgressEvent::Error {
                        error_message: err.to_string(),
                        stage_name: None,
                        recoverable: true,
                    });
                });
                return EventStream::new(bridge, stream);
            }
        };

        let agent = self.agent.clone();
        let emitted = self.emitted_change_ids.clone();
        let (bridge, stream) = RunnerBridge::spawn(256, move |tx: EventSender| {
            let mut agent = agent.lock().unwrap();
            let mut emit = |event: ProgressEvent| {
                tx.send(event);
            };
            match agent.send_message(&text, line_selection, &current_doc, image, &mut emit) {
                Ok(tool_results) => {
                    let mut seen = emitted.lock().unwrap();
                    for result in tool_results {
                        if seen.insert(result.change_id.clone()) {
                            tx.send(ProgressEvent::PendingChange {
                                change_id: result.change_id,
                                change_type: result.change_type,
                                change_data: result.change_data,
                            });
                        }
                    }
                    tx.send(ProgressEvent::Complete {
                        result: serde_json::Map::new(),
                        message: "turn finished".to_string(),
                    });
                }
                Err(err) => {
                    tx.send(ProgressEvent::Error {
                        error_message: err.to_string(),
                        stage_name: None,
                        recoverable: err.is_recoverable(),
                    });
                }
            }
        });
        EventStream::new(bridge, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    struct EchoingAgent {
        duplicate_next: bool,
    }

    impl EditorAgent for EchoingAgent {
        fn send_message(
            &mut self,
            _text: &str,
            _selection: Option<LineSelection>,
            _document_content: &str,
            _image: Option<ImageAttachment>,
            on_event: &mut dyn FnMut(ProgressEvent),
        ) -> Result<Vec<ToolResult>> {
            on_event(ProgressEvent::Token {
                token: "editing".to_string(),
                is_first: true,
                is_last: true,
            });
            let result = ToolResult {
                change_id: "change-1".to_string(),
                change_type: "replace_text".to_string(),
                change_data: serde_json::json!({"from": "A", "to": "B"}),
            };
            if self.duplicate_next {
                Ok(vec![result.clone(), result])
            } else {
                Ok(vec![result])
            }
        }
    }

    async fn drain(mut stream: EventStream) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn duplicate_tool_result_yields_single_pending_change() {
        let dir = TempDir::new().unwrap();
        let runner = EditorRunner::new("alice", dir.path(), Box::new(EchoingAgent { duplicate_next: true }));
        runner.start("# A".to_string());

        let events = drain(runner.send_message("fix it".to_string(), None, None, None)).await;
        let pending: Vec<_> = events.iter().filter(|e| matches!(e, ProgressEvent::PendingChange { .. })).collect();
        assert_eq!(pending.len(), 1, "duplicate change_id must be deduped within one turn");
        assert!(matches!(events.last().unwrap(), ProgressEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn same_change_id_across_turns_is_deduped_matching_scenario_s6() {
        let dir = TempDir::new().unwrap();
        let runner = EditorRunner::new("alice", dir.path(), Box::new(EchoingAgent { duplicate_next: false }));
        runner.start("# A".to_string());

        drain(runner.send_message("fix it".to_string(), None, None, None)).await;
        let second = drain(runner.send_message("do it again".to_string(), None, None, None)).await;
        let pending: Vec<_> = second.iter().filter(|e| matches!(e, ProgressEvent::PendingChange { .. })).collect();
        assert!(pending.is_empty(), "change_id already emitted this session must not repeat");
    }

    #[tokio::test]
    async fn oversize_image_is_rejected_without_invoking_agent() {
        let dir = TempDir::new().unwrap();
        let big = vec![0u8; (MAX_IMAGE_BYTES + 1) as usize];
        std::fs::write(dir.path().join("big.png"), &big).unwrap();

        let runner = EditorRunner::new("alice", dir.path(), Box::new(EchoingAgent { duplicate_next: false }));
        runner.start("# A".to_string());
        let events = drain(runner.send_message("caption this".to_string(), None, None, Some("big.png".to_string()))).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Error { recoverable: true, .. }));
    }

    #[test]
    fn offsets_convert_to_one_based_line_numbers() {
        let doc = "line1\nline2\nline3";
        let selection = TextSelection {
            text: "line2".to_string(),
            start_offset: 6,
            end_offset: 11,
        };
        let converted = offsets_to_lines(doc, selection);
        assert_eq!(converted.start_line, 2);
        assert_eq!(converted.end_line, 2);
    }
}
