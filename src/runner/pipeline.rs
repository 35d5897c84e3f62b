//! Pipeline Runner: drives a fixed staged pipeline to completion. No
//! HITL, no follow-up messages.
//!
//! Grounded on `original_source/src/core/runners.py`'s
//! `VideoManualRunner.run()`.

use serde_json::{Map, Value};

use crate::events::ProgressEvent;
use crate::pipeline::StagedPipeline;
use crate::runner::bridge::{EventSender, RunnerBridge};
use crate::runner::EventStream;

pub struct PipelineRunner {
    user_id: String,
}

impl PipelineRunner {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Start the pipeline on a worker thread, emitting `StageStarted` for
    /// the first stage before invoking the executor (since the executor
    /// only reports updates at stage completion), then mapping each
    /// update to `StageCompleted` + the next stage's `StageStarted`.
    pub fn run(&self, mut pipeline: Box<dyn StagedPipeline>) -> EventStream {
        let (bridge, stream) = RunnerBridge::spawn(256, move |tx: EventSender| {
            let stages = pipeline.stage_names();
            let total = stages.len() as u32;

            if let Some(first) = stages.first() {
                tx.send(ProgressEvent::StageStarted {
                    stage_name: first.to_string(),
                    index: 0,
                    total,
                });
            }

            let mut completed_index = 0u32;
            let result = pipeline.run(&mut |update| {
                tx.send(ProgressEvent::StageCompleted {
                    stage_name: update.stage_name.clone(),
                    index: completed_index,
                    total,
                    details: update.details,
                });
                completed_index += 1;
                if let Some(next_stage) = stages.get(completed_index as usize) {
                    tx.send(ProgressEvent::StageStarted {
                        stage_name: next_stage.to_string(),
                        index: completed_index,
                        total,
                    });
                }
            });

            match result {
                Ok(outcome) => {
                    let mut result_map = Map::new();
                    result_map.insert("doc_id".to_string(), Value::String(outcome.doc_id));
                    result_map.insert("doc_path".to_string(), Value::String(outcome.doc_path));
                    result_map.insert(
                        "screenshots".to_string(),
                        Value::Array(outcome.screenshots.into_iter().map(Value::String).collect()),
                    );
                    result_map.insert("output_dir".to_string(), Value::String(outcome.output_dir));
                    tx.send(ProgressEvent::Complete {
                        result: result_map,
                        message: "pipeline finished".to_string(),
                    });
                }
                Err(err) => {
                    tx.send(ProgressEvent::Error {
                        error_message: err.to_string(),
                        stage_name: None,
                        recoverable: false,
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
    use crate::errors::Result;
    use crate::pipeline::{PipelineOutcome, StageUpdate};
    use futures_util::StreamExt;

    struct FakePipeline;

    impl StagedPipeline for FakePipeline {
        fn run(&mut self, on_update: &mut dyn FnMut(StageUpdate)) -> Result<PipelineOutcome> {
            for stage in self.stage_names() {
                on_update(StageUpdate {
                    stage_name: stage.to_string(),
                    details: Map::new(),
                });
            }
            Ok(PipelineOutcome {
                doc_id: "doc-1".to_string(),
                doc_path: "/docs/doc-1".to_string(),
                screenshots: vec!["x.png".to_string()],
                output_dir: "/docs/doc-1".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn emits_staged_events_then_complete() {
        let runner = PipelineRunner::new("alice");
        let mut stream = runner.run(Box::new(FakePipeline));

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert!(matches!(&events[0], ProgressEvent::StageStarted { stage_name, .. } if stage_name == "analyze"));
        assert!(events.last().unwrap().is_terminal());
        assert!(matches!(events.last().unwrap(), ProgressEvent::Complete { .. }));
    }
}
