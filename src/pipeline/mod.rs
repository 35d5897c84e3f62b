//! The Staged Pipeline Graph: an external collaborator (the LLM-driven
//! video analysis itself is explicitly out of scope, spec.md §1) exposed
//! here only as the trait boundary the Pipeline Runner drives.
//!
//! The executor is synchronous and only emits an update *after* a stage
//! finishes — the runner is responsible for emitting `StageStarted`
//! before invoking it and translating each update into
//! `StageCompleted`/next `StageStarted` (spec.md §4.7).

use serde_json::{Map, Value};

use crate::errors::Result;

/// The fixed stage order for the video-documentation pipeline
/// (spec.md §4.7).
pub const VIDEO_DOC_STAGES: [&str; 3] = ["analyze", "identify_keyframes", "generate"];

/// One stage's completion, as the executor reports it.
#[derive(Debug, Clone)]
pub struct StageUpdate {
    pub stage_name: String,
    pub details: Map<String, Value>,
}

/// The executor's final output once every stage has completed.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub doc_id: String,
    pub doc_path: String,
    pub screenshots: Vec<String>,
    pub output_dir: String,
}

/// A staged pipeline an external executor implements. `run` is called on
/// a dedicated worker thread (see `runner::bridge`) and blocks until the
/// whole pipeline completes, reporting one `StageUpdate` per finished
/// stage through `on_update`.
pub trait StagedPipeline: Send {
    fn stage_names(&self) -> &'static [&'static str] {
        &VIDEO_DOC_STAGES
    }

    fn run(&mut self, on_update: &mut dyn FnMut(StageUpdate)) -> Result<PipelineOutcome>;
}
