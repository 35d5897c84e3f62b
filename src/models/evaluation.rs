//! Evaluation records: ad-hoc scored assessments attached to a specific
//! document version, per `SPEC_FULL.md` §4.4 and grounded on
//! `original_source/src/storage/version_storage.py`'s
//! `save_evaluation`/`get_evaluation`/`list_evaluations`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::Version;

/// A single evaluation run against a document version. `payload` is kept
/// as an open `Value` bag rather than a fixed struct because the caller
/// supplies whatever evaluation shape it wants (rubric scores, free-form
/// notes, etc.) — only the indexing fields below are load-bearing for the
/// store itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationRecord {
    pub version: Version,
    pub language: String,
    pub stored_at: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl EvaluationRecord {
    pub fn new(version: Version, language: impl Into<String>, payload: serde_json::Map<String, Value>) -> Self {
        Self {
            version,
            language: language.into(),
            stored_at: crate::utils::now_iso(),
            payload,
        }
    }

    /// Convenience accessor for the `overall_score` key callers commonly
    /// stash in `payload`; summaries (e.g. `list_evaluations`) surface it
    /// without making it a first-class schema field.
    pub fn overall_score(&self) -> Option<i64> {
        self.payload.get("overall_score").and_then(Value::as_i64)
    }
}
