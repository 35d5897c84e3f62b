//! Job registry row shape, grounded on
//! `original_source/src/db/job_storage.py`'s SQLite schema. Persisted via
//! `sea_orm` in `store::job_registry` rather than hand-rolled SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub user_id: String,
    pub video_name: String,
    pub doc_id: Option<String>,
    pub status: JobStatus,
    pub current_stage: Option<String>,
    pub stage_index: i32,
    pub total_stages: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub seen: bool,
}

impl JobRecord {
    pub fn new(user_id: impl Into<String>, video_name: impl Into<String>, total_stages: i32) -> Self {
        Self {
            job_id: Uuid::now_v7(),
            user_id: user_id.into(),
            video_name: video_name.into(),
            doc_id: None,
            status: JobStatus::Pending,
            current_stage: None,
            stage_index: 0,
            total_stages,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            seen: false,
        }
    }
}
