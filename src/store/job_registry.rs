//! Persistent job registry backed by `sea-orm`/SQLite, so adapters can
//! surface notifications for background work that outlives a single
//! session.
//!
//! Grounded on `original_source/src/db/job_storage.py` for the field
//! whitelist and query shapes; implemented with short transactions
//! (`SPEC_FULL.md` §5, §4.8) rather than the original's bare SQLite
//! connection-per-call style.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::errors::{DocsError, Result};
use crate::models::job::{JobRecord, JobStatus};
use crate::store::entity::job::{ActiveModel, Column, Entity as JobEntity, Model};

pub struct JobRegistry {
    db: DatabaseConnection,
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Complete => "complete",
        JobStatus::Error => "error",
    }
}

fn parse_status(raw: &str) -> JobStatus {
    match raw {
        "processing" => JobStatus::Processing,
        "complete" => JobStatus::Complete,
        "error" => JobStatus::Error,
        _ => JobStatus::Pending,
    }
}

fn model_to_record(model: Model) -> JobRecord {
    JobRecord {
        job_id: model.job_id,
        user_id: model.user_id,
        video_name: model.video_name,
        doc_id: model.doc_id,
        status: parse_status(&model.status),
        current_stage: model.current_stage,
        stage_index: model.stage_index,
        total_stages: model.total_stages,
        started_at: model.started_at,
        completed_at: model.completed_at,
        error: model.error,
        seen: model.seen,
    }
}

/// Whitelisted fields `update` may touch, mirroring `job_storage.py`'s
/// `update_job` whitelist exactly.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub current_stage: Option<Option<String>>,
    pub stage_index: Option<i32>,
    pub total_stages: Option<i32>,
    pub doc_id: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub seen: Option<bool>,
}

impl JobRegistry {
    pub async fn connect(sqlite_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = sqlite_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite://{}?mode=rwc", sqlite_path.display());
        let opts = ConnectOptions::new(url);
        let db = Database::connect(opts).await?;
        let registry = Self { db };
        registry.migrate().await?;
        Ok(registry)
    }

    async fn migrate(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let stmt = sea_orm::Statement::from_string(
            backend,
            "CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                video_name TEXT NOT NULL,
                doc_id TEXT,
                status TEXT NOT NULL,
                current_stage TEXT,
                stage_index INTEGER NOT NULL,
                total_stages INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error TEXT,
                seen BOOLEAN NOT NULL
            )"
            .to_string(),
        );
        self.db.execute(stmt).await?;
        Ok(())
    }

    pub async fn create(&self, user_id: &str, video_name: &str, total_stages: i32) -> Result<Uuid> {
        let record = JobRecord::new(user_id, video_name, total_stages);
        let job_id = record.job_id;
        let active = ActiveModel {
            job_id: Set(record.job_id),
            user_id: Set(record.user_id),
            video_name: Set(record.video_name),
            doc_id: Set(record.doc_id),
            status: Set(status_str(record.status).to_string()),
            current_stage: Set(record.current_stage),
            stage_index: Set(record.stage_index),
            total_stages: Set(record.total_stages),
            started_at: Set(record.started_at),
            completed_at: Set(record.completed_at),
            error: Set(record.error),
            seen: Set(record.seen),
        };
        let txn = self.db.begin().await?;
        active.insert(&txn).await?;
        txn.commit().await?;
        Ok(job_id)
    }

    pub async fn update(&self, job_id: Uuid, patch: JobPatch) -> Result<()> {
        let txn = self.db.begin().await?;
        let model = JobEntity::find_by_id(job_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DocsError::NotFound(format!("job `{job_id}` does not exist")))?;
        let mut active: ActiveModel = model.into();

        if let Some(status) = patch.status {
            active.status = Set(status_str(status).to_string());
        }
        if let Some(stage) = patch.current_stage {
            active.current_stage = Set(stage);
        }
        if let Some(index) = patch.stage_index {
            active.stage_index = Set(index);
        }
        if let Some(total) = patch.total_stages {
            active.total_stages = Set(total);
        }
        if let Some(doc_id) = patch.doc_id {
            active.doc_id = Set(doc_id);
        }
        if let Some(error) = patch.error {
            active.error = Set(error);
        }
        if let Some(completed_at) = patch.completed_at {
            active.completed_at = Set(completed_at);
        }
        if let Some(seen) = patch.seen {
            active.seen = Set(seen);
        }

        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn mark_complete(&self, job_id: Uuid, doc_id: &str) -> Result<()> {
        self.update(
            job_id,
            JobPatch {
                status: Some(JobStatus::Complete),
                doc_id: Some(Some(doc_id.to_string())),
                completed_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn mark_error(&self, job_id: Uuid, message: &str) -> Result<()> {
        self.update(
            job_id,
            JobPatch {
                status: Some(JobStatus::Error),
                error: Some(Some(message.to_string())),
                completed_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        Ok(JobEntity::find_by_id(job_id).one(&self.db).await?.map(model_to_record))
    }

    pub async fn mark_seen(&self, job_id: Uuid) -> Result<()> {
        self.update(
            job_id,
            JobPatch {
                seen: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        include_seen: bool,
    ) -> Result<Vec<JobRecord>> {
        let mut query = JobEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::StartedAt);
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status_str(status)));
        }
        if !include_seen {
            query = query.filter(Column::Seen.eq(false));
        }
        Ok(query.all(&self.db).await?.into_iter().map(model_to_record).collect())
    }

    pub async fn active_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>> {
        Ok(JobEntity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Status.is_in(["pending", "processing"]))
            .order_by_desc(Column::StartedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_record)
            .collect())
    }

    /// Delete terminal jobs whose `completed_at` predates `cutoff`.
    pub async fn gc(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let txn = self.db.begin().await?;
        let result = JobEntity::delete_many()
            .filter(Column::Status.is_in(["complete", "error"]))
            .filter(Column::CompletedAt.lt(cutoff))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(result.rows_affected)
    }
}
