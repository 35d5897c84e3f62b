//! Exercises `JobRegistry` against a real on-disk SQLite file, since the
//! module itself carries no `#[cfg(test)]` coverage.

use chrono::{Duration, Utc};
use tempfile::tempdir;

use vdocs_core::models::job::JobStatus;
use vdocs_core::store::JobRegistry;
use vdocs_core::store::job_registry::JobPatch;

#[tokio::test]
async fn create_update_and_mark_complete_round_trip() {
    let tmp = tempdir().unwrap();
    let registry = JobRegistry::connect(&tmp.path().join("jobs.sqlite")).await.unwrap();

    let job_id = registry.create("alice", "intro-video", 4).await.unwrap();
    let job = registry.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.total_stages, 4);

    registry
        .update(
            job_id,
            JobPatch {
                status: Some(JobStatus::Processing),
                current_stage: Some(Some("transcribe".to_string())),
                stage_index: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let job = registry.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.current_stage.as_deref(), Some("transcribe"));

    registry.mark_complete(job_id, "intro-video").await.unwrap();
    let job = registry.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.doc_id.as_deref(), Some("intro-video"));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn list_for_user_filters_by_status_and_seen() {
    let tmp = tempdir().unwrap();
    let registry = JobRegistry::connect(&tmp.path().join("jobs.sqlite")).await.unwrap();

    let pending_job = registry.create("bob", "video-a", 2).await.unwrap();
    let done_job = registry.create("bob", "video-b", 2).await.unwrap();
    registry.mark_complete(done_job, "video-b").await.unwrap();
    registry.mark_seen(done_job).await.unwrap();

    let active = registry.active_for_user("bob").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_id, pending_job);

    let unseen = registry.list_for_user("bob", None, false).await.unwrap();
    assert_eq!(unseen.len(), 1);
    assert_eq!(unseen[0].job_id, pending_job);

    let all = registry.list_for_user("bob", None, true).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn gc_deletes_only_old_terminal_jobs() {
    let tmp = tempdir().unwrap();
    let registry = JobRegistry::connect(&tmp.path().join("jobs.sqlite")).await.unwrap();

    let stale = registry.create("carol", "old-video", 1).await.unwrap();
    registry.mark_complete(stale, "old-video").await.unwrap();

    let fresh = registry.create("carol", "new-video", 1).await.unwrap();
    registry.mark_complete(fresh, "new-video").await.unwrap();

    let future_cutoff = Utc::now() + Duration::days(1);
    let deleted = registry.gc(future_cutoff).await.unwrap();
    assert_eq!(deleted, 2, "both terminal jobs predate a cutoff in the future");

    assert!(registry.get(stale).await.unwrap().is_none());
    assert!(registry.get(fresh).await.unwrap().is_none());
}
