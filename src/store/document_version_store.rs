//! Hybrid auto-patch / manual-bump versioning over a document's working
//! state.
//!
//! Grounded directly on `original_source/src/storage/version_storage.py`
//! (the Python original this was distilled from) for snapshot-directory
//! layout, the pre-bump snapshot-version tie-break, and the
//! backward-compatible restore path for pre-blob-store snapshots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info};

use crate::errors::{DocsError, Result};
use crate::hash::BlobHash;
use crate::models::document::{DocumentMetadata, VersionHistoryEntry};
use crate::models::evaluation::EvaluationRecord;
use crate::store::blob_store::{BlobStore, ScreenshotManifest};
use crate::store::document_store::DocumentStore;
use crate::version::{BumpKind, Version};

/// A `metadata_snapshot.json` payload: everything in `DocumentMetadata`
/// except the mutable `version` subtree, plus the snapshot's own version
/// stamp (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub version: Version,
    pub created_at: String,
    pub notes: String,
    pub title: String,
    pub tags: std::collections::BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfoView {
    pub version: Version,
    pub is_current: bool,
    pub created_at: String,
    pub notes: String,
    pub snapshot_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSummary {
    pub lines_v1: usize,
    pub lines_v2: usize,
    pub chars_v1: usize,
    pub chars_v2: usize,
    pub lines_changed: bool,
    pub chars_changed: i64,
}

pub struct DocumentVersionStore<'a> {
    docs: &'a DocumentStore,
    doc_id: String,
}

impl<'a> DocumentVersionStore<'a> {
    pub fn new(docs: &'a DocumentStore, doc_id: impl Into<String>) -> Self {
        Self {
            docs,
            doc_id: doc_id.into(),
        }
    }

    fn doc_dir(&self) -> PathBuf {
        self.docs.doc_dir(&self.doc_id)
    }

    fn versions_root(&self) -> PathBuf {
        self.doc_dir().join("versions")
    }

    fn version_dir(&self, version: Version) -> PathBuf {
        self.versions_root().join(format!("v{version}"))
    }

    fn evaluations_dir(&self) -> PathBuf {
        self.doc_dir().join("evaluations")
    }

    fn blob_store(&self) -> BlobStore {
        BlobStore::new(self.doc_dir().join(".blob_store"))
    }

    fn screenshots_dir(&self) -> PathBuf {
        self.doc_dir().join("screenshots")
    }

    async fn metadata(&self) -> Result<DocumentMetadata> {
        self.docs
            .get_metadata(&self.doc_id)
            .await?
            .ok_or_else(|| DocsError::NotFound(format!("document `{}` does not exist", self.doc_id)))
    }

    /// Copy every language's content file and write the blob-store-backed
    /// `screenshots.json` + `metadata_snapshot.json` into
    /// `versions/v{version}/`. `version` is the pre-bump value the
    /// snapshot represents (spec §4.3 tie-break).
    async fn create_snapshot(&self, version: Version, notes: &str, metadata: &DocumentMetadata) -> Result<()> {
        let snapshot_dir = self.version_dir(version);
        fs::create_dir_all(&snapshot_dir).await?;

        for language in self.docs.languages(&self.doc_id).await? {
            if let Some(content) = self.docs.get_content(&self.doc_id, &language).await? {
                let lang_dir = snapshot_dir.join(&language);
                fs::create_dir_all(&lang_dir).await?;
                fs::write(lang_dir.join("doc.md"), content).await?;
            }
        }

        let manifest = self.blob_store().snapshot(&self.screenshots_dir()).await?;
        fs::write(
            snapshot_dir.join("screenshots.json"),
            serde_json::to_string_pretty(&manifest).map_err(|e| DocsError::InvalidInput(e.to_string()))?,
        )
        .await?;

        let snapshot_meta = MetadataSnapshot {
            version,
            created_at: crate::utils::now_iso(),
            notes: notes.to_string(),
            title: metadata.title.clone(),
            tags: metadata.tags.clone(),
        };
        fs::write(
            snapshot_dir.join("metadata_snapshot.json"),
            serde_json::to_string_pretty(&snapshot_meta).map_err(|e| DocsError::InvalidInput(e.to_string()))?,
        )
        .await?;

        Ok(())
    }

    async fn append_history(&self, version: Version, notes: &str) -> Result<()> {
        let snapshot_dir = format!("versions/v{version}");
        self.docs
            .update_metadata(&self.doc_id, |metadata| {
                metadata.version.history.push(VersionHistoryEntry {
                    version,
                    created_at: crate::utils::now_iso(),
                    snapshot_dir,
                    notes: notes.to_string(),
                });
            })
            .await?;
        Ok(())
    }

    /// Whether the working tree currently has any content in any
    /// language.
    async fn has_content(&self) -> Result<bool> {
        for language in self.docs.languages(&self.doc_id).await? {
            if self.docs.get_content(&self.doc_id, &language).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Snapshot current state and bump the patch component, called just
    /// before any write that would overwrite working content. Returns
    /// `None` on an empty working directory, mutating nothing (spec §4.3,
    /// boundary behavior).
    pub async fn auto_patch(&self, notes: &str) -> Result<Option<Version>> {
        if !self.has_content().await? {
            debug!(doc_id = %self.doc_id, "auto_patch skipped: no working content");
            return Ok(None);
        }
        let metadata = self.metadata().await?;
        let current = metadata.version.number;

        self.create_snapshot(current, notes, &metadata).await?;
        self.append_history(current, notes).await?;

        let next = current.bump_patch();
        self.docs
            .update_metadata(&self.doc_id, |metadata| metadata.version.number = next)
            .await?;

        info!(doc_id = %self.doc_id, from = %current, to = %next, "auto-patched");
        Ok(Some(next))
    }

    /// Always snapshot, append history, and advance minor/major. Patch is
    /// rejected here; only `auto_patch` produces patch bumps.
    pub async fn bump(&self, kind: BumpKind, notes: &str) -> Result<Version> {
        let metadata = self.metadata().await?;
        let current = metadata.version.number;

        self.create_snapshot(current, notes, &metadata).await?;
        self.append_history(current, notes).await?;

        let next = current.bump(kind);
        self.docs
            .update_metadata(&self.doc_id, |metadata| metadata.version.number = next)
            .await?;

        info!(doc_id = %self.doc_id, from = %current, to = %next, ?kind, "bumped");
        Ok(next)
    }

    /// All versions with history entries, newest-first, flagged with
    /// `is_current`.
    pub async fn list(&self) -> Result<Vec<VersionInfoView>> {
        let metadata = self.metadata().await?;
        let current = metadata.version.number;
        let mut views: Vec<VersionInfoView> = metadata
            .version
            .history
            .iter()
            .map(|entry| VersionInfoView {
                version: entry.version,
                is_current: entry.version == current,
                created_at: entry.created_at.clone(),
                notes: entry.notes.clone(),
                snapshot_dir: entry.snapshot_dir.clone(),
            })
            .collect();
        views.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(views)
    }

    pub async fn get(&self, version: Version) -> Result<Option<VersionInfoView>> {
        Ok(self.list().await?.into_iter().find(|v| v.version == version))
    }

    /// Restore `language` content (and screenshots) from the `version`
    /// snapshot, auto-patching the current state first. Restoring the
    /// current version is a no-op returning `true`. A missing snapshot
    /// directory returns `false` without mutating anything.
    pub async fn restore(&self, version: Version, language: &str) -> Result<bool> {
        let metadata = self.metadata().await?;
        if version == metadata.version.number {
            return Ok(true);
        }

        let snapshot_dir = self.version_dir(version);
        if fs::metadata(&snapshot_dir).await.is_err() {
            return Ok(false);
        }

        self.auto_patch("restore").await?;

        let content_path = snapshot_dir.join(language).join("doc.md");
        let content = match fs::read_to_string(&content_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        self.docs.put_content(&self.doc_id, language, &content).await?;

        self.restore_screenshots(&snapshot_dir).await?;

        info!(doc_id = %self.doc_id, %version, language, "restored version");
        Ok(true)
    }

    /// Restore screenshots for a snapshot either from the blob-store
    /// manifest (current layout) or, for snapshots predating the blob
    /// store, by copying the raw files directly (backward-compat, per
    /// `version_storage.py`'s `restore_version`).
    async fn restore_screenshots(&self, snapshot_dir: &Path) -> Result<()> {
        let manifest_path = snapshot_dir.join("screenshots.json");
        let dest_dir = self.screenshots_dir();

        if let Ok(raw) = fs::read_to_string(&manifest_path).await {
            if let Ok(manifest) = serde_json::from_str::<ScreenshotManifest>(&raw) {
                self.blob_store().restore(&manifest, &dest_dir, true).await?;
                return Ok(());
            }
        }

        let legacy_screenshots = snapshot_dir.join("screenshots");
        if fs::metadata(&legacy_screenshots).await.is_ok() {
            fs::create_dir_all(&dest_dir).await?;
            let mut entries = fs::read_dir(&legacy_screenshots).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_file() {
                    if let Some(name) = path.file_name() {
                        fs::copy(&path, dest_dir.join(name)).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Structural diff summary (line/char counts only, not a full
    /// textual diff) between two versions' content for `language`.
    pub async fn diff(&self, v1: Version, v2: Version, language: &str) -> Result<DiffSummary> {
        let read_version = |version: Version| {
            let path = self.version_dir(version).join(language).join("doc.md");
            async move {
                match fs::read_to_string(&path).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                    Err(e) => Err(DocsError::from(e)),
                }
            }
        };
        let content_v1 = read_version(v1).await?;
        let content_v2 = read_version(v2).await?;

        let lines_v1 = content_v1.lines().count();
        let lines_v2 = content_v2.lines().count();
        let chars_v1 = content_v1.chars().count();
        let chars_v2 = content_v2.chars().count();

        Ok(DiffSummary {
            lines_v1,
            lines_v2,
            chars_v1,
            chars_v2,
            lines_changed: lines_v1 != lines_v2,
            chars_changed: chars_v2 as i64 - chars_v1 as i64,
        })
    }

    fn evaluation_path(&self, version: Version, language: &str) -> PathBuf {
        self.evaluations_dir().join(format!("v{version}_{language}.json"))
    }

    pub async fn save_evaluation(&self, payload: Map<String, Value>, language: &str, version: Option<Version>) -> Result<()> {
        let version = match version {
            Some(v) => v,
            None => self.metadata().await?.version.number,
        };
        fs::create_dir_all(self.evaluations_dir()).await?;
        let record = EvaluationRecord::new(version, language, payload);
        fs::write(
            self.evaluation_path(version, language),
            serde_json::to_string_pretty(&record).map_err(|e| DocsError::InvalidInput(e.to_string()))?,
        )
        .await?;
        Ok(())
    }

    pub async fn get_evaluation(&self, language: &str, version: Option<Version>) -> Result<Option<EvaluationRecord>> {
        let version = match version {
            Some(v) => v,
            None => self.metadata().await?.version.number,
        };
        let path = self.evaluation_path(version, language);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All evaluations, newest-first by `stored_at`, summarized with
    /// `overall_score` (`SPEC_FULL.md` §10).
    pub async fn list_evaluations(&self) -> Result<Vec<EvaluationRecord>> {
        let mut records = Vec::new();
        let mut entries = match fs::read_dir(self.evaluations_dir()).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(raw) = fs::read_to_string(entry.path()).await {
                if let Ok(record) = serde_json::from_str::<EvaluationRecord>(&raw) {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(records)
    }

    pub async fn delete_evaluation(&self, version: Version, language: &str) -> Result<bool> {
        let path = self.evaluation_path(version, language);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the oldest snapshot directories beyond `keep_count`, purge
    /// their history entries, and invoke blob-store GC over the
    /// remaining live set.
    pub async fn gc(&self, keep_count: usize) -> Result<Vec<BlobHash>> {
        let metadata = self.metadata().await?;
        let mut history = metadata.version.history.clone();
        history.sort_by(|a, b| b.version.cmp(&a.version));

        if history.len() > keep_count {
            let to_remove = history.split_off(keep_count);
            for entry in &to_remove {
                let dir = self.version_dir(entry.version);
                if fs::metadata(&dir).await.is_ok() {
                    fs::remove_dir_all(&dir).await?;
                }
            }
            let kept_versions: HashSet<Version> = history.iter().map(|e| e.version).collect();
            self.docs
                .update_metadata(&self.doc_id, |metadata| {
                    metadata.version.history.retain(|e| kept_versions.contains(&e.version));
                })
                .await?;
        }

        let live_in_versions = self.blob_store().referenced_hashes_in_versions(&self.versions_root()).await?;
        let live_in_working = self.blob_store().hashes_of_dir(&self.screenshots_dir()).await?;
        let live: HashSet<BlobHash> = live_in_versions.union(&live_in_working).copied().collect();
        self.blob_store().gc(&live, false).await
    }
}
