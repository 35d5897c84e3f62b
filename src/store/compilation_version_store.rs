//! Versioning over an entire compiled project output (merged markdown
//! per language, merged screenshots, compilation report).
//!
//! Same discipline as `document_version_store`, plus a lazy idempotent
//! migration off the legacy flat `compiled/*.md` layout. Grounded on
//! `original_source/src/storage/compilation_version_storage.py`.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::errors::{DocsError, Result};
use crate::hash::BlobHash;
use crate::store::blob_store::BlobStore;
use crate::version::{BumpKind, Version};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationHistory {
    pub current_version: Version,
    #[serde(default)]
    pub entries: Vec<CompilationHistoryEntry>,
}

impl Default for CompilationHistory {
    fn default() -> Self {
        Self {
            current_version: Version::INITIAL,
            entries: Vec::new(),
        }
    }
}

/// `{"doc_id": ..., "version": ...}` — which source document version fed
/// a compilation, for the history entry's provenance record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceDocRef {
    pub doc_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergePlanSummary {
    pub chapter_count: usize,
    pub duplicates_detected: usize,
    pub transitions_needed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationHistoryEntry {
    pub version: Version,
    pub folder_name: String,
    pub created_at: String,
    pub notes: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub source_docs: Vec<SourceDocRef>,
    #[serde(default)]
    pub merge_plan_summary: MergePlanSummary,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct CompilationVersionStore {
    project_dir: PathBuf,
}

impl CompilationVersionStore {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    fn compiled_dir(&self) -> PathBuf {
        self.project_dir.join("compiled")
    }

    fn current_dir(&self) -> PathBuf {
        self.compiled_dir().join("current")
    }

    fn versions_dir(&self) -> PathBuf {
        self.compiled_dir().join("versions")
    }

    fn history_path(&self) -> PathBuf {
        self.project_dir.join("compilation_history.json")
    }

    fn blob_store(&self) -> BlobStore {
        BlobStore::new(self.compiled_dir().join(".blob_store"))
    }

    async fn load_history(&self) -> Result<CompilationHistory> {
        match fs::read_to_string(self.history_path()).await {
            Ok(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CompilationHistory::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_history(&self, history: &CompilationHistory) -> Result<()> {
        fs::write(
            self.history_path(),
            serde_json::to_string_pretty(history).map_err(|e| DocsError::InvalidInput(e.to_string()))?,
        )
        .await?;
        Ok(())
    }

    fn folder_name(version: Version, timestamp: &str) -> String {
        format!("v{version}_{timestamp}")
    }

    /// Whether `current/` already holds compiled output, checking both
    /// the current layout and, directly, legacy flat files under
    /// `compiled/` (mirrors `_has_current_compilation`).
    async fn has_current_compilation(&self) -> Result<bool> {
        if fs::metadata(&self.current_dir()).await.is_ok() {
            let mut entries = fs::read_dir(self.current_dir()).await?;
            if entries.next_entry().await?.is_some() {
                return Ok(true);
            }
        }
        let mut entries = match fs::read_dir(self.compiled_dir()).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("manual_") && name.ends_with(".md") {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Lazily move legacy flat `compiled/manual_{lang}.md` files into
    /// `current/`, seeding a history entry labeled "Migrated from legacy
    /// structure". Idempotent: a no-op once `current/` exists.
    async fn migrate_legacy_structure(&self) -> Result<()> {
        if fs::metadata(&self.current_dir()).await.is_ok() {
            return Ok(());
        }
        let compiled_dir = self.compiled_dir();
        let mut legacy_files = Vec::new();
        let mut entries = match fs::read_dir(&compiled_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("manual_") || name == "compilation.json" {
                        legacy_files.push(path);
                    }
                }
            }
        }
        if legacy_files.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(self.current_dir()).await?;
        for path in legacy_files {
            if let Some(name) = path.file_name() {
                fs::rename(&path, self.current_dir().join(name)).await?;
            }
        }

        let mut history = self.load_history().await?;
        history.current_version = Version::INITIAL;
        history.entries.push(CompilationHistoryEntry {
            version: Version::INITIAL,
            folder_name: "current".to_string(),
            created_at: crate::utils::now_iso(),
            notes: "Migrated from legacy structure".to_string(),
            languages: Vec::new(),
            source_docs: Vec::new(),
            merge_plan_summary: MergePlanSummary::default(),
            tags: Vec::new(),
        });
        self.save_history(&history).await?;
        info!(project = %self.project_dir.display(), "migrated legacy compiled structure");
        Ok(())
    }

    /// The directory writers should always write to. Performs the legacy
    /// migration check first.
    pub async fn get_current_directory(&self) -> Result<PathBuf> {
        self.migrate_legacy_structure().await?;
        fs::create_dir_all(self.current_dir()).await?;
        Ok(self.current_dir())
    }

    /// Called before writing a new compilation. First call on a pristine
    /// project returns `None`; later calls snapshot `current/` to a
    /// versioned folder and bump patch.
    pub async fn auto_save_before_compile(&self, timestamp: &str) -> Result<Option<Version>> {
        self.get_current_directory().await?;
        if !self.has_current_compilation().await? {
            return Ok(None);
        }

        let mut history = self.load_history().await?;
        let current = history.current_version;
        let next = current.bump_patch();

        self.snapshot_current(current, timestamp, "auto-save before compile", &mut history)
            .await?;
        history.current_version = next;
        self.save_history(&history).await?;

        info!(project = %self.project_dir.display(), from = %current, to = %next, "auto-saved compilation");
        Ok(Some(next))
    }

    async fn snapshot_current(
        &self,
        version: Version,
        timestamp: &str,
        notes: &str,
        history: &mut CompilationHistory,
    ) -> Result<()> {
        let folder = Self::folder_name(version, timestamp);
        let dest = self.versions_dir().join(&folder);
        fs::create_dir_all(&dest).await?;

        let mut entries = fs::read_dir(self.current_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = entry.metadata().await?;
            if let Some(name) = path.file_name() {
                if meta.is_dir() {
                    copy_dir_recursive(&path, &dest.join(name)).await?;
                } else {
                    fs::copy(&path, dest.join(name)).await?;
                }
            }
        }

        history.entries.push(CompilationHistoryEntry {
            version,
            folder_name: folder,
            created_at: crate::utils::now_iso(),
            notes: notes.to_string(),
            languages: Vec::new(),
            source_docs: Vec::new(),
            merge_plan_summary: MergePlanSummary::default(),
            tags: Vec::new(),
        });
        Ok(())
    }

    /// Explicit minor/major bump over the compiled output.
    pub async fn bump(&self, kind: BumpKind, timestamp: &str, notes: &str) -> Result<Version> {
        self.get_current_directory().await?;
        let mut history = self.load_history().await?;
        let current = history.current_version;
        let next = current.bump(kind);

        self.snapshot_current(current, timestamp, notes, &mut history).await?;
        history.current_version = next;
        self.save_history(&history).await?;

        Ok(next)
    }

    /// Record languages covered, source-document versions, a merge-plan
    /// summary, and optional notes/tags against the current (unsnapshotted)
    /// version, updating the entry in place if one already exists for it.
    pub async fn save_compilation(
        &self,
        languages: Vec<String>,
        source_docs: Vec<SourceDocRef>,
        merge_plan_summary: MergePlanSummary,
        notes: &str,
        tags: Vec<String>,
    ) -> Result<Version> {
        let mut history = self.load_history().await?;
        let current = history.current_version;

        let entry = CompilationHistoryEntry {
            version: current,
            folder_name: "current".to_string(),
            created_at: crate::utils::now_iso(),
            notes: notes.to_string(),
            languages,
            source_docs,
            merge_plan_summary,
            tags,
        };

        match history
            .entries
            .iter_mut()
            .find(|e| e.version == current && e.folder_name == "current")
        {
            Some(existing) => *existing = entry,
            None => history.entries.push(entry),
        }

        self.save_history(&history).await?;
        Ok(current)
    }

    pub async fn list(&self) -> Result<Vec<CompilationHistoryEntry>> {
        let mut history = self.load_history().await?;
        history.entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(history.entries)
    }

    /// Atomically replace `current/` with the chosen snapshot, after
    /// first auto-saving the state being replaced.
    pub async fn restore(&self, folder_name: &str, timestamp: &str) -> Result<bool> {
        let snapshot_dir = self.versions_dir().join(folder_name);
        if fs::metadata(&snapshot_dir).await.is_err() {
            return Ok(false);
        }

        self.auto_save_before_compile(timestamp).await?;

        let current = self.current_dir();
        if fs::metadata(&current).await.is_ok() {
            fs::remove_dir_all(&current).await?;
        }
        copy_dir_recursive(&snapshot_dir, &current).await?;
        Ok(true)
    }

    pub async fn gc(&self, keep_count: usize) -> Result<Vec<BlobHash>> {
        let mut history = self.load_history().await?;
        history.entries.sort_by(|a, b| b.version.cmp(&a.version));

        if history.entries.len() > keep_count {
            let to_remove = history.entries.split_off(keep_count);
            for entry in &to_remove {
                let dir = self.versions_dir().join(&entry.folder_name);
                if fs::metadata(&dir).await.is_ok() {
                    fs::remove_dir_all(&dir).await?;
                }
            }
            self.save_history(&history).await?;
        }

        let live_in_versions = self
            .blob_store()
            .referenced_hashes_in_versions(&self.versions_dir())
            .await?;
        let live_in_current = self
            .blob_store()
            .hashes_of_dir(&self.current_dir().join("screenshots"))
            .await?;
        let live: HashSet<BlobHash> = live_in_versions.union(&live_in_current).copied().collect();
        self.blob_store().gc(&live, false).await
    }
}

fn copy_dir_recursive<'a>(src: &'a std::path::Path, dest: &'a std::path::Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
    Box::pin(async move {
        fs::create_dir_all(dest).await?;
        let mut entries = fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = entry.metadata().await?;
            let Some(name) = path.file_name() else { continue };
            let dest_path = dest.join(name);
            if meta.is_dir() {
                copy_dir_recursive(&path, &dest_path).await?;
            } else {
                fs::copy(&path, &dest_path).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn first_auto_save_on_pristine_project_is_noop() {
        let tmp = tempdir().unwrap();
        let store = CompilationVersionStore::new(tmp.path());
        let result = store.auto_save_before_compile("20260101_000000").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn migrates_legacy_flat_layout_on_first_access() {
        let tmp = tempdir().unwrap();
        let compiled = tmp.path().join("compiled");
        fs::create_dir_all(&compiled).await.unwrap();
        fs::write(compiled.join("manual_en.md"), "legacy compiled").await.unwrap();

        let store = CompilationVersionStore::new(tmp.path());
        let dir = store.get_current_directory().await.unwrap();

        assert!(dir.join("manual_en.md").exists());
        assert!(!compiled.join("manual_en.md").exists());

        let history = store.list().await.unwrap();
        assert!(history.iter().any(|e| e.notes == "Migrated from legacy structure"));
    }

    #[tokio::test]
    async fn second_compile_snapshots_and_bumps() {
        let tmp = tempdir().unwrap();
        let store = CompilationVersionStore::new(tmp.path());
        let current = store.get_current_directory().await.unwrap();
        fs::write(current.join("manual_en.md"), "first pass").await.unwrap();

        let bumped = store
            .auto_save_before_compile("20260101_000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bumped, Version::INITIAL.bump_patch());

        let history = store.list().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, Version::INITIAL);
    }

    #[tokio::test]
    async fn save_compilation_records_metadata_against_current_version() {
        let tmp = tempdir().unwrap();
        let store = CompilationVersionStore::new(tmp.path());
        store.get_current_directory().await.unwrap();

        let saved = store
            .save_compilation(
                vec!["en".to_string(), "es".to_string()],
                vec![SourceDocRef {
                    doc_id: "doc-1".to_string(),
                    version: "1.2.0".to_string(),
                }],
                MergePlanSummary {
                    chapter_count: 3,
                    duplicates_detected: 1,
                    transitions_needed: 2,
                },
                "first merge",
                vec!["release".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(saved, Version::INITIAL);

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].languages, vec!["en", "es"]);
        assert_eq!(entries[0].merge_plan_summary.chapter_count, 3);
        assert_eq!(entries[0].tags, vec!["release"]);

        // Saving again for the same current version updates in place
        // rather than appending a second entry.
        store
            .save_compilation(vec!["en".to_string()], vec![], MergePlanSummary::default(), "revised", vec![])
            .await
            .unwrap();
        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].notes, "revised");
    }

    #[tokio::test]
    async fn current_version_persists_across_loads_independent_of_entry_order() {
        let tmp = tempdir().unwrap();
        let store = CompilationVersionStore::new(tmp.path());
        let current = store.get_current_directory().await.unwrap();
        fs::write(current.join("manual_en.md"), "v1").await.unwrap();

        store.auto_save_before_compile("20260101_000000").await.unwrap();
        fs::write(current.join("manual_en.md"), "v2").await.unwrap();
        let bumped = store.bump(BumpKind::Minor, "20260102_000000", "minor bump").await.unwrap();
        assert_eq!(bumped, Version::INITIAL.bump_patch().bump(BumpKind::Minor));

        // current_version must reflect the bump, not the max of historical
        // (pre-bump) snapshot entries.
        let history = store.load_history().await.unwrap();
        assert_eq!(history.current_version, bumped);
    }
}
