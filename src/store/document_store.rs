//! Working (mutable) per-document state, language-aware.
//!
//! Layout rooted at `{data_root}/users/{user_id}/docs/{doc_id}/`. Grounded
//! on `original_source/src/storage/user_storage.py` for directory naming
//! (slug + numeric-suffix collision handling) and on the teacher's
//! tolerant-parsing style (`src/protocol/pack.rs`) for the legacy-layout
//! fallback chain kept behind `resolve_content_path`, the single private
//! entry point every legacy read goes through (`SPEC_FULL.md` §4.2).

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::{DocsError, Result};
use crate::models::document::DocumentMetadata;
use crate::utils::slugify;

/// What to do when `create_doc` finds an existing directory for the slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Reuse the existing document id.
    Reuse,
    /// Mint a new numeric-suffixed id.
    New,
}

/// Historical content filenames, newest layout first. `get_content` and
/// `languages` both funnel through this list so a layout migration only
/// needs one edit.
const CONTENT_FILENAMES: &[&str] = &["doc.md", "manual.md"];

pub struct DocumentStore {
    user_root: PathBuf,
}

impl DocumentStore {
    pub fn new(user_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
        }
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.user_root.join("docs")
    }

    pub fn doc_dir(&self, doc_id: &str) -> PathBuf {
        self.docs_dir().join(doc_id)
    }

    fn screenshots_dir(&self, doc_id: &str) -> PathBuf {
        self.doc_dir(doc_id).join("screenshots")
    }

    fn metadata_path(&self, doc_id: &str) -> PathBuf {
        self.doc_dir(doc_id).join("metadata.json")
    }

    fn language_dir(&self, doc_id: &str, language: &str) -> PathBuf {
        self.doc_dir(doc_id).join(language)
    }

    /// Resolve the first readable content path for `(doc_id, language)`,
    /// trying the current language-scoped layout, then the legacy
    /// `manual.md` filename, then the oldest root-level `doc.md` layout.
    /// This is the one place legacy filenames are allowed to appear
    /// (`SPEC_FULL.md` §4.2, §9).
    fn resolve_content_path(&self, doc_id: &str, language: &str) -> Option<PathBuf> {
        let lang_dir = self.language_dir(doc_id, language);
        for filename in CONTENT_FILENAMES {
            let candidate = lang_dir.join(filename);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        let root_level = self.doc_dir(doc_id).join("doc.md");
        if root_level.exists() {
            return Some(root_level);
        }
        None
    }

    fn canonical_content_path(&self, doc_id: &str, language: &str) -> PathBuf {
        self.language_dir(doc_id, language).join(CONTENT_FILENAMES[0])
    }

    /// Slugify `video_name`, then either reuse a colliding directory or
    /// mint the first unused numeric suffix, per `conflict_policy`.
    pub async fn create_doc(&self, video_name: &str, conflict_policy: ConflictPolicy) -> Result<(PathBuf, String)> {
        let base_slug = slugify(video_name, "document");
        fs::create_dir_all(self.docs_dir()).await?;

        let base_dir = self.doc_dir(&base_slug);
        if fs::metadata(&base_dir).await.is_err() {
            fs::create_dir_all(&base_dir).await?;
            self.write_initial_metadata(&base_slug, video_name).await?;
            return Ok((base_dir, base_slug));
        }

        match conflict_policy {
            ConflictPolicy::Reuse => Ok((base_dir, base_slug)),
            ConflictPolicy::New => {
                let mut suffix = 2u32;
                loop {
                    let candidate_id = format!("{base_slug}-{suffix}");
                    let candidate_dir = self.doc_dir(&candidate_id);
                    if fs::metadata(&candidate_dir).await.is_err() {
                        fs::create_dir_all(&candidate_dir).await?;
                        self.write_initial_metadata(&candidate_id, video_name).await?;
                        return Ok((candidate_dir, candidate_id));
                    }
                    suffix += 1;
                }
            }
        }
    }

    async fn write_initial_metadata(&self, doc_id: &str, title: &str) -> Result<()> {
        let metadata = DocumentMetadata::new(title);
        self.write_metadata_struct(doc_id, &metadata).await
    }

    /// Write the markdown body for `language`, creating the language
    /// subdirectory if needed. Always uses the canonical filename
    /// regardless of what legacy layout the document previously had.
    pub async fn put_content(&self, doc_id: &str, language: &str, text: &str) -> Result<()> {
        let doc_dir = self.doc_dir(doc_id);
        if fs::metadata(&doc_dir).await.is_err() {
            return Err(DocsError::NotFound(format!("document `{doc_id}` does not exist")));
        }
        let lang_dir = self.language_dir(doc_id, language);
        fs::create_dir_all(&lang_dir).await?;
        fs::write(self.canonical_content_path(doc_id, language), text).await?;
        self.touch_metadata(doc_id).await?;
        Ok(())
    }

    /// Read content for `(doc_id, language)`, tolerating the three
    /// historical layouts. Returns `None` if no layout has content.
    pub async fn get_content(&self, doc_id: &str, language: &str) -> Result<Option<String>> {
        let Some(path) = self.resolve_content_path(doc_id, language) else {
            return Ok(None);
        };
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Directories under the document that contain at least one
    /// recognized content filename.
    pub async fn languages(&self, doc_id: &str) -> Result<Vec<String>> {
        let doc_dir = self.doc_dir(doc_id);
        let mut languages = Vec::new();
        let mut entries = match fs::read_dir(&doc_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(languages),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if matches!(name, "screenshots" | "versions" | "evaluations" | "exports" | ".blob_store") {
                continue;
            }
            let has_content = CONTENT_FILENAMES
                .iter()
                .any(|f| path.join(f).exists());
            if has_content {
                languages.push(name.to_string());
            }
        }
        languages.sort();
        Ok(languages)
    }

    /// Image files in the document's working screenshots directory.
    pub async fn screenshots(&self, doc_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.screenshots_dir(doc_id);
        let mut paths = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Read `metadata.json`. Corrupted JSON is treated as absent rather
    /// than propagated (`SPEC_FULL.md` §7).
    pub async fn get_metadata(&self, doc_id: &str) -> Result<Option<DocumentMetadata>> {
        let path = self.metadata_path(doc_id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) => {
                debug!(doc_id, %err, "corrupted metadata.json, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_metadata_struct(&self, doc_id: &str, metadata: &DocumentMetadata) -> Result<()> {
        let path = self.metadata_path(doc_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(metadata).map_err(|e| DocsError::InvalidInput(e.to_string()))?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn touch_metadata(&self, doc_id: &str) -> Result<()> {
        let mut metadata = self
            .get_metadata(doc_id)
            .await?
            .unwrap_or_else(|| DocumentMetadata::new(doc_id));
        metadata.touch();
        self.write_metadata_struct(doc_id, &metadata).await
    }

    /// Read-modify-write a metadata patch, refreshing `updated_at`.
    pub async fn update_metadata<F>(&self, doc_id: &str, patch: F) -> Result<DocumentMetadata>
    where
        F: FnOnce(&mut DocumentMetadata),
    {
        let mut metadata = self
            .get_metadata(doc_id)
            .await?
            .ok_or_else(|| DocsError::NotFound(format!("document `{doc_id}` does not exist")))?;
        patch(&mut metadata);
        metadata.touch();
        self.write_metadata_struct(doc_id, &metadata).await?;
        Ok(metadata)
    }

    /// Mint a fresh share token for `(doc_id, language)`, overwriting any
    /// previous one. Resolution is handled globally by
    /// `store::share_resolver::ShareTokenResolver`.
    pub async fn create_share(&self, doc_id: &str, language: &str) -> Result<String> {
        let token = crate::store::share_resolver::generate_token();
        let share = crate::models::share::ShareInfo {
            token: token.clone(),
            language: language.to_string(),
            created_at: crate::utils::now_iso(),
        };
        self.update_metadata(doc_id, |metadata| metadata.share = Some(share)).await?;
        Ok(token)
    }

    /// Clear the share token for `doc_id`. Returns whether one was present.
    pub async fn revoke_share(&self, doc_id: &str) -> Result<bool> {
        let mut had_share = false;
        self.update_metadata(doc_id, |metadata| {
            had_share = metadata.share.take().is_some();
        })
        .await?;
        Ok(had_share)
    }

    pub async fn list_docs(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(self.docs_dir()).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn add_tag_to_doc(&self, doc_id: &str, tag: &str) -> Result<()> {
        self.update_metadata(doc_id, |metadata| {
            metadata.tags.insert(tag.to_string());
        })
        .await?;
        Ok(())
    }

    pub async fn remove_tag_from_doc(&self, doc_id: &str, tag: &str) -> Result<()> {
        self.update_metadata(doc_id, |metadata| {
            metadata.tags.remove(tag);
        })
        .await?;
        Ok(())
    }

    /// The tag index is a scan over every document's metadata, per
    /// `SPEC_FULL.md` §4.5 — there is no separate tag table to keep
    /// consistent.
    pub async fn list_all_tags(&self) -> Result<std::collections::BTreeSet<String>> {
        let mut tags = std::collections::BTreeSet::new();
        for doc_id in self.list_docs().await? {
            if let Some(metadata) = self.get_metadata(&doc_id).await? {
                tags.extend(metadata.tags);
            }
        }
        Ok(tags)
    }

    pub async fn docs_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for doc_id in self.list_docs().await? {
            if let Some(metadata) = self.get_metadata(&doc_id).await? {
                if metadata.tags.contains(tag) {
                    matches.push(doc_id);
                }
            }
        }
        Ok(matches)
    }

    /// Substring scan over document titles (`SPEC_FULL.md` §10,
    /// supplemented beyond spec.md's explicit operations).
    pub async fn search_docs_by_title(&self, query: &str) -> Result<Vec<String>> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        for doc_id in self.list_docs().await? {
            if let Some(metadata) = self.get_metadata(&doc_id).await? {
                if metadata.title.to_lowercase().contains(&needle) {
                    matches.push(doc_id);
                }
            }
        }
        Ok(matches)
    }

    /// The doc_id a given video stem would slugify to, if it currently
    /// exists on disk.
    pub async fn find_by_video(&self, video_name: &str) -> Result<Option<String>> {
        let slug = slugify(video_name, "document");
        if fs::metadata(self.doc_dir(&slug)).await.is_ok() {
            Ok(Some(slug))
        } else {
            Ok(None)
        }
    }

    /// Alias kept distinct from `find_by_video` for call-site clarity: an
    /// existence probe used before deciding a conflict policy.
    pub async fn find_existing(&self, video_name: &str) -> Result<Option<String>> {
        self.find_by_video(video_name).await
    }

    pub fn path(&self) -> &Path {
        &self.user_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_doc_reuse_returns_existing_id() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let (_, first) = store.create_doc("My Video", ConflictPolicy::New).await.unwrap();
        let (_, reused) = store.create_doc("My Video", ConflictPolicy::Reuse).await.unwrap();
        assert_eq!(first, reused);
    }

    #[tokio::test]
    async fn create_doc_new_mints_numeric_suffix() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let (_, first) = store.create_doc("My Video", ConflictPolicy::New).await.unwrap();
        let (_, second) = store.create_doc("My Video", ConflictPolicy::New).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(second, format!("{first}-2"));
    }

    #[tokio::test]
    async fn get_content_falls_back_through_legacy_layouts() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let (dir, doc_id) = store.create_doc("legacy video", ConflictPolicy::New).await.unwrap();

        fs::create_dir_all(dir.join("en")).await.unwrap();
        fs::write(dir.join("en").join("manual.md"), "legacy content").await.unwrap();

        let content = store.get_content(&doc_id, "en").await.unwrap();
        assert_eq!(content.as_deref(), Some("legacy content"));
    }

    #[tokio::test]
    async fn put_content_uses_canonical_filename_even_if_legacy_present() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let (dir, doc_id) = store.create_doc("vid", ConflictPolicy::New).await.unwrap();
        fs::create_dir_all(dir.join("en")).await.unwrap();
        fs::write(dir.join("en").join("manual.md"), "old").await.unwrap();

        store.put_content(&doc_id, "en", "new").await.unwrap();

        assert!(dir.join("en").join("doc.md").exists());
        let content = store.get_content(&doc_id, "en").await.unwrap();
        assert_eq!(content.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn corrupted_metadata_reads_as_none() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let (dir, doc_id) = store.create_doc("vid", ConflictPolicy::New).await.unwrap();
        fs::write(dir.join("metadata.json"), b"not json").await.unwrap();

        let metadata = store.get_metadata(&doc_id).await.unwrap();
        assert!(metadata.is_none());
    }

    #[tokio::test]
    async fn put_content_on_missing_document_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = DocumentStore::new(tmp.path());
        let err = store.put_content("ghost", "en", "x").await.unwrap_err();
        assert!(matches!(err, DocsError::NotFound(_)));
    }
}
