//! Project hierarchy (chapters, sections) and tag index.
//!
//! Grounded on `original_source/src/storage/project_storage.py`. Chapter
//! `order` is kept dense and 1-based by every mutating operation
//! (`SPEC_FULL.md` §8 property 4) — the original seeds its initial
//! "Uncategorized" chapter at `order: 0`; this store seeds at `order: 1`
//! instead to satisfy that invariant (see `DESIGN.md`).

use std::path::PathBuf;

use tokio::fs;

use crate::errors::{DocsError, Result};
use crate::models::project::{Chapter, ProjectManifest, Section, DEFAULT_CHAPTER_ID, DEFAULT_PROJECT_ID};
use crate::utils::slugify;

pub struct ProjectStore {
    user_root: PathBuf,
}

impl ProjectStore {
    pub fn new(user_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
        }
    }

    fn projects_dir(&self) -> PathBuf {
        self.user_root.join("projects")
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.projects_dir().join(project_id)
    }

    fn manifest_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("project.json")
    }

    async fn save(&self, manifest: &ProjectManifest) -> Result<()> {
        let dir = self.project_dir(&manifest.project_id);
        fs::create_dir_all(&dir).await?;
        fs::create_dir_all(dir.join("exports")).await?;
        fs::write(
            self.manifest_path(&manifest.project_id),
            serde_json::to_string_pretty(manifest).map_err(|e| DocsError::InvalidInput(e.to_string()))?,
        )
        .await?;
        Ok(())
    }

    /// Read `project.json`. Corrupted JSON reads as absent, per
    /// `SPEC_FULL.md` §7.
    pub async fn get_project(&self, project_id: &str) -> Result<Option<ProjectManifest>> {
        let raw = match fs::read_to_string(self.manifest_path(project_id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    async fn require_project(&self, project_id: &str) -> Result<ProjectManifest> {
        self.get_project(project_id)
            .await?
            .ok_or_else(|| DocsError::NotFound(format!("project `{project_id}` does not exist")))
    }

    pub async fn create_project(&self, name: &str, description: &str, default_language: &str) -> Result<String> {
        let base_slug = slugify(name, "project");
        let mut project_id = base_slug.clone();
        let mut suffix = 2u32;
        while fs::metadata(self.manifest_path(&project_id)).await.is_ok() {
            project_id = format!("{base_slug}-{suffix}");
            suffix += 1;
        }

        let mut manifest = ProjectManifest::new(&project_id, name);
        manifest.export_settings.default_language = default_language.to_string();
        manifest.description = description.to_string();
        self.save(&manifest).await?;
        Ok(project_id)
    }

    /// Idempotent creation of the `__default__` project with an initial
    /// "Uncategorized" chapter at `order = 1`.
    pub async fn ensure_default_project(&self) -> Result<ProjectManifest> {
        if let Some(existing) = self.get_project(DEFAULT_PROJECT_ID).await? {
            return Ok(existing);
        }
        let manifest = ProjectManifest::default_seed();
        self.save(&manifest).await?;
        Ok(manifest)
    }

    pub async fn update_project<F>(&self, project_id: &str, patch: F) -> Result<ProjectManifest>
    where
        F: FnOnce(&mut ProjectManifest),
    {
        let mut manifest = self.require_project(project_id).await?;
        patch(&mut manifest);
        manifest.touch();
        self.save(&manifest).await?;
        Ok(manifest)
    }

    /// Deletes forbid `__default__`. `delete_docs` controls whether owned
    /// documents are dropped or merely have their project back-reference
    /// cleared — the caller (which holds the document store) performs
    /// that half; this only removes the project's own files.
    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        if project_id == DEFAULT_PROJECT_ID {
            return Err(DocsError::InvalidInput("the default project cannot be deleted".to_string()));
        }
        self.require_project(project_id).await?;
        fs::remove_dir_all(self.project_dir(project_id)).await?;
        Ok(())
    }

    /// Renumber `chapters` to a dense `1..N` sequence, in their current
    /// order. Every mutating chapter operation ends by calling this.
    fn renumber_chapters(chapters: &mut [Chapter]) {
        for (index, chapter) in chapters.iter_mut().enumerate() {
            chapter.order = (index + 1) as u32;
        }
    }

    pub async fn add_chapter(&self, project_id: &str, title: &str) -> Result<String> {
        let mut manifest = self.require_project(project_id).await?;
        let existing_ids: std::collections::BTreeSet<&str> =
            manifest.chapters.iter().map(|c| c.id.as_str()).collect();
        let mut chapter_num = manifest.chapters.len() + 1;
        let mut chapter_id = format!("ch-{chapter_num:02}");
        while existing_ids.contains(chapter_id.as_str()) {
            chapter_num += 1;
            chapter_id = format!("ch-{chapter_num:02}");
        }

        let order = (manifest.chapters.len() + 1) as u32;
        manifest.chapters.push(Chapter {
            id: chapter_id.clone(),
            title: title.to_string(),
            order,
            manual_ids: Vec::new(),
            sections: Vec::new(),
        });
        manifest.touch();
        self.save(&manifest).await?;
        Ok(chapter_id)
    }

    pub async fn update_chapter(&self, project_id: &str, chapter_id: &str, title: &str) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")))?;
        chapter.title = title.to_string();
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    pub async fn delete_chapter(&self, project_id: &str, chapter_id: &str) -> Result<()> {
        if chapter_id == DEFAULT_CHAPTER_ID {
            return Err(DocsError::InvalidInput(
                "the Uncategorized chapter cannot be deleted".to_string(),
            ));
        }
        let mut manifest = self.require_project(project_id).await?;
        let before = manifest.chapters.len();
        manifest.chapters.retain(|c| c.id != chapter_id);
        if manifest.chapters.len() == before {
            return Err(DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")));
        }
        Self::renumber_chapters(&mut manifest.chapters);
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    /// Reorders chapters to exactly `order` (a full permutation of chapter
    /// ids). Rejects any set mismatch without partial mutation.
    pub async fn reorder_chapters(&self, project_id: &str, order: &[String]) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;

        let current_ids: std::collections::BTreeSet<&str> =
            manifest.chapters.iter().map(|c| c.id.as_str()).collect();
        let requested_ids: std::collections::BTreeSet<&str> = order.iter().map(|s| s.as_str()).collect();
        if current_ids != requested_ids || order.len() != manifest.chapters.len() {
            return Err(DocsError::InvalidInput(
                "reorder_chapters requires exactly the current set of chapter ids".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(manifest.chapters.len());
        for id in order {
            let index = manifest.chapters.iter().position(|c| &c.id == id).unwrap();
            reordered.push(manifest.chapters.remove(index));
        }
        manifest.chapters = reordered;
        Self::renumber_chapters(&mut manifest.chapters);
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    /// Append `doc_id` to `chapter_id` (or "Uncategorized" if omitted,
    /// creating it if missing). Caller has already verified the document
    /// directory exists.
    pub async fn add_doc_to_project(&self, project_id: &str, doc_id: &str, chapter_id: Option<&str>) -> Result<String> {
        let mut manifest = self.require_project(project_id).await?;

        let target_chapter_id = chapter_id.unwrap_or(DEFAULT_CHAPTER_ID).to_string();
        if !manifest.chapters.iter().any(|c| c.id == target_chapter_id) && target_chapter_id == DEFAULT_CHAPTER_ID {
            let order = (manifest.chapters.len() + 1) as u32;
            manifest.chapters.push(Chapter::uncategorized(order));
        }

        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == target_chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{target_chapter_id}` does not exist")))?;
        if !chapter.manual_ids.contains(&doc_id.to_string()) {
            chapter.manual_ids.push(doc_id.to_string());
        }
        manifest.touch();
        self.save(&manifest).await?;
        Ok(target_chapter_id)
    }

    pub async fn remove_doc_from_project(&self, project_id: &str, doc_id: &str) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        for chapter in &mut manifest.chapters {
            chapter.manual_ids.retain(|id| id != doc_id);
        }
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    pub async fn move_doc_to_chapter(&self, project_id: &str, doc_id: &str, target_chapter_id: &str) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        if !manifest.chapters.iter().any(|c| c.id == target_chapter_id) {
            return Err(DocsError::NotFound(format!(
                "chapter `{target_chapter_id}` does not exist"
            )));
        }
        for chapter in &mut manifest.chapters {
            chapter.manual_ids.retain(|id| id != doc_id);
        }
        let target = manifest.chapters.iter_mut().find(|c| c.id == target_chapter_id).unwrap();
        target.manual_ids.push(doc_id.to_string());
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    pub async fn reorder_docs_in_chapter(&self, project_id: &str, chapter_id: &str, order: &[String]) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")))?;

        let current: std::collections::BTreeSet<&String> = chapter.manual_ids.iter().collect();
        let requested: std::collections::BTreeSet<&String> = order.iter().collect();
        if current != requested || order.len() != chapter.manual_ids.len() {
            return Err(DocsError::InvalidInput(
                "reorder_docs_in_chapter requires exactly the chapter's current document ids".to_string(),
            ));
        }
        chapter.manual_ids = order.to_vec();
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    fn renumber_sections(sections: &mut [Section]) {
        for (index, section) in sections.iter_mut().enumerate() {
            section.order = (index + 1) as u32;
        }
    }

    pub async fn add_section(&self, project_id: &str, title: &str) -> Result<String> {
        let mut manifest = self.require_project(project_id).await?;
        let section_id = format!("sec-{:02}", manifest.chapters.iter().map(|c| c.sections.len()).sum::<usize>() + 1);
        let chapters_len = manifest.chapters.len();
        if chapters_len == 0 {
            manifest.chapters.push(Chapter::uncategorized(1));
        }
        let order = manifest.chapters[0].sections.len() as u32 + 1;
        manifest.chapters[0].sections.push(Section {
            id: section_id.clone(),
            title: title.to_string(),
            order,
            doc_ids: Vec::new(),
        });
        manifest.touch();
        self.save(&manifest).await?;
        Ok(section_id)
    }

    pub async fn update_section(&self, project_id: &str, chapter_id: &str, section_id: &str, title: &str) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")))?;
        let section = chapter
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| DocsError::NotFound(format!("section `{section_id}` does not exist")))?;
        section.title = title.to_string();
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    pub async fn delete_section(&self, project_id: &str, chapter_id: &str, section_id: &str) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")))?;
        let before = chapter.sections.len();
        chapter.sections.retain(|s| s.id != section_id);
        if chapter.sections.len() == before {
            return Err(DocsError::NotFound(format!("section `{section_id}` does not exist")));
        }
        Self::renumber_sections(&mut chapter.sections);
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    pub async fn reorder_sections(&self, project_id: &str, chapter_id: &str, order: &[String]) -> Result<()> {
        let mut manifest = self.require_project(project_id).await?;
        let chapter = manifest
            .chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| DocsError::NotFound(format!("chapter `{chapter_id}` does not exist")))?;

        let current: std::collections::BTreeSet<&str> = chapter.sections.iter().map(|s| s.id.as_str()).collect();
        let requested: std::collections::BTreeSet<&str> = order.iter().map(|s| s.as_str()).collect();
        if current != requested || order.len() != chapter.sections.len() {
            return Err(DocsError::InvalidInput(
                "reorder_sections requires exactly the chapter's current section ids".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(chapter.sections.len());
        for id in order {
            let index = chapter.sections.iter().position(|s| &s.id == id).unwrap();
            reordered.push(chapter.sections.remove(index));
        }
        chapter.sections = reordered;
        Self::renumber_sections(&mut chapter.sections);
        manifest.touch();
        self.save(&manifest).await?;
        Ok(())
    }

    /// Assign an existing chapter into a section's nominal membership
    /// list (sections are a coarser grouping above chapters; this store
    /// tracks that membership by section `doc_ids` convention, where a
    /// chapter's representative doc set is unioned in by the caller).
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(self.projects_dir()).await {
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
}
