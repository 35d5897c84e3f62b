//! `project.json` schema, grounded on
//! `original_source/src/storage/project_storage.py`.
//!
//! The original seeds its initial "Uncategorized" chapter at `order: 0`;
//! `SPEC_FULL.md` §8 testable property #4 requires chapter order to form
//! a dense `1..N` sequence after any mutation, so `ensure_default_project`
//! here seeds at `order = 1` instead (recorded as a deliberate deviation
//! in `DESIGN.md`).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::document::VersionInfo;
use crate::models::share::ShareInfo;

pub const DEFAULT_PROJECT_ID: &str = "__default__";
pub const DEFAULT_CHAPTER_ID: &str = "__uncategorized__";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub doc_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manual_ids: Vec<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Chapter {
    pub fn uncategorized(order: u32) -> Self {
        Self {
            id: DEFAULT_CHAPTER_ID.to_string(),
            title: "Uncategorized".to_string(),
            order,
            description: String::new(),
            manual_ids: Vec::new(),
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportSettings {
    #[serde(default = "default_export_language")]
    pub default_language: String,
    #[serde(default)]
    pub include_table_of_contents: bool,
}

fn default_export_language() -> String {
    "en".to_string()
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_language: default_export_language(),
            include_table_of_contents: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectManifest {
    pub project_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub version: VersionInfo,
    #[serde(default)]
    pub tags_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub export_settings: ExportSettings,
    #[serde(default)]
    pub share: Option<ShareInfo>,
}

impl ProjectManifest {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = crate::utils::now_iso();
        Self {
            project_id: project_id.into(),
            title: title.into(),
            created_at: now.clone(),
            updated_at: now,
            is_default: false,
            description: String::new(),
            tags: BTreeSet::new(),
            template_id: None,
            chapters: Vec::new(),
            version: VersionInfo::default(),
            tags_index: BTreeMap::new(),
            export_settings: ExportSettings::default(),
            share: None,
        }
    }

    /// Idempotent seed used by `ensure_default_project`: a default project
    /// with one "Uncategorized" chapter at `order = 1`.
    pub fn default_seed() -> Self {
        let mut manifest = Self::new(DEFAULT_PROJECT_ID, "Default Project");
        manifest.is_default = true;
        manifest.chapters.push(Chapter::uncategorized(1));
        manifest
    }

    pub fn touch(&mut self) {
        self.updated_at = crate::utils::now_iso();
    }
}
