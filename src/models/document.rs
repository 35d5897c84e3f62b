//! `metadata.json` schema for a Document, per `SPEC_FULL.md` §6.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::share::ShareInfo;
use crate::version::Version;

/// One entry in `version.history`: a past version that has (or once had)
/// an on-disk snapshot under `versions/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionHistoryEntry {
    pub version: Version,
    pub created_at: String,
    pub snapshot_dir: String,
    #[serde(default)]
    pub notes: String,
}

/// The mutable `version` subtree of a document or compilation's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub number: Version,
    #[serde(default)]
    pub history: Vec<VersionHistoryEntry>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            number: Version::INITIAL,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub version: VersionInfo,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub chapter_id: Option<String>,
    #[serde(default)]
    pub share: Option<ShareInfo>,
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        let now = crate::utils::now_iso();
        Self {
            title: title.into(),
            created_at: now.clone(),
            updated_at: now,
            version: VersionInfo::default(),
            tags: BTreeSet::new(),
            project_id: None,
            chapter_id: None,
            share: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = crate::utils::now_iso();
    }
}
