//! Resolves opaque share tokens to `(owner_user_id, target_id, language)`
//! by scanning every user's metadata under the data root.
//!
//! Grounded on `SPEC_FULL.md` §4.9: a full scan is acceptable at this
//! scale, but the interface is shaped so a reverse index could replace
//! the scan without changing callers — `resolve` is the only entry point
//! consumers use.

use std::path::{Path, PathBuf};

use base64::Engine;
use rand::RngCore;
use tokio::fs;

use crate::errors::Result;
use crate::models::document::DocumentMetadata;
use crate::models::project::ProjectManifest;
use crate::models::share::{ResolvedShare, ShareScope};

/// Generate a 256-bit, URL-safe, base64-encoded token via a CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub struct ShareTokenResolver {
    users_root: PathBuf,
}

impl ShareTokenResolver {
    pub fn new(users_root: impl Into<PathBuf>) -> Self {
        Self {
            users_root: users_root.into(),
        }
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.users_root).await {
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
        Ok(ids)
    }

    async fn read_json_or_skip<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
        let raw = fs::read_to_string(path).await.ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Scan every user's documents and projects for a matching share
    /// token. Read-only; corrupted metadata files are skipped rather than
    /// failing the whole scan.
    pub async fn resolve(&self, token: &str) -> Result<Option<ResolvedShare>> {
        for user_id in self.list_user_ids().await? {
            let docs_dir = self.users_root.join(&user_id).join("docs");
            let mut doc_entries = match fs::read_dir(&docs_dir).await {
                Ok(e) => e,
                Err(_) => continue,
            };
            while let Some(entry) = doc_entries.next_entry().await? {
                let metadata_path = entry.path().join("metadata.json");
                if let Some(metadata) = Self::read_json_or_skip::<DocumentMetadata>(&metadata_path).await {
                    if let Some(share) = &metadata.share {
                        if share.token == token {
                            let doc_id = entry.file_name().to_string_lossy().into_owned();
                            return Ok(Some(ResolvedShare {
                                owner_user_id: user_id,
                                target_id: doc_id,
                                language: share.language.clone(),
                                scope: ShareScope::Document,
                            }));
                        }
                    }
                }
            }

            let projects_dir = self.users_root.join(&user_id).join("projects");
            let mut project_entries = match fs::read_dir(&projects_dir).await {
                Ok(e) => e,
                Err(_) => continue,
            };
            while let Some(entry) = project_entries.next_entry().await? {
                let manifest_path = entry.path().join("project.json");
                if let Some(manifest) = Self::read_json_or_skip::<ProjectManifest>(&manifest_path).await {
                    if let Some(share) = &manifest.share {
                        if share.token == token {
                            return Ok(Some(ResolvedShare {
                                owner_user_id: user_id,
                                target_id: manifest.project_id,
                                language: share.language.clone(),
                                scope: ShareScope::Project,
                            }));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::share::ShareInfo;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolves_a_document_share_token() {
        let tmp = tempdir().unwrap();
        let user_docs = tmp.path().join("users").join("alice").join("docs").join("my-doc");
        fs::create_dir_all(&user_docs).await.unwrap();

        let mut metadata = DocumentMetadata::new("My Doc");
        metadata.share = Some(ShareInfo {
            token: "tok123".to_string(),
            language: "en".to_string(),
            created_at: crate::utils::now_iso(),
        });
        fs::write(
            user_docs.join("metadata.json"),
            serde_json::to_string(&metadata).unwrap(),
        )
        .await
        .unwrap();

        let resolver = ShareTokenResolver::new(tmp.path().join("users"));
        let resolved = resolver.resolve("tok123").await.unwrap().unwrap();
        assert_eq!(resolved.owner_user_id, "alice");
        assert_eq!(resolved.target_id, "my-doc");
        assert_eq!(resolved.scope, ShareScope::Document);
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("users")).await.unwrap();
        let resolver = ShareTokenResolver::new(tmp.path().join("users"));
        assert!(resolver.resolve("nonexistent").await.unwrap().is_none());
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
