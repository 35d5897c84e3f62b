//! Content-addressable screenshot storage, one instance per document
//! (rooted at `docs/{doc_id}/.blob_store/`), so identical screenshots
//! across that document's version snapshots are stored once.
//!
//! Grounded on `original_source/src/storage/screenshot_store.py`: a flat
//! directory of `{hash}.{ext}` files, hashed by content (`BlobHash` /
//! `crate::hash`), with the extension probed on lookup since the hash
//! alone doesn't carry it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::errors::Result;
use crate::hash::BlobHash;

/// Extensions recognized as images and probed, in order, when locating a
/// stored blob by hash. Mirrors the original's `get_store_path` fallback
/// chain.
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One entry of a version's `screenshots.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenshotEntry {
    pub hash: BlobHash,
    pub size_bytes: u64,
    pub captured_at: String,
}

pub type ScreenshotManifest = std::collections::HashMap<String, ScreenshotEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreStats {
    pub blob_count: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| KNOWN_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn extension_of(path: &Path) -> &str {
        path.extension().and_then(|e| e.to_str()).unwrap_or("png")
    }

    /// Find the on-disk path for an already-stored hash, trying each known
    /// extension in turn. `None` means the blob isn't in the store.
    pub async fn locate(&self, hash: &BlobHash) -> Option<PathBuf> {
        for ext in KNOWN_EXTENSIONS {
            let candidate = self.root.join(format!("{hash}.{ext}"));
            if fs::metadata(&candidate).await.is_ok() {
                return Some(candidate);
            }
        }
        None
    }

    pub async fn exists(&self, hash: &BlobHash) -> bool {
        self.locate(hash).await.is_some()
    }

    /// Store the file at `source_path` under its content hash, deduping
    /// against an existing blob with the same hash.
    pub async fn store(&self, source_path: &Path) -> Result<BlobHash> {
        self.ensure_root().await?;
        let hash = BlobHash::of_file(source_path)?;
        if self.locate(&hash).await.is_none() {
            let ext = Self::extension_of(source_path);
            let dest = self.root.join(format!("{hash}.{ext}"));
            fs::copy(source_path, &dest).await?;
        }
        Ok(hash)
    }

    /// Store raw bytes (e.g. an inline image attachment decoded from
    /// base64) under their content hash.
    pub async fn store_bytes(&self, data: &[u8], ext: &str) -> Result<BlobHash> {
        self.ensure_root().await?;
        let hash = BlobHash::of_bytes(data);
        if self.locate(&hash).await.is_none() {
            let dest = self.root.join(format!("{hash}.{ext}"));
            fs::write(&dest, data).await?;
        }
        Ok(hash)
    }

    /// For every image file in `source_dir`, store it and record a
    /// `filename -> { hash, size_bytes, captured_at }` entry. Non-image
    /// files are skipped silently (spec §4.1).
    pub async fn snapshot(&self, source_dir: &Path) -> Result<ScreenshotManifest> {
        let mut manifest = ScreenshotManifest::new();
        let mut entries = match fs::read_dir(source_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(manifest),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() || !Self::is_image(&path) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let meta = entry.metadata().await?;
            let hash = self.store(&path).await?;
            manifest.insert(
                name.to_string(),
                ScreenshotEntry {
                    hash,
                    size_bytes: meta.len(),
                    captured_at: crate::utils::now_iso(),
                },
            );
        }
        Ok(manifest)
    }

    /// Materialize the files named in `manifest` into `dest_dir`. Missing
    /// blobs are skipped (logged, not fatal) per spec §4.1. Returns the
    /// filenames actually restored.
    pub async fn restore(
        &self,
        manifest: &ScreenshotManifest,
        dest_dir: &Path,
        overwrite: bool,
    ) -> Result<Vec<String>> {
        fs::create_dir_all(dest_dir).await?;
        let mut restored = Vec::new();
        for (name, entry) in manifest {
            let dest = dest_dir.join(name);
            if !overwrite && fs::metadata(&dest).await.is_ok() {
                continue;
            }
            let Some(source) = self.locate(&entry.hash).await else {
                warn!(hash = %entry.hash, filename = %name, "blob missing from store during restore");
                continue;
            };
            fs::copy(&source, &dest).await?;
            restored.push(name.clone());
        }
        Ok(restored)
    }

    /// Scan every `versions/*/screenshots.json` file under `versions_root`
    /// and collect the set of hashes any snapshot still references.
    pub async fn referenced_hashes_in_versions(&self, versions_root: &Path) -> Result<HashSet<BlobHash>> {
        let mut referenced = HashSet::new();
        let mut entries = match fs::read_dir(versions_root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(referenced),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let screenshots_json = entry.path().join("screenshots.json");
            let Ok(raw) = fs::read_to_string(&screenshots_json).await else {
                continue;
            };
            let Ok(manifest) = serde_json::from_str::<ScreenshotManifest>(&raw) else {
                continue;
            };
            referenced.extend(manifest.into_values().map(|e| e.hash));
        }
        Ok(referenced)
    }

    /// Hashes of whatever images currently sit in the working screenshots
    /// directory, without storing them.
    pub async fn hashes_of_dir(&self, dir: &Path) -> Result<HashSet<BlobHash>> {
        let mut hashes = HashSet::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(hashes),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && Self::is_image(&path) {
                hashes.insert(BlobHash::of_file(&path)?);
            }
        }
        Ok(hashes)
    }

    /// Every hash currently present in the store.
    pub async fn current_hashes(&self) -> Result<HashSet<BlobHash>> {
        let mut hashes = HashSet::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(hashes),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(hash) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<BlobHash>().ok())
            {
                hashes.insert(hash);
            }
        }
        Ok(hashes)
    }

    /// Remove blobs not present in `live_hashes`. Dry-run returns the list
    /// of hashes that would be deleted, without touching the filesystem.
    pub async fn gc(&self, live_hashes: &HashSet<BlobHash>, dry_run: bool) -> Result<Vec<BlobHash>> {
        let current = self.current_hashes().await?;
        let orphaned: Vec<BlobHash> = current.difference(live_hashes).copied().collect();
        if !dry_run {
            for hash in &orphaned {
                if let Some(path) = self.locate(hash).await {
                    fs::remove_file(path).await?;
                }
            }
        }
        Ok(orphaned)
    }

    pub async fn stats(&self) -> Result<BlobStoreStats> {
        let mut blob_count = 0usize;
        let mut total_bytes = 0u64;
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BlobStoreStats {
                    blob_count: 0,
                    total_bytes: 0,
                });
            }
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                blob_count += 1;
                total_bytes += meta.len();
            }
        }
        Ok(BlobStoreStats {
            blob_count,
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn write_png(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn store_dedups_identical_content() {
        let tmp = tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join(".blob_store"));
        let src_dir = tempdir().unwrap();
        let a = write_png(src_dir.path(), "a.png", b"same-bytes").await;
        let b = write_png(src_dir.path(), "b.png", b"same-bytes").await;

        let hash_a = store.store(&a).await.unwrap();
        let hash_b = store.store(&b).await.unwrap();
        assert_eq!(hash_a, hash_b);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.blob_count, 1);
    }

    #[tokio::test]
    async fn snapshot_skips_non_images() {
        let tmp = tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join(".blob_store"));
        let src_dir = tempdir().unwrap();
        write_png(src_dir.path(), "shot.png", b"pixels").await;
        fs::write(src_dir.path().join("notes.txt"), b"not an image")
            .await
            .unwrap();

        let manifest = store.snapshot(src_dir.path()).await.unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.contains_key("shot.png"));
    }

    #[tokio::test]
    async fn gc_removes_only_unreferenced() {
        let tmp = tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join(".blob_store"));
        let src_dir = tempdir().unwrap();
        let kept_src = write_png(src_dir.path(), "kept.png", b"keep-me").await;
        let orphan_src = write_png(src_dir.path(), "orphan.png", b"drop-me").await;

        let kept = store.store(&kept_src).await.unwrap();
        let orphan = store.store(&orphan_src).await.unwrap();

        let mut live = HashSet::new();
        live.insert(kept);

        let removed = store.gc(&live, false).await.unwrap();
        assert_eq!(removed, vec![orphan]);
        assert!(!store.exists(&orphan).await);
        assert!(store.exists(&kept).await);
    }

    #[tokio::test]
    async fn dry_run_gc_leaves_files_in_place() {
        let tmp = tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join(".blob_store"));
        let src_dir = tempdir().unwrap();
        let orphan_src = write_png(src_dir.path(), "orphan.png", b"drop-me").await;
        let orphan = store.store(&orphan_src).await.unwrap();

        let removed = store.gc(&HashSet::new(), true).await.unwrap();
        assert_eq!(removed, vec![orphan]);
        assert!(store.exists(&orphan).await);
    }
}
