//! End-to-end document versioning scenarios, matching `spec.md` §8's
//! named cases (S1, S2, S5).

use std::collections::HashSet;

use tempfile::tempdir;
use tokio::fs;

use vdocs_core::store::document_version_store::DocumentVersionStore;
use vdocs_core::store::{ConflictPolicy, DocumentStore};
use vdocs_core::version::{BumpKind, Version};

async fn write_screenshot(docs: &DocumentStore, doc_id: &str, filename: &str, bytes: &[u8]) {
    let dir = docs.doc_dir(doc_id).join("screenshots");
    fs::create_dir_all(&dir).await.unwrap();
    fs::write(dir.join(filename), bytes).await.unwrap();
}

#[tokio::test]
async fn s1_auto_patch_round_trip() {
    let tmp = tempdir().unwrap();
    let docs = DocumentStore::new(tmp.path());
    let (_, doc_id) = docs.create_doc("S1 video", ConflictPolicy::New).await.unwrap();
    docs.put_content(&doc_id, "en", "# A").await.unwrap();
    write_screenshot(&docs, &doc_id, "x.png", b"pixel-data").await;

    let versions = DocumentVersionStore::new(&docs, &doc_id);
    let bumped = versions.auto_patch("edit").await.unwrap();
    assert_eq!(bumped, Some("1.0.1".parse::<Version>().unwrap()));

    docs.put_content(&doc_id, "en", "# B").await.unwrap();

    let metadata = docs.get_metadata(&doc_id).await.unwrap().unwrap();
    assert_eq!(metadata.version.number, "1.0.1".parse::<Version>().unwrap());

    let snapshot_doc = docs.doc_dir(&doc_id).join("versions").join("v1.0.0").join("en").join("doc.md");
    let content = fs::read_to_string(&snapshot_doc).await.unwrap();
    assert_eq!(content, "# A");

    let manifest_raw = fs::read_to_string(
        docs.doc_dir(&doc_id)
            .join("versions")
            .join("v1.0.0")
            .join("screenshots.json"),
    )
    .await
    .unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest_raw).unwrap();
    assert!(manifest.get("x.png").is_some());

    let blob_dir = docs.doc_dir(&doc_id).join(".blob_store");
    let mut entries = fs::read_dir(&blob_dir).await.unwrap();
    let mut blob_count = 0;
    while entries.next_entry().await.unwrap().is_some() {
        blob_count += 1;
    }
    assert_eq!(blob_count, 1);
}

#[tokio::test]
async fn s2_restore_after_minor_bump() {
    let tmp = tempdir().unwrap();
    let docs = DocumentStore::new(tmp.path());
    let (_, doc_id) = docs.create_doc("S2 video", ConflictPolicy::New).await.unwrap();
    docs.put_content(&doc_id, "en", "C0").await.unwrap();

    let versions = DocumentVersionStore::new(&docs, &doc_id);

    docs.put_content(&doc_id, "en", "C1").await.unwrap();
    let after_bump = versions.bump(BumpKind::Minor, "v1.1").await.unwrap();
    assert_eq!(after_bump, "1.1.0".parse::<Version>().unwrap());

    docs.put_content(&doc_id, "en", "C2").await.unwrap();
    let restored = versions.restore("1.0.0".parse().unwrap(), "en").await.unwrap();
    assert!(restored);

    let content = docs.get_content(&doc_id, "en").await.unwrap();
    assert_eq!(content.as_deref(), Some("C0"));

    let history = versions.list().await.unwrap();
    let history_versions: HashSet<Version> = history.iter().map(|v| v.version).collect();
    assert!(history_versions.contains(&"1.0.0".parse::<Version>().unwrap()));
    assert!(history_versions.contains(&"1.1.0".parse::<Version>().unwrap()));
}

#[tokio::test]
async fn s5_gc_removes_blobs_orphaned_by_pruned_snapshots() {
    let tmp = tempdir().unwrap();
    let docs = DocumentStore::new(tmp.path());
    let (_, doc_id) = docs.create_doc("S5 video", ConflictPolicy::New).await.unwrap();
    docs.put_content(&doc_id, "en", "v0").await.unwrap();

    let versions = DocumentVersionStore::new(&docs, &doc_id);

    write_screenshot(&docs, &doc_id, "old.png", b"old-only").await;
    versions.auto_patch("snap-1").await.unwrap();

    fs::remove_file(docs.doc_dir(&doc_id).join("screenshots").join("old.png"))
        .await
        .unwrap();
    write_screenshot(&docs, &doc_id, "new.png", b"new-only").await;
    docs.put_content(&doc_id, "en", "v1").await.unwrap();
    versions.auto_patch("snap-2").await.unwrap();
    docs.put_content(&doc_id, "en", "v2").await.unwrap();

    let removed = versions.gc(1).await.unwrap();
    assert_eq!(removed.len(), 1, "the blob unique to the pruned snapshot should be collected");

    let history = versions.list().await.unwrap();
    assert_eq!(history.len(), 1, "gc(1) keeps only the single newest history entry");
}
