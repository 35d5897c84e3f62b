//! End-to-end project/chapter scenarios, matching `spec.md` §8's named
//! cases (S3) plus the dense-ordering invariant (property 4) under a
//! mixed sequence of chapter and document mutations.

use tempfile::tempdir;

use vdocs_core::store::{ConflictPolicy, DocumentStore, ProjectStore};

#[tokio::test]
async fn s3_chapter_reorder_and_doc_placement() {
    let tmp = tempdir().unwrap();
    let docs = DocumentStore::new(tmp.path());
    let projects = ProjectStore::new(tmp.path());

    let project_id = projects.create_project("Tutorial Series", "desc", "en").await.unwrap();
    let intro = projects.add_chapter(&project_id, "Intro").await.unwrap();
    let setup = projects.add_chapter(&project_id, "Setup").await.unwrap();
    let advanced = projects.add_chapter(&project_id, "Advanced").await.unwrap();

    let (_, doc_id) = docs.create_doc("Episode One", ConflictPolicy::New).await.unwrap();
    projects.add_doc_to_project(&project_id, &doc_id, Some(&setup)).await.unwrap();

    projects
        .reorder_chapters(&project_id, &[advanced.clone(), intro.clone(), setup.clone()])
        .await
        .unwrap();

    let manifest = projects.get_project(&project_id).await.unwrap().unwrap();
    assert_eq!(manifest.chapters.iter().map(|c| c.order).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(manifest.chapters[0].id, advanced);
    assert_eq!(manifest.chapters[2].id, setup);
    assert!(manifest.chapters[2].manual_ids.contains(&doc_id));

    projects.move_doc_to_chapter(&project_id, &doc_id, &intro).await.unwrap();
    let manifest = projects.get_project(&project_id).await.unwrap().unwrap();
    let setup_chapter = manifest.chapters.iter().find(|c| c.id == setup).unwrap();
    let intro_chapter = manifest.chapters.iter().find(|c| c.id == intro).unwrap();
    assert!(!setup_chapter.manual_ids.contains(&doc_id));
    assert!(intro_chapter.manual_ids.contains(&doc_id));
}

#[tokio::test]
async fn chapter_order_stays_dense_across_deletes_and_reorders() {
    let tmp = tempdir().unwrap();
    let projects = ProjectStore::new(tmp.path());
    let project_id = projects.create_project("Course", "desc", "en").await.unwrap();

    let a = projects.add_chapter(&project_id, "a").await.unwrap();
    let _b = projects.add_chapter(&project_id, "b").await.unwrap();
    let c = projects.add_chapter(&project_id, "c").await.unwrap();
    let d = projects.add_chapter(&project_id, "d").await.unwrap();

    projects.delete_chapter(&project_id, &c).await.unwrap();
    projects
        .reorder_chapters(&project_id, &[d.clone(), a.clone()])
        .await
        .unwrap();

    let manifest = projects.get_project(&project_id).await.unwrap().unwrap();
    let orders: Vec<u32> = manifest.chapters.iter().map(|ch| ch.order).collect();
    assert_eq!(orders, vec![1, 2], "orders must stay a dense 1..N run with no gaps");
}

#[tokio::test]
async fn default_project_uncategorized_chapter_seeds_at_order_one() {
    let tmp = tempdir().unwrap();
    let docs = DocumentStore::new(tmp.path());
    let projects = ProjectStore::new(tmp.path());
    let manifest = projects.ensure_default_project().await.unwrap();

    let (_, doc_id) = docs.create_doc("Orphan Episode", ConflictPolicy::New).await.unwrap();
    let chapter_id = projects
        .add_doc_to_project(&manifest.project_id, &doc_id, None)
        .await
        .unwrap();
    assert_eq!(chapter_id, vdocs_core::models::project::DEFAULT_CHAPTER_ID);
}
