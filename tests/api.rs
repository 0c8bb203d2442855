//! End-to-end lifecycle scenarios over an in-process context with stub
//! embedders: build, invalidate, supersede, fail, reload.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use common::{test_context, wait_for_build, MixedDimEmbedder, SlowEmbedder, StubEmbedder};
use corpusdb::error::Error;
use corpusdb::index::IndexerKind;
use corpusdb::lifecycle::IndexState;
use corpusdb::models::{ChunkCreate, DocumentCreate, LibraryCreate};
use corpusdb::persistence;

fn chunk(text: &str) -> ChunkCreate {
    ChunkCreate {
        id: None,
        document_id: None,
        text: text.to_string(),
        embedding: None,
        metadata: Default::default(),
    }
}

fn feline_library() -> LibraryCreate {
    LibraryCreate {
        id: None,
        name: "animals".into(),
        metadata: Default::default(),
        documents: vec![DocumentCreate {
            id: None,
            library_id: None,
            name: "notes".into(),
            metadata: Default::default(),
            chunks: vec![
                chunk("the cat sat"),
                chunk("astronomy telescope"),
                chunk("kittens are small cats"),
            ],
        }],
    }
}

#[tokio::test]
async fn test_ball_tree_search_finds_felines() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx.store.create_library(feline_library()).unwrap();
    let doc = ctx.store.get_document(lib.document_ids[0]).unwrap();
    let cat_chunks = [doc.chunk_ids[0], doc.chunk_ids[2]];

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, Some(40))
        .unwrap();
    let status = wait_for_build(&ctx, lib.id).await;
    assert!(status.indexed, "build failed: {:?}", status.error);
    assert_eq!(status.indexer_type, Some(IndexerKind::BallTree));

    let results = ctx.lifecycle.search(lib.id, "felines", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(cat_chunks.contains(&results[0].chunk_id));
}

#[tokio::test]
async fn test_start_index_while_building_conflicts() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(
        tmp.path(),
        Arc::new(SlowEmbedder {
            delay: Duration::from_millis(300),
        }),
    );
    let lib = ctx.store.create_library(feline_library()).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    let err = ctx
        .lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyIndexing(_)));

    let status = wait_for_build(&ctx, lib.id).await;
    assert!(status.indexed);
}

#[tokio::test]
async fn test_parallel_builds_of_independent_libraries() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(
        tmp.path(),
        Arc::new(SlowEmbedder {
            delay: Duration::from_millis(50),
        }),
    );
    let l1 = ctx.store.create_library(feline_library()).unwrap();
    let mut other = feline_library();
    other.name = "animals-2".into();
    let l2 = ctx.store.create_library(other).unwrap();

    ctx.lifecycle
        .start_index(l1.id, IndexerKind::Exhaustive, None)
        .unwrap();
    ctx.lifecycle
        .start_index(l2.id, IndexerKind::BallTree, None)
        .unwrap();

    assert!(wait_for_build(&ctx, l1.id).await.indexed);
    assert!(wait_for_build(&ctx, l2.id).await.indexed);
}

#[tokio::test]
async fn test_mutation_invalidates_then_reindex_recovers() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx.store.create_library(feline_library()).unwrap();
    let doc = ctx.store.get_document(lib.document_ids[0]).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);

    ctx.store.delete_chunk(doc.chunk_ids[1]).unwrap();
    let err = ctx.lifecycle.search(lib.id, "telescope", 3).await.unwrap_err();
    assert!(matches!(err, Error::NotIndexed(_)));

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);
    let results = ctx.lifecycle.search(lib.id, "cats", 10).await.unwrap();
    assert_eq!(results.len(), 2);
    let ids: Vec<Uuid> = results.iter().map(|r| r.chunk_id).collect();
    assert!(ids.contains(&doc.chunk_ids[0]));
    assert!(ids.contains(&doc.chunk_ids[2]));
}

#[tokio::test]
async fn test_mixed_dimension_embeddings_fail_build() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(MixedDimEmbedder::new()));
    let lib = ctx.store.create_library(feline_library()).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    let status = wait_for_build(&ctx, lib.id).await;

    assert!(!status.indexed);
    assert_eq!(ctx.slots.get(lib.id).unwrap().state(), IndexState::Failed);
    let error = status.error.expect("error preserved in status");
    assert!(error.contains("dimension mismatch"), "got: {error}");
}

#[tokio::test]
async fn test_persist_restart_reload_then_reindex() {
    let tmp = TempDir::new().unwrap();
    let lib_id;
    {
        let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
        let lib = ctx.store.create_library(feline_library()).unwrap();
        lib_id = lib.id;
        persistence::save_library(&ctx.store, tmp.path(), lib.id).unwrap();
    }

    // "Restart": a fresh context over the same data directory.
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    ctx.bootstrap();

    let lib = ctx.store.get_library(lib_id).unwrap();
    assert_eq!(lib.document_ids.len(), 1);
    assert_eq!(ctx.store.library_chunk_count(lib_id).unwrap(), 3);
    assert_eq!(ctx.slots.get(lib_id).unwrap().state(), IndexState::Stale);

    ctx.lifecycle
        .start_index(lib_id, IndexerKind::Exhaustive, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib_id).await.indexed);
    let results = ctx.lifecycle.search(lib_id, "felines", 2).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_search_unindexed_library_is_gated() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx.store.create_library(feline_library()).unwrap();

    let err = ctx.lifecycle.search(lib.id, "cats", 3).await.unwrap_err();
    assert!(matches!(err, Error::NotIndexed(_)));
}

#[tokio::test]
async fn test_empty_library_indexes_and_searches_empty() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx
        .store
        .create_library(LibraryCreate {
            id: None,
            name: "empty".into(),
            metadata: Default::default(),
            documents: vec![],
        })
        .unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);

    let results = ctx.lifecycle.search(lib.id, "anything", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_top_k_beyond_count_returns_all() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx.store.create_library(feline_library()).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::Exhaustive, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);

    let results = ctx.lifecycle.search(lib.id, "cats", 100).await.unwrap();
    assert_eq!(results.len(), 3);
    for w in results.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[tokio::test]
async fn test_reindex_without_mutations_is_stable() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));
    let lib = ctx.store.create_library(feline_library()).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);
    let first: Vec<Uuid> = ctx
        .lifecycle
        .search(lib.id, "felines", 2)
        .await
        .unwrap()
        .iter()
        .map(|r| r.chunk_id)
        .collect();
    let first_count = ctx.slots.get(lib.id).unwrap().installed().unwrap().index.len();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);
    let second: Vec<Uuid> = ctx
        .lifecycle
        .search(lib.id, "felines", 2)
        .await
        .unwrap()
        .iter()
        .map(|r| r.chunk_id)
        .collect();
    let second_count = ctx.slots.get(lib.id).unwrap().installed().unwrap().index.len();

    assert_eq!(first_count, second_count);
    let set = |v: &[Uuid]| v.iter().copied().collect::<std::collections::HashSet<_>>();
    assert_eq!(set(&first), set(&second));
}

#[tokio::test]
async fn test_delete_library_during_build_discards_result() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(
        tmp.path(),
        Arc::new(SlowEmbedder {
            delay: Duration::from_millis(200),
        }),
    );
    let lib = ctx.store.create_library(feline_library()).unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, None)
        .unwrap();
    ctx.store.delete_library(lib.id).unwrap();

    // The worker finishes against a detached slot and discards its index.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(ctx.store.get_library(lib.id).is_err());
    assert!(ctx.slots.get(lib.id).is_none());
    assert!(matches!(
        ctx.lifecycle.status(lib.id).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_brute_force_and_ball_tree_agree() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(tmp.path(), Arc::new(StubEmbedder));

    let texts: Vec<String> = (0..60)
        .map(|i| format!("document number {i} about topic {}", i % 7))
        .collect();
    let lib = ctx
        .store
        .create_library(LibraryCreate {
            id: None,
            name: "corpus".into(),
            metadata: Default::default(),
            documents: vec![DocumentCreate {
                id: None,
                library_id: None,
                name: "doc".into(),
                metadata: Default::default(),
                chunks: texts.iter().map(|t| chunk(t)).collect(),
            }],
        })
        .unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::Exhaustive, None)
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);
    let flat = ctx.lifecycle.search(lib.id, "topic 3", 5).await.unwrap();

    ctx.lifecycle
        .start_index(lib.id, IndexerKind::BallTree, Some(8))
        .unwrap();
    assert!(wait_for_build(&ctx, lib.id).await.indexed);
    let tree = ctx.lifecycle.search(lib.id, "topic 3", 5).await.unwrap();

    let set = |v: &[corpusdb::models::SearchResult]| {
        v.iter().map(|r| r.chunk_id).collect::<std::collections::HashSet<_>>()
    };
    assert_eq!(set(&flat), set(&tree));
    for (a, b) in flat.iter().zip(tree.iter()) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}
