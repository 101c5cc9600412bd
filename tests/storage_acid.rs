//! ACID and crash recovery tests at the engine level.
//!
//! # Crash Simulation
//!
//! We simulate a crash by dropping the `SearchEngine` without calling
//! `close()`. redb uses shadow paging (not a WAL), so the file is always
//! consistent: either a commit completed and its document is present, or
//! it didn't and the document is absent. Writes reach storage before the
//! in-memory index, so an acknowledged write is never lost.

use docsearch::{Config, DistanceMetric, DocumentId, NewDocument, Payload, SearchEngine, SyncMode};
use tempfile::tempdir;

fn open(path: &std::path::Path, sync_mode: SyncMode) -> SearchEngine {
    SearchEngine::open(
        path,
        Config {
            sync_mode,
            ..Config::with_index(4, DistanceMetric::L2)
        },
    )
    .unwrap()
}

fn doc(i: usize, tag: &str) -> NewDocument {
    NewDocument {
        id: DocumentId::parse(format!("doc-{}", i)).unwrap(),
        vector: vec![i as f32, 0.0, 1.0, -(i as f32)],
        tag: tag.into(),
        payload: Payload::with_content(format!("body {}", i)),
    }
}

#[test]
fn test_bulk_writes_survive_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bulk_crash.db");

    {
        let engine = open(&path, SyncMode::Normal);
        for i in 0..100 {
            engine.add_document(doc(i, "bulk")).unwrap();
        }
        // NO close() -- crash
    }

    let engine = open(&path, SyncMode::Normal);
    assert_eq!(engine.len().unwrap(), 100, "All 100 documents must survive crash");
    for i in 0..100 {
        assert!(
            engine.get_document(&format!("doc-{}", i)).unwrap().is_some(),
            "doc-{} must be present after crash",
            i
        );
    }
    assert_eq!(engine.metadata().unwrap().unwrap().store_version, 100);

    let hits = engine.search(&[42.0, 0.0, 1.0, -42.0], Some("bulk"), 1).unwrap();
    assert_eq!(hits[0].id.as_str(), "doc-42");
    engine.close().unwrap();
}

#[test]
fn test_multiple_crash_cycles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi_crash.db");

    {
        let engine = open(&path, SyncMode::Normal);
        engine.add_document(doc(1, "a")).unwrap();
    }

    {
        let engine = open(&path, SyncMode::Normal);
        assert!(engine.get_document("doc-1").unwrap().is_some());
        engine.add_document(doc(2, "b")).unwrap();
        engine.delete_document("doc-1").unwrap();
    }

    let engine = open(&path, SyncMode::Normal);
    assert!(engine.get_document("doc-1").unwrap().is_none());
    assert!(engine.get_document("doc-2").unwrap().is_some());
    assert_eq!(engine.tags().unwrap(), vec!["b".to_string()]);
    engine.close().unwrap();
}

#[test]
fn test_paranoid_mode_durability() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("paranoid.db");

    {
        let engine = open(&path, SyncMode::Paranoid);
        for i in 0..10 {
            engine.add_document(doc(i, "p")).unwrap();
        }
    }

    let engine = open(&path, SyncMode::Paranoid);
    assert_eq!(engine.len().unwrap(), 10);
    engine.close().unwrap();
}

#[test]
fn test_fast_mode_after_clean_close() {
    // Eventual durability only promises data after a later durable commit;
    // close() flushes the graph snapshot with one.
    let dir = tempdir().unwrap();
    let path = dir.path().join("fast.db");

    let engine = open(&path, SyncMode::Fast);
    for i in 0..10 {
        engine.add_document(doc(i, "f")).unwrap();
    }
    engine.close().unwrap();

    let engine = open(&path, SyncMode::Fast);
    assert_eq!(engine.len().unwrap(), 10);
    engine.close().unwrap();
}

#[test]
fn test_failed_write_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("atomic.db");

    {
        let engine = open(&path, SyncMode::Normal);
        engine.add_document(doc(1, "a")).unwrap();
        let bad = NewDocument {
            vector: vec![1.0],
            ..doc(2, "a")
        };
        assert!(engine.add_document(bad).is_err());
    }

    let engine = open(&path, SyncMode::Normal);
    assert_eq!(engine.len().unwrap(), 1);
    assert!(engine.get_document("doc-2").unwrap().is_none());
    assert_eq!(engine.metadata().unwrap().unwrap().store_version, 1);
    engine.close().unwrap();
}
