//! Concurrent access tests.
//!
//! Several reader threads search while a writer adds and deletes. Nothing
//! may deadlock, and every search must observe a consistent engine: hits
//! only ever carry the requested tag and come back sorted.

use std::sync::Arc;
use std::thread;

use docsearch::{Config, DistanceMetric, DocumentId, NewDocument, Payload, SearchEngine};

const DIM: usize = 8;

fn embedding(seed: usize) -> Vec<f32> {
    (0..DIM)
        .map(|i| (seed as f32 * 0.37 + i as f32 * 0.11).sin())
        .collect()
}

fn doc(i: usize) -> NewDocument {
    NewDocument {
        id: DocumentId::parse(format!("d{}", i)).unwrap(),
        vector: embedding(i),
        tag: if i % 2 == 0 { "even" } else { "odd" }.into(),
        payload: Payload::default(),
    }
}

#[test]
fn test_readers_and_writer_make_progress() {
    let engine = Arc::new(
        SearchEngine::open_in_memory(Config {
            exact_search_threshold: 0,
            ..Config::with_index(DIM, DistanceMetric::Cosine)
        })
        .unwrap(),
    );
    for i in 0..50 {
        engine.add_document(doc(i)).unwrap();
    }

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 50..250 {
                engine.add_document(doc(i)).unwrap();
                if i % 4 == 0 {
                    engine.delete_document(&format!("d{}", i - 40)).unwrap();
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for q in 0..100 {
                    let hits = engine
                        .search(&embedding(q * 7 + r), Some("odd"), 5)
                        .unwrap();
                    assert!(hits.len() <= 5);
                    assert!(hits.iter().all(|h| h.tag == "odd"));
                    for pair in hits.windows(2) {
                        assert!(pair[0].distance <= pair[1].distance);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let stats = engine.stats().unwrap();
    assert_eq!(stats.documents, engine.len().unwrap());
    assert!(stats.tombstone_ratio <= engine.config().compaction_threshold);
}

#[test]
fn test_concurrent_writers_serialize() {
    let engine = Arc::new(
        SearchEngine::open_in_memory(Config::with_index(DIM, DistanceMetric::L2)).unwrap(),
    );

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    engine.add_document(doc(w * 25 + i)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(engine.len().unwrap(), 100);
    let stats = engine.stats().unwrap();
    assert_eq!(stats.nodes, 100);
    assert_eq!(stats.store_version, 100);
}
