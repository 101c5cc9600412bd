//! Integration tests for the search engine.
//!
//! Tests the full stack: SearchEngine → TagFilter → HNSW search →
//! VectorStore payload join. Verifies ordering, tag isolation, deletion,
//! dimension validation and recall.

use docsearch::{
    Config, DistanceMetric, DocumentId, HnswConfig, NewDocument, Payload, ReturnFields,
    SearchEngine, SearchRequest,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Opens an in-memory engine that always uses the graph.
fn graph_engine(dimension: usize, metric: DistanceMetric) -> SearchEngine {
    SearchEngine::open_in_memory(Config {
        exact_search_threshold: 0,
        hnsw: HnswConfig {
            seed: Some(42),
            ..Default::default()
        },
        ..Config::with_index(dimension, metric)
    })
    .unwrap()
}

fn doc(id: &str, vector: Vec<f32>, tag: &str) -> NewDocument {
    NewDocument {
        id: DocumentId::parse(id).unwrap(),
        vector,
        tag: tag.into(),
        payload: Payload::with_content(format!("content of {}", id)),
    }
}

fn random_vectors(n: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_end_to_end_scenario() {
    let engine = graph_engine(3, DistanceMetric::Cosine);
    engine.add_document(doc("a", vec![1.0, 0.0, 0.0], "t")).unwrap();
    engine.add_document(doc("b", vec![0.0, 1.0, 0.0], "t")).unwrap();

    let hits = engine.search(&[0.9, 0.1, 0.0], Some("t"), 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "a");
    assert!((hits[0].score - 0.9939).abs() < 1e-3, "score {}", hits[0].score);
}

#[test]
fn test_tombstone_scenario() {
    let engine = graph_engine(3, DistanceMetric::Cosine);
    engine.add_document(doc("a", vec![1.0, 0.0, 0.0], "t")).unwrap();
    engine.add_document(doc("b", vec![0.0, 1.0, 0.0], "t")).unwrap();

    assert!(engine.delete_document("a").unwrap());

    let hits = engine.search(&[1.0, 0.0, 0.0], Some("t"), 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "b");
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_self_match_is_top_one() {
    let n = 300;
    let engine = graph_engine(16, DistanceMetric::Cosine);
    let vectors = random_vectors(n, 16, 7);
    for (i, v) in vectors.iter().enumerate() {
        engine.add_document(doc(&format!("d{}", i), v.clone(), "t")).unwrap();
    }

    for (i, v) in vectors.iter().enumerate() {
        let hits = engine
            .search_with(SearchRequest::new(v.clone(), 1).with_ef_search(n))
            .unwrap();
        assert_eq!(hits[0].id.as_str(), format!("d{}", i));
        assert!((hits[0].score - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_recall_survives_growth() {
    let engine = graph_engine(16, DistanceMetric::L2);
    let probe = vec![0.5f32; 16];
    engine.add_document(doc("probe", probe.clone(), "t")).unwrap();

    for (i, v) in random_vectors(400, 16, 11).into_iter().enumerate() {
        engine.add_document(doc(&format!("r{}", i), v, "t")).unwrap();
        if i % 100 == 99 {
            let hits = engine
                .search_with(SearchRequest::new(probe.clone(), 1).with_ef_search(512))
                .unwrap();
            assert_eq!(hits[0].id.as_str(), "probe", "after {} inserts", i + 1);
            assert_eq!(hits[0].distance, 0.0);
        }
    }
}

#[test]
fn test_tag_isolation() {
    let engine = graph_engine(8, DistanceMetric::Cosine);
    let vectors = random_vectors(200, 8, 3);
    for (i, v) in vectors.iter().enumerate() {
        let tag = if i % 2 == 0 { "x" } else { "y" };
        engine.add_document(doc(&format!("d{}", i), v.clone(), tag)).unwrap();
    }

    // Query with the exact vector of a "y" document, filtered to "x"
    for i in (1..200).step_by(20) {
        let hits = engine.search(&vectors[i], Some("x"), 10).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|h| h.tag == "x"));
        assert!(hits.iter().all(|h| h.id.as_str() != format!("d{}", i)));
    }
}

#[test]
fn test_results_sorted_and_bounded() {
    let engine = graph_engine(8, DistanceMetric::Dot);
    for (i, v) in random_vectors(50, 8, 5).into_iter().enumerate() {
        engine.add_document(doc(&format!("d{}", i), v, "t")).unwrap();
    }

    let hits = engine.search(&[0.3; 8], None, 7).unwrap();
    assert_eq!(hits.len(), 7);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
        assert!(pair[0].distance <= pair[1].distance);
    }

    // k above the population returns everything
    assert_eq!(engine.search(&[0.3; 8], None, 500).unwrap().len(), 50);
}

#[test]
fn test_ties_keep_insertion_order() {
    let engine = graph_engine(2, DistanceMetric::L2);
    for id in ["first", "second", "third"] {
        engine.add_document(doc(id, vec![1.0, 1.0], "t")).unwrap();
    }

    let hits = engine.search(&[1.0, 1.0], Some("t"), 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[test]
fn test_dimension_mismatch_leaves_engine_unchanged() {
    let engine = graph_engine(3, DistanceMetric::Cosine);
    engine.add_document(doc("a", vec![1.0, 0.0, 0.0], "t")).unwrap();
    let before = engine.stats().unwrap();

    let err = engine.add_document(doc("b", vec![1.0, 0.0], "u")).unwrap_err();
    assert!(err.is_dimension_mismatch());

    assert_eq!(engine.stats().unwrap(), before);
    assert!(engine.get_document("b").unwrap().is_none());
    assert_eq!(engine.tags().unwrap(), vec!["t".to_string()]);
}

#[test]
fn test_exact_and_graph_paths_agree() {
    let vectors = random_vectors(40, 8, 9);
    let exact = SearchEngine::open_in_memory(Config::with_index(8, DistanceMetric::Cosine)).unwrap();
    let graph = graph_engine(8, DistanceMetric::Cosine);
    for (i, v) in vectors.iter().enumerate() {
        exact.add_document(doc(&format!("d{}", i), v.clone(), "t")).unwrap();
        graph.add_document(doc(&format!("d{}", i), v.clone(), "t")).unwrap();
    }

    let query = vec![0.1f32; 8];
    let a = exact.search(&query, Some("t"), 5).unwrap();
    let b = graph
        .search_with(SearchRequest::new(query.clone(), 5).with_tag("t").with_ef_search(64))
        .unwrap();
    let ids = |hits: &[docsearch::SearchHit]| -> Vec<String> {
        hits.iter().map(|h| h.id.to_string()).collect()
    };
    assert_eq!(ids(&a), ids(&b));
}

#[test]
fn test_huge_k_returns_every_document() {
    let vectors = random_vectors(10, 4, 13);
    let graph = graph_engine(4, DistanceMetric::Cosine);
    let exact = SearchEngine::open_in_memory(Config::with_index(4, DistanceMetric::Cosine)).unwrap();
    for (i, v) in vectors.iter().enumerate() {
        let tag = if i % 2 == 0 { "even" } else { "odd" };
        graph.add_document(doc(&format!("d{}", i), v.clone(), tag)).unwrap();
        exact.add_document(doc(&format!("d{}", i), v.clone(), tag)).unwrap();
    }

    for engine in [&graph, &exact] {
        for k in [usize::MAX, 1_000_000_000] {
            assert_eq!(engine.search(&vectors[0], None, k).unwrap().len(), 10);
            assert_eq!(engine.search(&vectors[0], Some("odd"), k).unwrap().len(), 5);
        }
        let request = SearchRequest::new(vectors[0].clone(), usize::MAX).with_ef_search(usize::MAX);
        assert_eq!(engine.search_with(request).unwrap().len(), 10);
    }
}

#[test]
fn test_return_fields_projection() {
    let engine = graph_engine(2, DistanceMetric::Cosine);
    engine
        .add_document(NewDocument {
            id: DocumentId::parse("a").unwrap(),
            vector: vec![1.0, 0.0],
            tag: "t".into(),
            payload: Payload::with_content("body").with_extra("lang", "en"),
        })
        .unwrap();

    let hits = engine
        .search_with(
            SearchRequest::new(vec![1.0, 0.0], 1).with_fields(ReturnFields::only(["lang"])),
        )
        .unwrap();
    assert_eq!(hits[0].payload.field("lang"), Some("en"));
    assert!(hits[0].payload.content.is_none());

    let hits = engine
        .search_with(SearchRequest::new(vec![1.0, 0.0], 1).with_fields(ReturnFields::None))
        .unwrap();
    assert!(hits[0].payload.is_empty());
}

#[test]
fn test_unknown_and_emptied_tags_return_nothing() {
    let engine = graph_engine(2, DistanceMetric::Cosine);
    engine.add_document(doc("a", vec![1.0, 0.0], "gone")).unwrap();
    engine.delete_document("a").unwrap();

    assert!(engine.search(&[1.0, 0.0], Some("gone"), 3).unwrap().is_empty());
    assert!(engine.search(&[1.0, 0.0], Some("never"), 3).unwrap().is_empty());
    assert!(engine.search(&[1.0, 0.0], None, 3).unwrap().is_empty());
}

#[test]
fn test_compaction_preserves_results() {
    let engine = SearchEngine::open_in_memory(Config {
        exact_search_threshold: 0,
        compaction_threshold: 1.0,
        hnsw: HnswConfig {
            seed: Some(1),
            ..Default::default()
        },
        ..Config::with_index(8, DistanceMetric::L2)
    })
    .unwrap();
    let vectors = random_vectors(200, 8, 21);
    for (i, v) in vectors.iter().enumerate() {
        engine.add_document(doc(&format!("d{}", i), v.clone(), "t")).unwrap();
    }
    for i in (0..200).step_by(3) {
        engine.delete_document(&format!("d{}", i)).unwrap();
    }
    assert_eq!(engine.compact().unwrap(), 67);

    for (i, v) in vectors.iter().enumerate().filter(|(i, _)| i % 3 != 0) {
        let hits = engine
            .search_with(SearchRequest::new(v.clone(), 1).with_ef_search(256))
            .unwrap();
        assert_eq!(hits[0].id.as_str(), format!("d{}", i));
    }
}
