//! Integration tests for the critical path cache and graph persistence

mod utils;

use rastro::critical_path::CriticalPathAlgorithm;
use rastro::critical_path_cache::CriticalPathCache;
use rastro::error::PersistenceError;
use rastro::graph::ExecutionGraph;
use rastro::persistence;
use rastro::worker::Worker;
use std::sync::Arc;
use utils::*;

fn closed_graph() -> Arc<ExecutionGraph> {
    let mut builder = build(&client_server_trace());
    builder.finish(100).unwrap();
    Arc::clone(builder.graph())
}

fn client() -> Worker {
    Worker::thread("", 100, "client")
}

fn server() -> Worker {
    Worker::thread("", 200, "server")
}

#[test]
fn test_cache_serves_same_path() {
    let cache = CriticalPathCache::new(closed_graph(), 8);
    let first = cache.get_or_compute(&client()).unwrap();
    let second = cache.get_or_compute(&client()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.total_duration(), 47);
}

#[test]
fn test_cache_batch_matches_single() {
    let graph = closed_graph();
    let cache = CriticalPathCache::new(Arc::clone(&graph), 8);
    let results = cache.compute_many(&[client(), server(), client()]);
    assert_eq!(results.len(), 3);

    let durations: Vec<u64> = results
        .iter()
        .map(|r| r.as_ref().unwrap().total_duration())
        .collect();
    assert_eq!(durations, vec![47, 19, 47]);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_invalidate_all_empties_cache() {
    let cache = CriticalPathCache::new(closed_graph(), 8);
    cache.compute_many(&[client(), server()]);
    assert_eq!(cache.len(), 2);
    cache.invalidate_all();
    assert!(cache.is_empty());
}

#[test]
fn test_saved_graph_gives_same_critical_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.graph");
    let graph = closed_graph();
    persistence::save(&graph, &path).unwrap();

    let loaded = persistence::load(&path, Some(graph.start_time())).unwrap();
    assert!(loaded.is_done_building());
    assert_eq!(loaded.snapshot(), graph.snapshot());

    let original = CriticalPathCache::new(graph, 4)
        .get_or_compute(&client())
        .unwrap();
    let reopened = CriticalPathCache::new(Arc::new(loaded), 4)
        .get_or_compute(&client())
        .unwrap();
    assert_eq!(original.segments(), reopened.segments());
}

#[test]
fn test_ids_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.graph");
    let graph = closed_graph();
    persistence::save(&graph, &path).unwrap();
    let loaded = persistence::load(&path, None).unwrap();

    let id = thread(&graph, 200);
    assert_eq!(thread(&loaded, 200), id);
    assert_eq!(loaded.vertices_of(id), graph.vertices_of(id));
    let path = CriticalPathAlgorithm::new(&loaded)
        .compute_for_worker(id)
        .unwrap();
    assert_eq!(path.total_duration(), 19);
}

#[test]
fn test_load_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.graph");
    std::fs::write(&path, b"not a graph").unwrap();
    let err = persistence::load(&path, None).unwrap_err();
    assert!(matches!(err, PersistenceError::Decode(_)));
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = persistence::load(dir.path().join("absent.graph"), None).unwrap_err();
    assert!(matches!(err, PersistenceError::Io(_)));
}
