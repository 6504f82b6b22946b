#![no_main]

use libfuzzer_sys::fuzz_target;
use rastro::builder::GraphBuilder;
use rastro::config::AnalysisConfig;
use rastro::critical_path::CriticalPathAlgorithm;
use rastro::event::read_events;
use rastro::graph::ExecutionGraph;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON lines must never panic the builder or the analysis
    let graph = Arc::new(ExecutionGraph::new(0));
    let Ok(mut builder) = GraphBuilder::new(Arc::clone(&graph), &AnalysisConfig::default()) else {
        return;
    };
    let mut end = 0;
    for event in read_events(data).flatten() {
        end = end.max(event.timestamp);
        builder.handle_event(&event);
    }
    if builder.finish(end).is_err() {
        return;
    }
    let algorithm = CriticalPathAlgorithm::new(&graph);
    for (id, _) in graph.workers() {
        let _ = algorithm.compute_for_worker(id);
    }
});
