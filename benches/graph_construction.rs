//! Graph construction benchmark
//!
//! Feeds synthetic request/response traces to the graph builder.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench graph_construction
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rastro::builder::GraphBuilder;
use rastro::config::AnalysisConfig;
use rastro::event::TraceEvent;
use rastro::graph::ExecutionGraph;
use std::sync::Arc;

fn switch(ts: u64, cpu: u32, prev: i64, prev_state: i64, next: i64) -> TraceEvent {
    TraceEvent::new("sched_switch", ts, cpu)
        .with_field("prev_tid", prev)
        .with_field("prev_state", prev_state)
        .with_field("next_tid", next)
}

fn packet(name: &str, ts: u64, cpu: u32, seq: i64) -> TraceEvent {
    TraceEvent::new(name, ts, cpu)
        .with_field("seq", seq)
        .with_field("ack_seq", 1)
        .with_field("flags", 24)
}

/// `rounds` request/response exchanges between a client (cpu 0) and a
/// server (cpu 1), each answered through a NET_RX softirq
fn request_response_trace(rounds: u64) -> Vec<TraceEvent> {
    let mut events = vec![switch(0, 0, 0, 0, 100), switch(0, 1, 0, 0, 200)];
    for round in 0..rounds {
        let t = 1 + round * 100;
        let seq = round as i64;
        events.push(switch(t, 0, 100, 1, 0));
        events.push(packet("inet_sock_local_out", t + 20, 1, seq));
        events.push(TraceEvent::new("irq_softirq_entry", t + 30, 0).with_field("vec", 3));
        events.push(packet("inet_sock_local_in", t + 31, 0, seq));
        events.push(TraceEvent::new("sched_wakeup", t + 32, 0).with_field("tid", 100));
        events.push(TraceEvent::new("irq_softirq_exit", t + 33, 0).with_field("vec", 3));
        events.push(switch(t + 40, 0, 0, 0, 100));
    }
    events
}

fn build(events: &[TraceEvent]) -> Arc<ExecutionGraph> {
    let graph = Arc::new(ExecutionGraph::new(0));
    let mut builder = GraphBuilder::new(Arc::clone(&graph), &AnalysisConfig::default())
        .expect("default config is valid");
    for event in events {
        builder.handle_event(event);
    }
    graph
}

fn bench_graph_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_construction");
    for rounds in [100u64, 1_000, 10_000] {
        let events = request_response_trace(rounds);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &events, |b, events| {
            b.iter(|| black_box(build(events)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_graph_construction);
criterion_main!(benches);
