// Integration Test Utilities
//
// Event constructors for synthetic kernel traces (LTTng naming)
#![allow(dead_code)]

use rastro::builder::GraphBuilder;
use rastro::config::AnalysisConfig;
use rastro::event::TraceEvent;
use rastro::graph::{ExecutionGraph, WorkerId};
use rastro::worker::{WorkerKey, WorkerKind};
use std::sync::Arc;

pub const NET_RX: i64 = 3;
pub const HRTIMER: i64 = 8;
pub const LOCAL_TIMER_VECTOR: i64 = 0xec;

pub fn switch(ts: u64, cpu: u32, prev: i64, prev_state: i64, next: i64) -> TraceEvent {
    TraceEvent::new("sched_switch", ts, cpu)
        .with_field("prev_tid", prev)
        .with_field("prev_state", prev_state)
        .with_field("next_tid", next)
}

/// Switch in `next`, naming it
pub fn switch_named(ts: u64, cpu: u32, prev: i64, prev_state: i64, next: i64, comm: &str) -> TraceEvent {
    switch(ts, cpu, prev, prev_state, next).with_field("next_comm", comm)
}

pub fn wakeup(ts: u64, cpu: u32, tid: i64) -> TraceEvent {
    TraceEvent::new("sched_wakeup", ts, cpu).with_field("tid", tid)
}

pub fn fork(ts: u64, cpu: u32, parent: i64, child: i64, comm: &str) -> TraceEvent {
    TraceEvent::new("sched_process_fork", ts, cpu)
        .with_field("parent_tid", parent)
        .with_field("child_tid", child)
        .with_field("child_comm", comm)
}

pub fn softirq_entry(ts: u64, cpu: u32, vec: i64) -> TraceEvent {
    TraceEvent::new("irq_softirq_entry", ts, cpu).with_field("vec", vec)
}

pub fn softirq_exit(ts: u64, cpu: u32, vec: i64) -> TraceEvent {
    TraceEvent::new("irq_softirq_exit", ts, cpu).with_field("vec", vec)
}

pub fn hrtimer_entry(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("timer_hrtimer_expire_entry", ts, cpu)
}

pub fn hrtimer_exit(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("timer_hrtimer_expire_exit", ts, cpu)
}

pub fn irq_entry(ts: u64, cpu: u32, irq: i64, name: &str) -> TraceEvent {
    TraceEvent::new("irq_handler_entry", ts, cpu)
        .with_field("irq", irq)
        .with_field("name", name)
}

pub fn irq_exit(ts: u64, cpu: u32, irq: i64) -> TraceEvent {
    TraceEvent::new("irq_handler_exit", ts, cpu).with_field("irq", irq)
}

pub fn local_timer_entry(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("x86_irq_vectors_local_timer_entry", ts, cpu)
        .with_field("vector", LOCAL_TIMER_VECTOR)
}

pub fn local_timer_exit(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("x86_irq_vectors_local_timer_exit", ts, cpu)
        .with_field("vector", LOCAL_TIMER_VECTOR)
}

pub fn reschedule_entry(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("x86_irq_vectors_reschedule_entry", ts, cpu).with_field("vector", 253)
}

pub fn reschedule_exit(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("x86_irq_vectors_reschedule_exit", ts, cpu).with_field("vector", 253)
}

pub fn packet_reception_entry(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("net_if_receive_skb_entry", ts, cpu)
}

pub fn packet_reception_exit(ts: u64, cpu: u32) -> TraceEvent {
    TraceEvent::new("net_if_receive_skb_exit", ts, cpu)
}

fn packet(name: &str, ts: u64, cpu: u32, seq: i64) -> TraceEvent {
    TraceEvent::new(name, ts, cpu)
        .with_field("seq", seq)
        .with_field("ack_seq", 1)
        .with_field("flags", 24)
}

pub fn net_send(ts: u64, cpu: u32, seq: i64) -> TraceEvent {
    packet("inet_sock_local_out", ts, cpu, seq)
}

pub fn net_receive(ts: u64, cpu: u32, seq: i64) -> TraceEvent {
    packet("inet_sock_local_in", ts, cpu, seq)
}

/// Feed `events` to a fresh builder, without closing the graph
pub fn build(events: &[TraceEvent]) -> GraphBuilder {
    let graph = Arc::new(ExecutionGraph::new(0));
    let mut builder = GraphBuilder::new(graph, &AnalysisConfig::default()).unwrap();
    for event in events {
        builder.handle_event(event);
    }
    builder
}

pub fn thread(graph: &ExecutionGraph, tid: i64) -> WorkerId {
    graph
        .find_worker(&WorkerKey {
            host: String::new(),
            kind: WorkerKind::Thread { tid },
        })
        .unwrap()
}

/// Client/server exchange on one host
///
/// The client (tid 100, cpu 0) blocks at 5. The server (tid 200, cpu 1)
/// sends a packet at 20; it is received in a NET_RX softirq on cpu 0 at 31,
/// which wakes the client at 32. The client runs again from 40 to 60.
pub fn client_server_trace() -> Vec<TraceEvent> {
    vec![
        switch_named(1, 0, 0, 0, 100, "client"),
        switch_named(1, 1, 0, 0, 200, "server"),
        switch(5, 0, 100, 1, 0),
        net_send(20, 1, 7),
        softirq_entry(30, 0, NET_RX),
        net_receive(31, 0, 7),
        wakeup(32, 0, 100),
        softirq_exit(33, 0, NET_RX),
        switch(40, 0, 0, 0, 100),
        switch(60, 0, 100, 0, 0),
    ]
}

/// JSON-lines rendering of `events`
pub fn to_jsonl(events: &[TraceEvent]) -> String {
    events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}
