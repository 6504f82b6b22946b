//! Saving and reopening execution graphs
//!
//! A graph is written as a MessagePack document (`rmp-serde`). The document
//! carries the layout version and the start time of the trace it was built
//! from; reopening a graph written by another layout version, or anchored at
//! another trace start, is refused.
//!
//! Vertex, edge and worker ids are preserved, so ids handed out before saving
//! stay valid after loading.

use crate::edge_state::EdgeContextState;
use crate::error::PersistenceError;
use crate::graph::{
    EdgeData, EdgeDirection, EdgeId, ExecutionGraph, Store, VertexData, VertexId, WorkerId,
    GRAPH_VERSION,
};
use crate::worker::Worker;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVertex {
    pub worker: u32,
    pub timestamp: u64,
    pub in_graph: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: u32,
    pub to: u32,
    /// [`EdgeContextState::code`]
    pub code: u8,
    pub qualifier: Option<String>,
    pub horizontal: bool,
}

/// Serializable image of an [`ExecutionGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub done: bool,
    pub workers: Vec<Worker>,
    pub vertices: Vec<SnapshotVertex>,
    /// Chain of each worker, by vertex index
    pub timelines: Vec<Vec<u32>>,
    pub edges: Vec<SnapshotEdge>,
}

impl ExecutionGraph {
    /// Copy of the whole graph
    pub fn snapshot(&self) -> GraphSnapshot {
        let store = self.read();
        GraphSnapshot {
            version: GRAPH_VERSION,
            start_time: self.start_time(),
            end_time: store.end_time,
            done: self.is_done_building(),
            workers: store.workers.iter().map(|w| Worker::clone(w)).collect(),
            vertices: store
                .vertices
                .iter()
                .map(|v| SnapshotVertex {
                    worker: v.worker.0,
                    timestamp: v.timestamp,
                    in_graph: v.in_graph,
                })
                .collect(),
            timelines: store
                .timelines
                .iter()
                .map(|t| t.iter().map(|v| v.0).collect())
                .collect(),
            edges: store
                .edges
                .iter()
                .map(|e| SnapshotEdge {
                    from: e.from.0,
                    to: e.to.0,
                    code: e.state.code(),
                    qualifier: e.qualifier.as_deref().map(str::to_string),
                    horizontal: e.horizontal,
                })
                .collect(),
        }
    }

    /// Rebuild a graph, checking the snapshot's internal consistency
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        if snapshot.version != GRAPH_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: GRAPH_VERSION,
                found: snapshot.version,
            });
        }
        let invalid = PersistenceError::Invalid;

        let mut store = Store::default();
        for worker in snapshot.workers {
            let id = WorkerId::from_index(store.workers.len());
            if store.worker_index.insert(worker.key(), id).is_some() {
                return Err(invalid(format!("worker {} listed twice", worker)));
            }
            store.workers.push(Arc::new(worker));
        }
        let worker_count = store.workers.len();

        for (index, v) in snapshot.vertices.iter().enumerate() {
            if v.worker as usize >= worker_count {
                return Err(invalid(format!("vertex v{} has unknown worker", index)));
            }
            store.vertices.push(VertexData {
                worker: WorkerId(v.worker),
                timestamp: v.timestamp,
                in_graph: v.in_graph,
                slots: [None; 4],
            });
        }

        if snapshot.timelines.len() != worker_count {
            return Err(invalid(format!(
                "{} timelines for {} workers",
                snapshot.timelines.len(),
                worker_count
            )));
        }
        for (worker, timeline) in snapshot.timelines.iter().enumerate() {
            let mut previous = None;
            for &raw in timeline {
                let data = store
                    .vertices
                    .get(raw as usize)
                    .ok_or_else(|| invalid(format!("unknown vertex v{} in timeline", raw)))?;
                if data.worker.index() != worker || !data.in_graph {
                    return Err(invalid(format!("vertex v{} misplaced in timeline w{}", raw, worker)));
                }
                if previous.is_some_and(|ts| data.timestamp < ts) {
                    return Err(invalid(format!("timeline w{} goes back in time at v{}", worker, raw)));
                }
                previous = Some(data.timestamp);
            }
            store
                .timelines
                .push(timeline.iter().map(|&raw| VertexId(raw)).collect());
        }

        for (index, e) in snapshot.edges.into_iter().enumerate() {
            let id = EdgeId::from_index(index);
            let (from, to) = (VertexId(e.from), VertexId(e.to));
            if from.index() >= store.vertices.len() || to.index() >= store.vertices.len() {
                return Err(invalid(format!("edge e{} has unknown endpoint", index)));
            }
            let (out_slot, in_slot) = EdgeDirection::slots_for(e.horizontal);
            for (vertex, direction) in [(from, out_slot), (to, in_slot)] {
                let slot = &mut store.vertices[vertex.index()].slots[direction.slot()];
                if slot.is_some() {
                    return Err(invalid(format!("{} slot of {} used twice", direction, vertex)));
                }
                *slot = Some(id);
            }
            store.edges.push(EdgeData {
                from,
                to,
                state: EdgeContextState::from_code(e.code),
                qualifier: e.qualifier.map(Arc::from),
                horizontal: e.horizontal,
            });
        }
        store.end_time = snapshot.end_time;

        Ok(ExecutionGraph::from_store(snapshot.start_time, store, snapshot.done))
    }
}

/// Write `graph` to `path`
pub fn save<P: AsRef<Path>>(graph: &ExecutionGraph, path: P) -> Result<()> {
    let path = path.as_ref();
    let snapshot = graph.snapshot();
    let mut writer = BufWriter::new(File::create(path)?);
    rmp_serde::encode::write_named(&mut writer, &snapshot)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        vertices = snapshot.vertices.len(),
        edges = snapshot.edges.len(),
        "graph saved"
    );
    Ok(())
}

/// Reopen a graph written by [`save`]
///
/// With `expected_start_time`, the graph must have been built from a trace
/// starting at that time.
pub fn load<P: AsRef<Path>>(path: P, expected_start_time: Option<u64>) -> Result<ExecutionGraph> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let snapshot: GraphSnapshot = rmp_serde::decode::from_read(reader)?;
    if let Some(expected) = expected_start_time {
        if snapshot.start_time != expected {
            return Err(PersistenceError::StartTimeMismatch {
                expected,
                found: snapshot.start_time,
            });
        }
    }
    let graph = ExecutionGraph::from_snapshot(snapshot)?;
    info!(path = %path.display(), vertices = graph.vertex_count(), "graph loaded");
    Ok(graph)
}
