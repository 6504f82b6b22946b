//! Execution graph store
//!
//! The graph keeps one time-ordered chain of vertices per worker. Consecutive
//! vertices of a worker are joined by *horizontal* edges; *vertical* edges
//! join vertices of different workers and express causality (wakeups,
//! interrupts, network messages).
//!
//! ```text
//! worker A   o────RUNNING────o────BLOCKED─────o
//!                                             ^
//!                                             │ NETWORK
//!                                             │
//! worker B        o───────RUNNING─────────────o
//! ```
//!
//! # Storage
//!
//! Vertices and edges live in arenas and are referenced by [`VertexId`],
//! [`EdgeId`] and [`WorkerId`] indices. A vertex has four edge slots (one per
//! [`EdgeDirection`]). The whole store sits behind an `RwLock`, so analyses may
//! query a graph while the builder is still growing it; a lookup that misses
//! simply returns `None`.
//!
//! # Lifecycle
//!
//! ```text
//! new(start) ──mutations──> close_graph(end) ──queries──> dispose()
//! ```
//!
//! After [`ExecutionGraph::close_graph`] every mutation fails with
//! [`GraphError::Closed`]. Disposing a graph that is being traversed is the
//! caller's responsibility to prevent.

pub mod traverse;

use crate::edge_state::EdgeContextState;
use crate::error::GraphError;
use crate::worker::{Worker, WorkerKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{trace, warn};

pub use traverse::{GraphVisitor, ScanLine, TraversalEvent};

/// Version tag of the graph layout, checked when a saved graph is reopened
pub const GRAPH_VERSION: u32 = 1;

/// Result type for graph store operations
pub type Result<T> = std::result::Result<T, GraphError>;

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(VertexId, "v");
arena_id!(EdgeId, "e");
arena_id!(WorkerId, "w");

/// One of the four edge slots of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDirection {
    OutgoingVertical,
    IncomingVertical,
    OutgoingHorizontal,
    IncomingHorizontal,
}

impl EdgeDirection {
    pub const ALL: [EdgeDirection; 4] = [
        EdgeDirection::OutgoingVertical,
        EdgeDirection::IncomingVertical,
        EdgeDirection::OutgoingHorizontal,
        EdgeDirection::IncomingHorizontal,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            EdgeDirection::OutgoingVertical => 0,
            EdgeDirection::IncomingVertical => 1,
            EdgeDirection::OutgoingHorizontal => 2,
            EdgeDirection::IncomingHorizontal => 3,
        }
    }

    /// Slots written by an edge: (slot on origin, slot on destination)
    pub(crate) fn slots_for(horizontal: bool) -> (EdgeDirection, EdgeDirection) {
        if horizontal {
            (
                EdgeDirection::OutgoingHorizontal,
                EdgeDirection::IncomingHorizontal,
            )
        } else {
            (
                EdgeDirection::OutgoingVertical,
                EdgeDirection::IncomingVertical,
            )
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeDirection::OutgoingVertical => "outgoing vertical",
            EdgeDirection::IncomingVertical => "incoming vertical",
            EdgeDirection::OutgoingHorizontal => "outgoing horizontal",
            EdgeDirection::IncomingHorizontal => "incoming horizontal",
        };
        f.write_str(name)
    }
}

/// Snapshot of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub id: VertexId,
    pub worker: WorkerId,
    pub timestamp: u64,
}

/// Snapshot of an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: VertexId,
    pub to: VertexId,
    pub state: EdgeContextState,
    /// Free-text diagnostic label
    pub qualifier: Option<Arc<str>>,
    pub horizontal: bool,
    /// Destination timestamp minus origin timestamp
    pub duration: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct VertexData {
    pub(crate) worker: WorkerId,
    pub(crate) timestamp: u64,
    pub(crate) in_graph: bool,
    pub(crate) slots: [Option<EdgeId>; 4],
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeData {
    pub(crate) from: VertexId,
    pub(crate) to: VertexId,
    pub(crate) state: EdgeContextState,
    pub(crate) qualifier: Option<Arc<str>>,
    pub(crate) horizontal: bool,
}

/// Arena storage guarded by the graph's lock
#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) workers: Vec<Arc<Worker>>,
    pub(crate) worker_index: HashMap<WorkerKey, WorkerId>,
    /// Per worker, the vertices of its chain in timestamp order
    pub(crate) timelines: Vec<Vec<VertexId>>,
    pub(crate) vertices: Vec<VertexData>,
    pub(crate) edges: Vec<EdgeData>,
    pub(crate) end_time: Option<u64>,
}

impl Store {
    fn vertex(&self, id: VertexId) -> Result<&VertexData> {
        self.vertices
            .get(id.index())
            .ok_or(GraphError::UnknownVertex(id))
    }

    fn timeline(&self, worker: WorkerId) -> Result<&Vec<VertexId>> {
        self.timelines
            .get(worker.index())
            .ok_or(GraphError::UnknownWorker(worker))
    }

    fn tail_timestamp(&self, worker: WorkerId) -> Result<Option<u64>> {
        Ok(self
            .timeline(worker)?
            .last()
            .map(|v| self.vertices[v.index()].timestamp))
    }

    fn snapshot_edge(&self, id: EdgeId) -> Option<Edge> {
        let data = self.edges.get(id.index())?;
        let from_ts = self.vertices[data.from.index()].timestamp;
        let to_ts = self.vertices[data.to.index()].timestamp;
        Some(Edge {
            id,
            from: data.from,
            to: data.to,
            state: data.state,
            qualifier: data.qualifier.clone(),
            horizontal: data.horizontal,
            duration: to_ts.saturating_sub(from_ts),
        })
    }

    fn free_slot(&self, vertex: VertexId, direction: EdgeDirection) -> Result<()> {
        match self.vertex(vertex)?.slots[direction.slot()] {
            Some(_) => Err(GraphError::EdgeSlotOccupied { vertex, direction }),
            None => Ok(()),
        }
    }

    fn insert_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
        horizontal: bool,
    ) -> Result<EdgeId> {
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }
        let (out_slot, in_slot) = EdgeDirection::slots_for(horizontal);
        self.free_slot(from, out_slot)?;
        self.free_slot(to, in_slot)?;

        let from_ts = self.vertex(from)?.timestamp;
        let to_data = self.vertex(to)?;
        if to_data.timestamp < from_ts {
            return Err(GraphError::InvalidTimestamp {
                worker: to_data.worker,
                timestamp: to_data.timestamp,
                previous: from_ts,
            });
        }

        let id = EdgeId::from_index(self.edges.len());
        self.edges.push(EdgeData {
            from,
            to,
            state,
            qualifier: qualifier.map(Arc::from),
            horizontal,
        });
        self.vertices[from.index()].slots[out_slot.slot()] = Some(id);
        self.vertices[to.index()].slots[in_slot.slot()] = Some(id);
        Ok(id)
    }

    fn append(
        &mut self,
        vertex: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<Option<EdgeId>> {
        let data = self.vertex(vertex)?;
        if data.in_graph {
            return Err(GraphError::AlreadyInGraph(vertex));
        }
        let (worker, timestamp) = (data.worker, data.timestamp);
        let tail = self.timeline(worker)?.last().copied();

        let edge = match tail {
            Some(tail) => {
                let previous = self.vertices[tail.index()].timestamp;
                if timestamp < previous {
                    return Err(GraphError::InvalidTimestamp {
                        worker,
                        timestamp,
                        previous,
                    });
                }
                Some(self.insert_edge(tail, vertex, state, qualifier, true)?)
            }
            None => None,
        };
        self.vertices[vertex.index()].in_graph = true;
        self.timelines[worker.index()].push(vertex);
        Ok(edge)
    }

    fn require_in_graph(&self, vertex: VertexId) -> Result<&VertexData> {
        let data = self.vertex(vertex)?;
        if data.in_graph {
            Ok(data)
        } else {
            Err(GraphError::VertexNotInGraph(vertex))
        }
    }
}

/// The execution graph
///
/// All methods take `&self`; the graph is typically shared behind an `Arc`
/// between the builder and concurrent readers.
///
/// # Example
///
/// ```
/// use rastro::edge_state::EdgeContextState;
/// use rastro::graph::ExecutionGraph;
/// use rastro::worker::Worker;
///
/// # fn main() -> Result<(), rastro::error::GraphError> {
/// let graph = ExecutionGraph::new(0);
/// let w = graph.add_worker(Worker::thread("host", 42, "app"))?;
///
/// let v0 = graph.create_vertex(w, 0)?;
/// assert!(graph.append(v0, EdgeContextState::Running, None)?.is_none());
///
/// let v1 = graph.create_vertex(w, 10)?;
/// let edge = graph.append(v1, EdgeContextState::Running, None)?.unwrap();
/// assert_eq!(graph.get_edge(edge).unwrap().duration, 10);
/// assert_eq!(graph.head(w), Some(v0));
/// assert_eq!(graph.tail(w), Some(v1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExecutionGraph {
    store: RwLock<Store>,
    start_time: u64,
    done: AtomicBool,
    disposed: AtomicBool,
}

impl ExecutionGraph {
    /// Create an empty graph anchored at the trace start time
    pub fn new(start_time: u64) -> Self {
        Self::from_store(start_time, Store::default(), false)
    }

    pub(crate) fn from_store(start_time: u64, store: Store, done: bool) -> Self {
        Self {
            store: RwLock::new(store),
            start_time,
            done: AtomicBool::new(done),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(GraphError::Disposed);
        }
        if self.done.load(Ordering::Acquire) {
            return Err(GraphError::Closed);
        }
        Ok(self.store.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn version(&self) -> u32 {
        GRAPH_VERSION
    }

    /// End time given to [`ExecutionGraph::close_graph`], if closed
    pub fn end_time(&self) -> Option<u64> {
        self.read().end_time
    }

    pub fn is_done_building(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------
    // Workers
    // ---------------------------------------------------------------

    /// Register a worker, returning the existing id if its key is known
    pub fn add_worker(&self, worker: Worker) -> Result<WorkerId> {
        let key = worker.key();
        if let Some(id) = self.read().worker_index.get(&key) {
            return Ok(*id);
        }
        let mut store = self.write()?;
        if let Some(id) = store.worker_index.get(&key) {
            return Ok(*id);
        }
        let id = WorkerId::from_index(store.workers.len());
        trace!(worker = %worker, %id, "registering worker");
        store.workers.push(Arc::new(worker));
        store.timelines.push(Vec::new());
        store.worker_index.insert(key, id);
        Ok(id)
    }

    pub fn worker(&self, id: WorkerId) -> Option<Arc<Worker>> {
        self.read().workers.get(id.index()).cloned()
    }

    /// Id of the registered worker with the same key
    pub fn worker_id(&self, worker: &Worker) -> Option<WorkerId> {
        self.find_worker(&worker.key())
    }

    pub fn find_worker(&self, key: &WorkerKey) -> Option<WorkerId> {
        self.read().worker_index.get(key).copied()
    }

    /// Registered workers, in registration order
    pub fn workers(&self) -> Vec<(WorkerId, Arc<Worker>)> {
        self.read()
            .workers
            .iter()
            .enumerate()
            .map(|(i, w)| (WorkerId::from_index(i), Arc::clone(w)))
            .collect()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Allocate a vertex for `worker`; it joins the worker's chain on append
    pub fn create_vertex(&self, worker: WorkerId, timestamp: u64) -> Result<VertexId> {
        let mut store = self.write()?;
        if let Some(previous) = store.tail_timestamp(worker)? {
            if timestamp < previous {
                return Err(GraphError::InvalidTimestamp {
                    worker,
                    timestamp,
                    previous,
                });
            }
        }
        let id = VertexId::from_index(store.vertices.len());
        store.vertices.push(VertexData {
            worker,
            timestamp,
            in_graph: false,
            slots: [None; 4],
        });
        Ok(id)
    }

    /// Add `vertex` at the end of its worker's chain
    ///
    /// Returns the horizontal edge from the previous tail, or `None` when the
    /// vertex is the first of its worker.
    pub fn append(
        &self,
        vertex: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<Option<EdgeId>> {
        let edge = self.write()?.append(vertex, state, qualifier)?;
        trace!(%vertex, %state, "append");
        Ok(edge)
    }

    /// Add `vertex` to its worker's chain without a meaningful horizontal state
    pub fn add(&self, vertex: VertexId) -> Result<Option<EdgeId>> {
        self.append(vertex, EdgeContextState::NoEdge, None)
    }

    /// Link two vertices
    ///
    /// `from` must already be in the graph. When both belong to the same
    /// worker, `to` is appended and the horizontal edge is returned. Otherwise
    /// `to` is added to its own worker's chain if needed and a vertical edge is
    /// created.
    pub fn edge(
        &self,
        from: VertexId,
        to: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<EdgeId> {
        let mut store = self.write()?;
        let from_worker = store.require_in_graph(from)?.worker;
        let to_data = store.vertex(to)?;
        let (to_worker, to_in_graph) = (to_data.worker, to_data.in_graph);

        if from_worker == to_worker {
            if to_in_graph {
                return Err(GraphError::AlreadyInGraph(to));
            }
            // the worker has at least `from`, so append always yields an edge
            return store
                .append(to, state, qualifier)?
                .ok_or(GraphError::VertexNotInGraph(from));
        }

        if !to_in_graph {
            store.append(to, EdgeContextState::NoEdge, None)?;
        }
        let id = store.insert_edge(from, to, state, qualifier, false)?;
        trace!(%from, %to, %state, "vertical edge");
        Ok(id)
    }

    /// Create a vertical edge between two vertices already in the graph, even
    /// when they share a worker
    pub fn edge_vertical(
        &self,
        from: VertexId,
        to: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<EdgeId> {
        let mut store = self.write()?;
        store.require_in_graph(from)?;
        store.require_in_graph(to)?;
        let id = store.insert_edge(from, to, state, qualifier, false)?;
        trace!(%from, %to, %state, "vertical edge");
        Ok(id)
    }

    /// Finish construction, extending every worker to `end_time`
    pub fn close_graph(&self, end_time: u64) -> Result<()> {
        let mut store = self.write()?;
        for index in 0..store.timelines.len() {
            let worker = WorkerId::from_index(index);
            let Some(tail_ts) = store.tail_timestamp(worker)? else {
                continue;
            };
            if tail_ts > end_time {
                warn!(%worker, tail_ts, end_time, "worker extends past graph end");
                continue;
            }
            if tail_ts == end_time {
                continue;
            }
            let id = VertexId::from_index(store.vertices.len());
            store.vertices.push(VertexData {
                worker,
                timestamp: end_time,
                in_graph: false,
                slots: [None; 4],
            });
            store.append(id, EdgeContextState::NoEdge, None)?;
        }
        store.end_time = Some(end_time);
        self.done.store(true, Ordering::Release);
        Ok(())
    }

    /// Release the graph's storage
    ///
    /// Callers must make sure no traversal is still running.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.done.store(true, Ordering::Release);
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        *store = Store::default();
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn head(&self, worker: WorkerId) -> Option<VertexId> {
        self.read().timelines.get(worker.index())?.first().copied()
    }

    pub fn tail(&self, worker: WorkerId) -> Option<VertexId> {
        self.read().timelines.get(worker.index())?.last().copied()
    }

    /// First vertex of the chain `vertex` belongs to
    pub fn head_of(&self, vertex: VertexId) -> Result<VertexId> {
        let store = self.read();
        store.require_in_graph(vertex)?;
        let mut current = vertex;
        // a chain cannot be longer than the vertex arena
        for _ in 0..=store.vertices.len() {
            let incoming = store.vertices[current.index()].slots
                [EdgeDirection::IncomingHorizontal.slot()];
            match incoming {
                Some(edge) => {
                    current = store.edges[edge.index()].from;
                    if current == vertex {
                        return Err(GraphError::CycleDetected { vertex });
                    }
                }
                None => return Ok(current),
            }
        }
        Err(GraphError::CycleDetected { vertex })
    }

    pub fn edge_from(&self, vertex: VertexId, direction: EdgeDirection) -> Option<Edge> {
        let store = self.read();
        let id = store.vertices.get(vertex.index())?.slots[direction.slot()]?;
        store.snapshot_edge(id)
    }

    /// First vertex of `worker` with a timestamp at or after `timestamp`
    pub fn vertex_at(&self, worker: WorkerId, timestamp: u64) -> Option<VertexId> {
        let store = self.read();
        let timeline = store.timelines.get(worker.index())?;
        let pos =
            timeline.partition_point(|v| store.vertices[v.index()].timestamp < timestamp);
        timeline.get(pos).copied()
    }

    pub fn get_vertex(&self, id: VertexId) -> Option<Vertex> {
        let store = self.read();
        let data = store.vertices.get(id.index())?;
        Some(Vertex {
            id,
            worker: data.worker,
            timestamp: data.timestamp,
        })
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.read().snapshot_edge(id)
    }

    /// Whether `vertex` has been added to its worker's chain
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.read()
            .vertices
            .get(vertex.index())
            .is_some_and(|v| v.in_graph)
    }

    pub fn parent_of(&self, vertex: VertexId) -> Option<WorkerId> {
        self.read().vertices.get(vertex.index()).map(|v| v.worker)
    }

    /// Chain of `worker`, head first
    pub fn vertices_of(&self, worker: WorkerId) -> Vec<VertexId> {
        self.read()
            .timelines
            .get(worker.index())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of vertices added to chains
    pub fn vertex_count(&self) -> usize {
        self.read().timelines.iter().map(Vec::len).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    /// All edges, in creation order
    pub fn edges(&self) -> Vec<Edge> {
        let store = self.read();
        (0..store.edges.len())
            .filter_map(|i| store.snapshot_edge(EdgeId::from_index(i)))
            .collect()
    }
}
