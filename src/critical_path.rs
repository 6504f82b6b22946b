//! Critical path analysis over an execution graph
//!
//! The **critical path** of a worker over an interval is the chain of
//! causally linked segments that explains why that worker took as long as it
//! did. Time the worker spent running explains itself. Time it spent blocked
//! is explained by whatever eventually woke it up, possibly on another worker
//! or another host.
//!
//! # Algorithm: bounded backward resolution
//!
//! The search walks the worker's chain backward from `start`, one incoming
//! horizontal edge at a time:
//!
//! ```text
//! role of edge          action
//! ───────────────────   ───────────────────────────────────────────────
//! PASS                  copy the edge
//! UNKNOWN               copy the edge, never chased across workers
//! BLOCK, not matchable  copy the edge, never chased across workers
//! BLOCK, matchable      follow the vertical edge that ended the blocking
//!                       backward on the waker, down to the start of the
//!                       blocking window, and copy that sub-path instead
//! ```
//!
//! A blocking whose waker cannot be found is copied as an unexplained
//! segment. Resolution recurses when the waker was itself blocked:
//!
//! ```text
//!   A  ──RUNNING──●────────── BLOCKED ──────────●──
//!                                               ▲ NETWORK
//!   B  ──────●───── RUNNING ─────●──────────────┘
//!                                t=5           t=10
//!
//!   path of A at t=10:  B[0→5] RUNNING, B(5) ──NETWORK──▶ A(10)
//! ```
//!
//! Each matchable blocking is resolved only within its own window; nothing
//! older than the start of the blocking is visited.
//!
//! # Output
//!
//! The result is a new [`ExecutionGraph`] holding one chain per involved
//! worker. Gaps between path pieces are `NO_EDGE` fillers. The output is
//! closed at `u64::MAX`.
//!
//! # Example
//!
//! ```
//! use rastro::critical_path::CriticalPathAlgorithm;
//! use rastro::edge_state::EdgeContextState;
//! use rastro::graph::ExecutionGraph;
//! use rastro::worker::Worker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = ExecutionGraph::new(0);
//! let client = graph.add_worker(Worker::thread("host", 1, "client"))?;
//! let server = graph.add_worker(Worker::thread("host", 2, "server"))?;
//!
//! let c0 = graph.create_vertex(client, 0)?;
//! graph.add(c0)?;
//! let c10 = graph.create_vertex(client, 10)?;
//! graph.append(c10, EdgeContextState::Blocked, None)?;
//!
//! let s0 = graph.create_vertex(server, 0)?;
//! graph.add(s0)?;
//! let s5 = graph.create_vertex(server, 5)?;
//! graph.append(s5, EdgeContextState::Running, None)?;
//! graph.edge_vertical(s5, c10, EdgeContextState::Network, None)?;
//! graph.close_graph(10)?;
//!
//! let path = CriticalPathAlgorithm::new(&graph).compute(c10, None)?;
//! let segments = path.segments();
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].worker.name(), "server");
//! assert_eq!(path.total_duration(), 5);
//! # Ok(())
//! # }
//! ```

use crate::edge_state::{EdgeContextState, EdgeRole};
use crate::error::{CriticalPathError, GraphError};
use crate::graph::{Edge, EdgeDirection, EdgeId, ExecutionGraph, VertexId, WorkerId};
use crate::worker::Worker;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub type Result<T> = std::result::Result<T, CriticalPathError>;

/// Cooperative cancellation flag shared with a running computation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Whether both handles control the same flag
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Time a worker spent in one state on the critical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub worker: Arc<Worker>,
    pub start: u64,
    pub end: u64,
    pub state: EdgeContextState,
    pub qualifier: Option<Arc<str>>,
}

impl PathSegment {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Hop of the critical path from one worker to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLink {
    pub from: Arc<Worker>,
    pub to: Arc<Worker>,
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    pub state: EdgeContextState,
    pub qualifier: Option<Arc<str>>,
}

/// Result of a critical path computation
#[derive(Debug)]
pub struct CriticalPath {
    graph: ExecutionGraph,
}

impl CriticalPath {
    fn from_graph(graph: ExecutionGraph) -> Self {
        Self { graph }
    }

    /// The output graph
    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    /// Workers the path goes through, in order of first appearance
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.graph.workers().into_iter().map(|(_, w)| w).collect()
    }

    /// Whether the path goes through a worker with the same identity
    pub fn involves(&self, worker: &Worker) -> bool {
        self.workers().iter().any(|w| w.same_identity(worker))
    }

    /// Horizontal segments ordered by start time, filler excluded
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments: Vec<PathSegment> = self
            .graph
            .edges()
            .into_iter()
            .filter(|e| e.horizontal && e.state != EdgeContextState::NoEdge)
            .filter_map(|e| {
                let from = self.graph.get_vertex(e.from)?;
                let to = self.graph.get_vertex(e.to)?;
                Some(PathSegment {
                    worker: self.graph.worker(from.worker)?,
                    start: from.timestamp,
                    end: to.timestamp,
                    state: e.state,
                    qualifier: e.qualifier,
                })
            })
            .collect();
        segments.sort_by_key(|s| s.start);
        segments
    }

    /// Vertical hops in creation order
    pub fn links(&self) -> Vec<PathLink> {
        self.graph
            .edges()
            .into_iter()
            .filter(|e| !e.horizontal)
            .filter_map(|e| {
                let from = self.graph.get_vertex(e.from)?;
                let to = self.graph.get_vertex(e.to)?;
                Some(PathLink {
                    from: self.graph.worker(from.worker)?,
                    to: self.graph.worker(to.worker)?,
                    from_timestamp: from.timestamp,
                    to_timestamp: to.timestamp,
                    state: e.state,
                    qualifier: e.qualifier,
                })
            })
            .collect()
    }

    /// Sum of segment durations (nanoseconds)
    pub fn total_duration(&self) -> u64 {
        self.segments().iter().map(PathSegment::duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments().is_empty() && self.links().is_empty()
    }

    /// Biggest single contributor
    pub fn longest_segment(&self) -> Option<PathSegment> {
        self.segments().into_iter().max_by_key(PathSegment::duration)
    }

    /// Share of `total_trace_duration` covered by the path (0.0 to 100.0)
    pub fn critical_path_percentage(&self, total_trace_duration: u64) -> f64 {
        if total_trace_duration == 0 {
            return 0.0;
        }
        (self.total_duration() as f64 / total_trace_duration as f64) * 100.0
    }
}

/// Critical path search over a graph
///
/// Read-only on the source graph; several searches may run concurrently.
pub struct CriticalPathAlgorithm<'g> {
    graph: &'g ExecutionGraph,
    cancellation: Option<CancellationToken>,
}

enum Step {
    /// Own-chain edge kept as-is
    Copy(Edge),
    /// Blocking replaced by the sub-path that explains it, oldest first
    Resolved { blocking: Edge, links: Vec<Edge> },
}

impl<'g> CriticalPathAlgorithm<'g> {
    pub fn new(graph: &'g ExecutionGraph) -> Self {
        Self {
            graph,
            cancellation: None,
        }
    }

    /// Abort with [`CriticalPathError::Cancelled`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Critical path of `worker` up to its last vertex
    ///
    /// A worker without vertices yields an empty path.
    pub fn compute_for_worker(&self, worker: WorkerId) -> Result<CriticalPath> {
        match self.graph.tail(worker) {
            Some(tail) => self.compute(tail, None),
            None => {
                debug!(%worker, "no activity, empty critical path");
                self.compute_empty()
            }
        }
    }

    /// Path of a worker that never ran
    pub fn compute_empty(&self) -> Result<CriticalPath> {
        let out = ExecutionGraph::new(self.graph.start_time());
        out.close_graph(u64::MAX)?;
        Ok(CriticalPath::from_graph(out))
    }

    /// Critical path of the worker of `start`, walking back to `end` (or the
    /// head of the chain)
    pub fn compute(&self, start: VertexId, end: Option<VertexId>) -> Result<CriticalPath> {
        let head = self
            .graph
            .get_vertex(start)
            .ok_or(CriticalPathError::UnknownVertex(start))?;
        if !self.graph.contains(start) {
            return Err(CriticalPathError::MissingHead(start));
        }
        let bound = match end {
            Some(vertex) => Some(self.timestamp(vertex)?),
            None => None,
        };
        let worker = head.worker;

        let mut steps = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        let mut current = start;
        loop {
            self.check_cancelled()?;
            if !visited.insert(current) {
                return Err(CriticalPathError::CycleDetected(current));
            }
            let ts = self.timestamp(current)?;
            if bound.is_some_and(|b| ts <= b) {
                break;
            }
            let Some(edge) = self.graph.edge_from(current, EdgeDirection::IncomingHorizontal)
            else {
                break;
            };
            current = edge.from;

            if edge.state == EdgeContextState::NoEdge {
                continue;
            }
            if edge.state.is_matchable() {
                let window = self.timestamp(edge.from)?;
                let mut links = self.resolve_blocking(&edge, window, &mut in_progress)?;
                if links.is_empty() {
                    trace!(edge = %edge.id, "blocking left unexplained");
                    steps.push(Step::Copy(edge));
                } else {
                    links.reverse();
                    steps.push(Step::Resolved {
                        blocking: edge,
                        links,
                    });
                }
            } else {
                steps.push(Step::Copy(edge));
            }
        }

        let mut writer = PathWriter::new(self.graph);
        writer.ensure(worker, self.timestamp(current)?)?;
        for step in steps.into_iter().rev() {
            self.check_cancelled()?;
            match step {
                Step::Copy(edge) => {
                    writer.ensure(worker, self.timestamp(edge.from)?)?;
                    writer.append_at(
                        worker,
                        self.timestamp(edge.to)?,
                        edge.state,
                        edge.qualifier.as_deref(),
                    )?;
                }
                Step::Resolved { blocking, links } => {
                    self.append_component(&mut writer, worker, &blocking, &links)?;
                }
            }
        }
        writer.ensure(worker, head.timestamp)?;
        writer.finish()
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(CriticalPathError::Cancelled),
            _ => Ok(()),
        }
    }

    fn timestamp(&self, vertex: VertexId) -> Result<u64> {
        self.graph
            .get_vertex(vertex)
            .map(|v| v.timestamp)
            .ok_or(CriticalPathError::UnknownVertex(vertex))
    }

    fn parent(&self, vertex: VertexId) -> Result<WorkerId> {
        self.graph
            .parent_of(vertex)
            .ok_or(CriticalPathError::UnknownVertex(vertex))
    }

    /// Vertex where the blocking ended that received the wakeup
    ///
    /// Candidates are the destination and the zero-duration vertices right
    /// after it. The one woken by the latest origin wins.
    fn junction(&self, vertex: VertexId) -> Result<Option<VertexId>> {
        let mut best: Option<(u64, VertexId)> = None;
        let mut current = vertex;
        loop {
            if let Some(down) = self.graph.edge_from(current, EdgeDirection::IncomingVertical) {
                let origin = self.timestamp(down.from)?;
                if best.map_or(true, |(ts, _)| origin > ts) {
                    best = Some((origin, current));
                }
            }
            match self.graph.edge_from(current, EdgeDirection::OutgoingHorizontal) {
                Some(next)
                    if next.duration == 0 || next.state == EdgeContextState::Epsilon =>
                {
                    current = next.to;
                }
                _ => break,
            }
        }
        Ok(best.map(|(_, v)| v))
    }

    /// Edges explaining `blocking`, newest first
    ///
    /// Nothing at or before `bound` (or before the blocking itself) is
    /// visited. Empty when the wakeup source is unknown.
    fn resolve_blocking(
        &self,
        blocking: &Edge,
        bound: u64,
        in_progress: &mut HashSet<EdgeId>,
    ) -> Result<Vec<Edge>> {
        if !in_progress.insert(blocking.id) {
            return Err(CriticalPathError::CycleDetected(blocking.to));
        }
        let result = self.resolve_window(blocking, bound, in_progress);
        in_progress.remove(&blocking.id);
        result
    }

    fn resolve_window(
        &self,
        blocking: &Edge,
        bound: u64,
        in_progress: &mut HashSet<EdgeId>,
    ) -> Result<Vec<Edge>> {
        let Some(junction) = self.junction(blocking.to)? else {
            return Ok(Vec::new());
        };
        let Some(down) = self.graph.edge_from(junction, EdgeDirection::IncomingVertical) else {
            return Ok(Vec::new());
        };
        let current_bound = bound.max(self.timestamp(blocking.from)?);

        let mut sub_path = vec![down.clone()];
        let mut stack: Vec<VertexId> = Vec::new();
        let mut explored = HashSet::new();
        let mut next = Some(down.from);

        while let Some(vertex) = next {
            self.check_cancelled()?;
            if self.timestamp(vertex)? <= current_bound {
                break;
            }

            let in_vertical = self.graph.edge_from(vertex, EdgeDirection::IncomingVertical);
            if let Some(edge) = &in_vertical {
                // the wakeup came from before the window
                if self.timestamp(edge.from)? <= current_bound {
                    sub_path.push(edge.clone());
                    break;
                }
            }

            // converging branches: explore each vertex once
            if !explored.insert(vertex) {
                next = self.backtrack(&mut stack, &mut sub_path);
                continue;
            }

            let incoming = self.graph.edge_from(vertex, EdgeDirection::IncomingHorizontal);
            let incoming_blocks = incoming
                .as_ref()
                .is_some_and(|e| e.state.role() == EdgeRole::Block);
            if in_vertical.is_some() && !incoming_blocks {
                stack.push(vertex);
            }

            match incoming {
                Some(edge) => {
                    next = Some(edge.from);
                    if edge.state.is_matchable() {
                        let nested = self.resolve_blocking(&edge, current_bound, in_progress)?;
                        if nested.is_empty() {
                            sub_path.push(edge);
                        } else {
                            sub_path.extend(nested);
                        }
                    } else {
                        sub_path.push(edge);
                    }
                }
                None => next = self.backtrack(&mut stack, &mut sub_path),
            }
        }
        Ok(sub_path)
    }

    /// Dead end: rewind to the last vertex that had another way in
    fn backtrack(&self, stack: &mut Vec<VertexId>, sub_path: &mut Vec<Edge>) -> Option<VertexId> {
        let vertex = stack.pop()?;
        while sub_path.last().is_some_and(|e| e.from != vertex) {
            sub_path.pop();
        }
        let edge = self.graph.edge_from(vertex, EdgeDirection::IncomingVertical)?;
        let from = edge.from;
        sub_path.push(edge);
        Some(from)
    }

    /// Glue a resolved sub-path after the start of `blocking`
    fn append_component(
        &self,
        writer: &mut PathWriter<'_>,
        worker: WorkerId,
        blocking: &Edge,
        links: &[Edge],
    ) -> Result<()> {
        let b1 = writer.ensure(worker, self.timestamp(blocking.from)?)?;
        let Some(first) = links.first() else {
            return Ok(());
        };

        let source = self.parent(first.from)?;
        let mut anchor = Anchor {
            worker,
            vertex: b1,
        };
        if source != worker {
            let glue = writer.ensure(source, writer.timestamp(b1)?)?;
            writer.connect(b1, glue, EdgeContextState::Default, None)?;
            anchor = Anchor {
                worker: source,
                vertex: glue,
            };
            let first_ts = self.timestamp(first.from)?;
            if first_ts > writer.timestamp(glue)? {
                anchor = writer.link_to(anchor, source, first_ts, EdgeContextState::Unknown, None)?;
            }
        }

        let mut previous: Option<&Edge> = None;
        for link in links {
            if let Some(prev) = previous {
                if prev.to != link.from {
                    let ts = self.timestamp(prev.to)?.max(self.timestamp(link.from)?);
                    anchor = writer.link_to(
                        anchor,
                        self.parent(link.from)?,
                        ts,
                        EdgeContextState::Default,
                        link.qualifier.as_deref(),
                    )?;
                }
            }
            anchor = writer.link_to(
                anchor,
                self.parent(link.to)?,
                self.timestamp(link.to)?,
                link.state,
                link.qualifier.as_deref(),
            )?;
            previous = Some(link);
        }
        Ok(())
    }
}

/// Position in the output graph, with the source worker it stands for
#[derive(Debug, Clone, Copy)]
struct Anchor {
    worker: WorkerId,
    vertex: VertexId,
}

/// Builds the output graph forward in time
struct PathWriter<'g> {
    source: &'g ExecutionGraph,
    out: ExecutionGraph,
    ids: HashMap<WorkerId, WorkerId>,
}

impl<'g> PathWriter<'g> {
    fn new(source: &'g ExecutionGraph) -> Self {
        Self {
            source,
            out: ExecutionGraph::new(source.start_time()),
            ids: HashMap::new(),
        }
    }

    fn out_worker(&mut self, worker: WorkerId) -> Result<WorkerId> {
        if let Some(id) = self.ids.get(&worker) {
            return Ok(*id);
        }
        let source = self
            .source
            .worker(worker)
            .ok_or(GraphError::UnknownWorker(worker))?;
        let id = self.out.add_worker(Worker::clone(&source))?;
        self.ids.insert(worker, id);
        Ok(id)
    }

    fn timestamp(&self, vertex: VertexId) -> Result<u64> {
        self.out
            .get_vertex(vertex)
            .map(|v| v.timestamp)
            .ok_or(CriticalPathError::UnknownVertex(vertex))
    }

    /// Tail of `worker` at `ts` or later, created when needed
    fn ensure(&mut self, worker: WorkerId, ts: u64) -> Result<VertexId> {
        let id = self.out_worker(worker)?;
        if let Some(tail) = self.out.tail(id) {
            if self.timestamp(tail)? >= ts {
                return Ok(tail);
            }
        }
        let vertex = self.out.create_vertex(id, ts)?;
        self.out.add(vertex)?;
        Ok(vertex)
    }

    /// New tail of `worker` at `ts`, reached by a `state` segment
    fn append_at(
        &mut self,
        worker: WorkerId,
        ts: u64,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<VertexId> {
        let id = self.out_worker(worker)?;
        let ts = match self.out.tail(id) {
            Some(tail) => ts.max(self.timestamp(tail)?),
            None => ts,
        };
        let vertex = self.out.create_vertex(id, ts)?;
        self.out.append(vertex, state, qualifier)?;
        Ok(vertex)
    }

    /// Vertical edge, skipped when a slot is already taken
    fn connect(
        &mut self,
        from: VertexId,
        to: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<()> {
        let free = from != to
            && self.out.edge_from(from, EdgeDirection::OutgoingVertical).is_none()
            && self.out.edge_from(to, EdgeDirection::IncomingVertical).is_none()
            && self.timestamp(from)? <= self.timestamp(to)?;
        if free {
            self.out.edge_vertical(from, to, state, qualifier)?;
        } else {
            trace!(%from, %to, "path link skipped");
        }
        Ok(())
    }

    fn link_to(
        &mut self,
        anchor: Anchor,
        worker: WorkerId,
        ts: u64,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<Anchor> {
        let vertex = if worker == anchor.worker {
            self.append_at(worker, ts, state, qualifier)?
        } else {
            let target = self.ensure(worker, ts.max(self.timestamp(anchor.vertex)?))?;
            self.connect(anchor.vertex, target, state, qualifier)?;
            target
        };
        Ok(Anchor { worker, vertex })
    }

    fn finish(self) -> Result<CriticalPath> {
        self.out.close_graph(u64::MAX)?;
        Ok(CriticalPath::from_graph(self.out))
    }
}
