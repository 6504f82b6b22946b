//! Scan-line traversal of the causal neighbourhood of a vertex
//!
//! Starting from a vertex, the traversal rewinds to the head of its chain and
//! walks the chain forward. Every vertical edge met on the way queues the
//! chain on its other end; each queued chain is walked the same way once.
//!
//! ```text
//! A   h──o──o──o──o        visit order: A chain left to right,
//!           │     ^        then B from its head (queued via the
//!           v     │        outgoing vertical edge at A[1] and the
//! B   h──o──o──o──o        incoming one at A[3])
//! ```
//!
//! The traversal is exposed both as a visitor ([`GraphVisitor`]) and as an
//! iterator of [`TraversalEvent`]s ([`ScanLine`]).

use super::{Edge, EdgeDirection, ExecutionGraph, Result, Vertex, VertexId};
use crate::error::GraphError;
use std::collections::{HashSet, VecDeque};

/// Callbacks of [`ExecutionGraph::scan_line_traverse`]
pub trait GraphVisitor {
    /// Called once per chain, with the chain's head, before its vertices
    fn visit_head(&mut self, _vertex: Vertex) {}

    fn visit_vertex(&mut self, _vertex: Vertex) {}

    /// Called for outgoing edges; `horizontal` tells which kind
    fn visit_edge(&mut self, _edge: &Edge, _horizontal: bool) {}
}

/// One step of a scan-line traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalEvent {
    Head(Vertex),
    Vertex(Vertex),
    Edge { edge: Edge, horizontal: bool },
}

/// Lazy scan-line traversal
///
/// Yields `Err` once if a chain turns out to be cyclic, then stops.
pub struct ScanLine<'g> {
    graph: &'g ExecutionGraph,
    stack: Vec<VertexId>,
    visited: HashSet<VertexId>,
    cursor: Option<VertexId>,
    pending: VecDeque<TraversalEvent>,
    failed: bool,
}

impl<'g> ScanLine<'g> {
    fn new(graph: &'g ExecutionGraph, start: VertexId) -> Self {
        Self {
            graph,
            stack: vec![start],
            visited: HashSet::new(),
            cursor: None,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    fn vertex(&self, id: VertexId) -> Result<Vertex> {
        self.graph
            .get_vertex(id)
            .ok_or(GraphError::UnknownVertex(id))
    }

    /// Queue the events of the vertex under the cursor and advance it
    fn step_chain(&mut self, n: VertexId) -> Result<()> {
        if !self.visited.insert(n) {
            self.cursor = None;
            return Ok(());
        }
        self.pending.push_back(TraversalEvent::Vertex(self.vertex(n)?));

        if let Some(edge) = self.graph.edge_from(n, EdgeDirection::OutgoingVertical) {
            self.stack.push(edge.to);
            self.pending.push_back(TraversalEvent::Edge {
                edge,
                horizontal: false,
            });
        }
        if let Some(edge) = self.graph.edge_from(n, EdgeDirection::IncomingVertical) {
            self.stack.push(edge.from);
        }
        self.cursor = match self.graph.edge_from(n, EdgeDirection::OutgoingHorizontal) {
            Some(edge) => {
                let next = edge.to;
                self.pending.push_back(TraversalEvent::Edge {
                    edge,
                    horizontal: true,
                });
                Some(next)
            }
            None => None,
        };
        Ok(())
    }

    /// Pop queued chains until an unvisited one is found
    fn start_chain(&mut self) -> Result<bool> {
        while let Some(curr) = self.stack.pop() {
            if self.visited.contains(&curr) {
                continue;
            }
            let head = self.graph.head_of(curr)?;
            self.pending.push_back(TraversalEvent::Head(self.vertex(head)?));
            self.cursor = Some(head);
            return Ok(true);
        }
        Ok(false)
    }
}

impl Iterator for ScanLine<'_> {
    type Item = Result<TraversalEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.failed {
                return None;
            }
            let step = match self.cursor {
                Some(n) => self.step_chain(n).map(|_| true),
                None => self.start_chain(),
            };
            match step {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(err) => {
                    self.failed = true;
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

impl ExecutionGraph {
    /// Iterate over the scan-line traversal starting at `start`
    pub fn scan_line(&self, start: VertexId) -> ScanLine<'_> {
        ScanLine::new(self, start)
    }

    /// Drive `visitor` over every vertex reachable from `start`, each once
    pub fn scan_line_traverse<V: GraphVisitor + ?Sized>(
        &self,
        start: VertexId,
        visitor: &mut V,
    ) -> Result<()> {
        for event in self.scan_line(start) {
            match event? {
                TraversalEvent::Head(v) => visitor.visit_head(v),
                TraversalEvent::Vertex(v) => visitor.visit_vertex(v),
                TraversalEvent::Edge { edge, horizontal } => visitor.visit_edge(&edge, horizontal),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_state::EdgeContextState;
    use crate::graph::WorkerId;
    use crate::worker::Worker;

    #[derive(Default)]
    struct Recorder {
        heads: Vec<VertexId>,
        vertices: Vec<VertexId>,
        horizontal: usize,
        vertical: usize,
    }

    impl GraphVisitor for Recorder {
        fn visit_head(&mut self, vertex: Vertex) {
            self.heads.push(vertex.id);
        }

        fn visit_vertex(&mut self, vertex: Vertex) {
            self.vertices.push(vertex.id);
        }

        fn visit_edge(&mut self, _edge: &Edge, horizontal: bool) {
            if horizontal {
                self.horizontal += 1;
            } else {
                self.vertical += 1;
            }
        }
    }

    fn chain(graph: &ExecutionGraph, w: WorkerId, times: &[u64]) -> Vec<VertexId> {
        times
            .iter()
            .map(|&ts| {
                let v = graph.create_vertex(w, ts).unwrap();
                graph.append(v, EdgeContextState::Running, None).unwrap();
                v
            })
            .collect()
    }

    #[test]
    fn test_single_chain_from_middle() {
        let graph = ExecutionGraph::new(0);
        let w = graph.add_worker(Worker::thread("h", 1, "a")).unwrap();
        let vs = chain(&graph, w, &[0, 1, 2]);

        let mut rec = Recorder::default();
        graph.scan_line_traverse(vs[1], &mut rec).unwrap();
        assert_eq!(rec.heads, vec![vs[0]]);
        assert_eq!(rec.vertices, vs);
        assert_eq!(rec.horizontal, 2);
        assert_eq!(rec.vertical, 0);
    }

    #[test]
    fn test_crosses_vertical_edges_both_ways() {
        let graph = ExecutionGraph::new(0);
        let a = graph.add_worker(Worker::thread("h", 1, "a")).unwrap();
        let b = graph.add_worker(Worker::thread("h", 2, "b")).unwrap();
        let c = graph.add_worker(Worker::thread("h", 3, "c")).unwrap();
        let va = chain(&graph, a, &[0, 5, 10]);
        let vb = chain(&graph, b, &[2, 6]);
        let vc = chain(&graph, c, &[1, 3]);
        // a -> b outgoing, c -> a incoming
        graph
            .edge_vertical(va[1], vb[1], EdgeContextState::Default, None)
            .unwrap();
        graph
            .edge_vertical(vc[1], va[2], EdgeContextState::Network, None)
            .unwrap();

        let mut rec = Recorder::default();
        graph.scan_line_traverse(va[0], &mut rec).unwrap();
        assert_eq!(rec.heads.len(), 3);
        assert_eq!(rec.vertices.len(), 7);
        assert_eq!(rec.vertical, 2);
        assert_eq!(rec.horizontal, 4);
        let unique: HashSet<_> = rec.vertices.iter().collect();
        assert_eq!(unique.len(), rec.vertices.len());
    }

    #[test]
    fn test_iterator_matches_visitor() {
        let graph = ExecutionGraph::new(0);
        let a = graph.add_worker(Worker::thread("h", 1, "a")).unwrap();
        let b = graph.add_worker(Worker::thread("h", 2, "b")).unwrap();
        let va = chain(&graph, a, &[0, 4]);
        let vb = chain(&graph, b, &[1, 4]);
        graph
            .edge_vertical(vb[0], va[1], EdgeContextState::Default, None)
            .unwrap();

        let events: Vec<_> = graph
            .scan_line(vb[1])
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let visited: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TraversalEvent::Vertex(v) => Some(v.id),
                _ => None,
            })
            .collect();
        assert_eq!(visited, vec![vb[0], vb[1], va[0], va[1]]);
        assert!(matches!(events[0], TraversalEvent::Head(v) if v.id == vb[0]));
    }

    #[test]
    fn test_unknown_start_vertex_fails() {
        let graph = ExecutionGraph::new(0);
        let mut rec = Recorder::default();
        assert!(graph.scan_line_traverse(VertexId(3), &mut rec).is_err());
    }
}
