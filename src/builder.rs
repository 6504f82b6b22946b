//! Execution graph builder
//!
//! Consumes trace events in timestamp order and grows an [`ExecutionGraph`].
//!
//! # Causal attribution of wakeups
//!
//! When a blocked thread is woken, the handler running on the waking CPU
//! explains why:
//!
//! ```text
//! top of stack       edge on the woken thread     vertical edge from
//! ────────────────   ──────────────────────────   ─────────────────────
//! hrtimer            TIMER                        -
//! irq / complete     INTERRUPTED (timer line or   -
//!                    local timer vector),
//!                    BLOCKED + irq name otherwise
//! softirq            TIMER / BLOCK_DEVICE /       sender of the packet
//!                    NETWORK / INTERRUPTED /      (network vectors)
//!                    BLOCKED by vector
//! ipi                IPI                          -
//! packet reception   NETWORK                      sender of the packet
//! none               BLOCKED                      the waking thread
//! ```
//!
//! # Network links
//!
//! Send and receive events create a vertex on the acting worker and are
//! paired by the [`EventMatcher`]. A completed pair is parked as the *latest
//! received network link* of the receiving worker. It becomes a vertical
//! NETWORK edge either on that worker's next append, or, when a soft-IRQ or
//! packet-reception wakeup happens first, it is redirected straight to the
//! woken thread.

use crate::config::AnalysisConfig;
use crate::edge_state::EdgeContextState;
use crate::error::{BuildError, ConfigError, GraphError};
use crate::event::TraceEvent;
use crate::event_matching::{
    EventMatcher, MatchDirection, MatchSink, MatchedPair, MatcherStats, PacketKey,
};
use crate::graph::{ExecutionGraph, VertexId, WorkerId};
use crate::interrupt_context::{softirq, ContextKind, InterruptContext, IRQ_TIMER};
use crate::layout::{EventKind, EventLayout};
use crate::system_model::{ProcessStatus, SystemModel};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A matched packet waiting to be attached to its receiver's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkLink {
    /// Vertex of the send event
    pub source: VertexId,
    /// Vertex of the receive event
    pub destination: VertexId,
}

/// Counters of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Events handled without error
    pub events_processed: u64,
    /// Events whose name is not part of the layout
    pub events_ignored: u64,
    /// Events rejected (any [`BuildError`])
    pub events_dropped: u64,
    pub unknown_workers: u64,
    pub unknown_cpus: u64,
    pub unmatched_contexts: u64,
    pub out_of_order: u64,
    pub graph_errors: u64,
    /// Matched packets received before they were sent, or whose edge could
    /// not be added
    pub discarded_links: u64,
    pub network: MatcherStats,
}

/// Records completed pairs as the receiving worker's latest network link
struct LinkRecorder<'a> {
    graph: &'a ExecutionGraph,
    links: &'a mut FnvHashMap<WorkerId, NetworkLink>,
    discarded: &'a mut u64,
}

impl MatchSink<VertexId> for LinkRecorder<'_> {
    fn on_match(&mut self, pair: MatchedPair<VertexId>) {
        let Some(worker) = self.graph.parent_of(pair.destination) else {
            return;
        };
        let sent = self.graph.get_vertex(pair.source).map(|v| v.timestamp);
        let received = self.graph.get_vertex(pair.destination).map(|v| v.timestamp);
        match (sent, received) {
            (Some(sent), Some(received)) if sent <= received => {}
            _ => {
                warn!(?sent, ?received, "packet received before it was sent, link discarded");
                *self.discarded += 1;
                return;
            }
        }
        let link = NetworkLink {
            source: pair.source,
            destination: pair.destination,
        };
        if let Some(previous) = self.links.insert(worker, link) {
            debug!(%worker, ?previous, "unconsumed network link replaced");
        }
    }
}

/// Event-driven graph construction
///
/// # Example
///
/// ```
/// use rastro::builder::GraphBuilder;
/// use rastro::config::AnalysisConfig;
/// use rastro::event::TraceEvent;
/// use rastro::graph::ExecutionGraph;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = Arc::new(ExecutionGraph::new(0));
/// let mut builder = GraphBuilder::new(Arc::clone(&graph), &AnalysisConfig::default())?;
///
/// builder.process_event(
///     &TraceEvent::new("sched_switch", 10, 0)
///         .with_field("prev_tid", 0)
///         .with_field("prev_state", 0)
///         .with_field("next_tid", 42),
/// )?;
/// let stats = builder.finish(100)?;
///
/// assert_eq!(stats.events_processed, 1);
/// assert!(graph.is_done_building());
/// # Ok(())
/// # }
/// ```
pub struct GraphBuilder {
    graph: Arc<ExecutionGraph>,
    layout: EventLayout,
    index: HashMap<String, EventKind>,
    cpu_count: Option<u32>,
    model: SystemModel,
    matcher: EventMatcher<VertexId>,
    network_links: FnvHashMap<WorkerId, NetworkLink>,
    stats: BuildStats,
    last_timestamp: Option<u64>,
}

impl GraphBuilder {
    pub fn new(graph: Arc<ExecutionGraph>, config: &AnalysisConfig) -> Result<Self, ConfigError> {
        let index = config.layout.index().map_err(ConfigError::Invalid)?;
        Ok(Self {
            graph,
            layout: config.layout.clone(),
            index,
            cpu_count: config.analysis.cpu_count,
            model: SystemModel::new(),
            matcher: EventMatcher::new()
                .with_ttl(config.matching.pending_ttl_ns)
                .with_max_pending(config.matching.max_pending),
            network_links: FnvHashMap::default(),
            stats: BuildStats::default(),
            last_timestamp: None,
        })
    }

    pub fn graph(&self) -> &Arc<ExecutionGraph> {
        &self.graph
    }

    pub fn model(&self) -> &SystemModel {
        &self.model
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            network: self.matcher.stats(),
            ..self.stats
        }
    }

    /// Pending latest received network link of `worker`
    pub fn pending_network_link(&self, worker: WorkerId) -> Option<NetworkLink> {
        self.network_links.get(&worker).copied()
    }

    /// Kernel pseudo-worker of `cpu` on `host`, if any event created it
    pub fn kernel_worker(&self, host: &str, cpu: u32) -> Option<WorkerId> {
        self.model.existing_kernel_worker(host, cpu)
    }

    /// Handle one event
    ///
    /// On error the event has been dropped; the graph is still consistent and
    /// the caller may continue with the next event.
    pub fn process_event(&mut self, event: &TraceEvent) -> Result<(), BuildError> {
        let result = self.dispatch(event);
        match &result {
            Ok(true) => self.stats.events_processed += 1,
            Ok(false) => self.stats.events_ignored += 1,
            Err(err) => {
                self.stats.events_dropped += 1;
                match err {
                    BuildError::UnknownWorker { .. } => self.stats.unknown_workers += 1,
                    BuildError::UnknownCpu { .. } => self.stats.unknown_cpus += 1,
                    BuildError::UnmatchedContext { .. } => self.stats.unmatched_contexts += 1,
                    BuildError::OutOfOrder { .. } => self.stats.out_of_order += 1,
                    BuildError::Graph(_) => self.stats.graph_errors += 1,
                }
            }
        }
        result.map(|_| ())
    }

    /// Handle one event, logging instead of returning a rejection
    pub fn handle_event(&mut self, event: &TraceEvent) {
        if let Err(err) = self.process_event(event) {
            warn!(event = %event.name, timestamp = event.timestamp, "dropped event: {}", err);
        }
    }

    /// Close the graph at `end_time` and return the final counters
    pub fn finish(&mut self, end_time: u64) -> Result<BuildStats, GraphError> {
        self.graph.close_graph(end_time)?;
        let stats = self.stats();
        debug!(?stats, "graph construction finished");
        Ok(stats)
    }

    /// Returns whether the event was relevant
    fn dispatch(&mut self, event: &TraceEvent) -> Result<bool, BuildError> {
        let ts = event.timestamp;
        if let Some(last) = self.last_timestamp {
            if ts < last {
                return Err(BuildError::OutOfOrder {
                    timestamp: ts,
                    last,
                });
            }
        }
        self.last_timestamp = Some(ts);

        let Some(kind) = self.index.get(&event.name).copied() else {
            return Ok(false);
        };
        let cpu = event
            .cpu
            .filter(|cpu| self.cpu_count.map_or(true, |count| *cpu < count))
            .ok_or_else(|| BuildError::UnknownCpu {
                event: event.name.clone(),
            })?;
        trace!(event = %event.name, ts, cpu, "dispatch");

        let host = event.host.as_str();
        match kind {
            EventKind::SchedSwitch => self.handle_sched_switch(event, host, cpu)?,
            EventKind::Wakeup => self.handle_wakeup(event, host, cpu)?,
            EventKind::Fork => self.handle_fork(event, host, cpu)?,
            EventKind::Exit => self.handle_exit(event, host, cpu)?,
            EventKind::SoftIrqEntry => self.handle_softirq_entry(event, host, cpu)?,
            EventKind::IrqEntry => {
                let f = &self.layout.fields;
                let context = InterruptContext::new(ContextKind::Irq, ts)
                    .with_vector(event.int(&f.irq))
                    .with_name(event.str(&f.irq_name).map(str::to_string));
                self.model.context_stack(host, cpu).push(context);
            }
            EventKind::CompleteIrqEntry => {
                let context = InterruptContext::new(ContextKind::CompleteIrq, ts)
                    .with_vector(event.int(&self.layout.fields.vector))
                    .with_name(Some(event.name.clone()));
                self.model.context_stack(host, cpu).push(context);
            }
            EventKind::IpiEntry => {
                let context = InterruptContext::new(ContextKind::Ipi, ts)
                    .with_vector(event.int(&self.layout.fields.vector));
                self.model.context_stack(host, cpu).push(context);
            }
            EventKind::HrTimerEntry => self
                .model
                .context_stack(host, cpu)
                .push(InterruptContext::new(ContextKind::HrTimer, ts)),
            EventKind::PacketReceptionEntry => self
                .model
                .context_stack(host, cpu)
                .push(InterruptContext::new(ContextKind::PacketReception, ts)),
            EventKind::IrqExit => self.pop_context(host, cpu, ContextKind::Irq)?,
            EventKind::SoftIrqExit => self.pop_context(host, cpu, ContextKind::SoftIrq)?,
            EventKind::HrTimerExit => self.pop_context(host, cpu, ContextKind::HrTimer)?,
            EventKind::IpiExit => self.pop_context(host, cpu, ContextKind::Ipi)?,
            EventKind::CompleteIrqExit => {
                self.pop_context(host, cpu, ContextKind::CompleteIrq)?
            }
            EventKind::PacketReceptionExit => {
                self.pop_context(host, cpu, ContextKind::PacketReception)?
            }
            EventKind::NetworkSend => self.handle_network_send(event, host, cpu)?,
            EventKind::NetworkReceive => self.handle_network_receive(event, host, cpu)?,
        }
        Ok(true)
    }

    fn pop_context(&mut self, host: &str, cpu: u32, kind: ContextKind) -> Result<(), BuildError> {
        match self.model.context_stack(host, cpu).pop_expecting(kind) {
            Some(_) => Ok(()),
            None => Err(BuildError::UnmatchedContext {
                cpu,
                expected: kind.to_string(),
            }),
        }
    }

    /// Thread id stored in `field`
    fn tid_of(event: &TraceEvent, field: &str) -> Result<i64, BuildError> {
        event
            .int(field)
            .filter(|tid| *tid >= 0)
            .ok_or_else(|| BuildError::UnknownWorker {
                event: event.name.clone(),
                field: field.to_string(),
            })
    }

    /// Worker of the thread id stored in `field`
    fn thread_from(
        &mut self,
        event: &TraceEvent,
        host: &str,
        cpu: u32,
        field: &str,
        name_field: Option<&str>,
    ) -> Result<WorkerId, BuildError> {
        let tid = Self::tid_of(event, field)?;
        let name = name_field.and_then(|f| event.str(f));
        Ok(self
            .model
            .resolve_thread(&self.graph, host, tid, cpu, name)?)
    }

    fn current_worker(&self, event: &TraceEvent, host: &str, cpu: u32) -> Result<WorkerId, BuildError> {
        self.model
            .current(host, cpu)
            .ok_or_else(|| BuildError::UnknownWorker {
                event: event.name.clone(),
                field: format!("current thread of cpu {}", cpu),
            })
    }

    // ---------------------------------------------------------------
    // Timeline updates
    // ---------------------------------------------------------------

    /// Append a vertex whose incoming edge reflects the status before the event
    fn state_change(&mut self, worker: WorkerId, ts: u64) -> Result<VertexId, GraphError> {
        let state = self.model.old_status(worker).edge_state();
        let vertex = self.graph.create_vertex(worker, ts)?;
        self.append_in_graph(worker, vertex, state, None)?;
        Ok(vertex)
    }

    /// Append a vertex whose incoming edge reflects the current status
    fn state_extend(&mut self, worker: WorkerId, ts: u64) -> Result<VertexId, GraphError> {
        let state = self.model.status(worker).edge_state();
        let vertex = self.graph.create_vertex(worker, ts)?;
        self.append_in_graph(worker, vertex, state, None)?;
        Ok(vertex)
    }

    /// Append `vertex`, first materializing the worker's pending network link
    ///
    /// A link that cannot be added is logged and discarded; the append itself
    /// still happens.
    fn append_in_graph(
        &mut self,
        worker: WorkerId,
        vertex: VertexId,
        state: EdgeContextState,
        qualifier: Option<&str>,
    ) -> Result<(), GraphError> {
        if let Some(link) = self.network_links.remove(&worker) {
            self.network_edge(link.source, link.destination);
        }
        self.graph.append(vertex, state, qualifier)?;
        Ok(())
    }

    /// Point `source_worker`'s pending network link at `target` instead
    fn replace_incoming_network_edge(&mut self, source_worker: WorkerId, target: VertexId) {
        if let Some(link) = self.network_links.remove(&source_worker) {
            trace!(%source_worker, %target, "network link redirected to woken thread");
            self.network_edge(link.source, target);
        }
    }

    fn network_edge(&mut self, source: VertexId, destination: VertexId) {
        if let Err(err) =
            self.graph
                .edge_vertical(source, destination, EdgeContextState::Network, None)
        {
            warn!(%source, %destination, "network link discarded: {}", err);
            self.stats.discarded_links += 1;
        }
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    fn handle_sched_switch(
        &mut self,
        event: &TraceEvent,
        host: &str,
        cpu: u32,
    ) -> Result<(), BuildError> {
        let f = self.layout.fields.clone();
        // reject the event before registering either thread
        Self::tid_of(event, &f.prev_tid)?;
        Self::tid_of(event, &f.next_tid)?;
        let prev = self.thread_from(event, host, cpu, &f.prev_tid, Some(&f.prev_comm))?;
        let next = self.thread_from(event, host, cpu, &f.next_tid, Some(&f.next_comm))?;

        let prev_status = if event.int(&f.prev_state).unwrap_or(0) == 0 {
            ProcessStatus::WaitCpu
        } else {
            ProcessStatus::WaitBlocked
        };
        self.model.set_status(prev, prev_status);
        self.model.set_status(next, ProcessStatus::Run);
        self.model.set_current(host, cpu, next);

        self.state_change(prev, event.timestamp)?;
        self.state_change(next, event.timestamp)?;
        Ok(())
    }

    fn handle_fork(&mut self, event: &TraceEvent, host: &str, cpu: u32) -> Result<(), BuildError> {
        let f = self.layout.fields.clone();
        let child = self.thread_from(event, host, cpu, &f.child_tid, Some(&f.child_comm))?;
        self.model.set_status(child, ProcessStatus::WaitFork);
        Ok(())
    }

    fn handle_exit(&mut self, event: &TraceEvent, host: &str, cpu: u32) -> Result<(), BuildError> {
        let f = self.layout.fields.clone();
        let worker = self.thread_from(event, host, cpu, &f.tid, Some(&f.comm))?;
        self.model.set_status(worker, ProcessStatus::Exit);
        Ok(())
    }

    fn handle_wakeup(&mut self, event: &TraceEvent, host: &str, cpu: u32) -> Result<(), BuildError> {
        let f = self.layout.fields.clone();
        let target = self.thread_from(event, host, cpu, &f.tid, Some(&f.comm))?;
        self.model.mark_woken(target);
        let current = self.model.current(host, cpu);
        let ts = event.timestamp;

        match self.model.old_status(target) {
            ProcessStatus::WaitFork => self.wait_fork(target, current, ts)?,
            ProcessStatus::WaitBlocked => self.wait_blocked(target, current, host, cpu, ts)?,
            _ => {}
        }
        Ok(())
    }

    fn wait_fork(
        &mut self,
        target: WorkerId,
        current: Option<WorkerId>,
        ts: u64,
    ) -> Result<(), GraphError> {
        match current.filter(|c| *c != target) {
            Some(parent) => {
                let n0 = self.state_extend(parent, ts)?;
                let n1 = self.state_change(target, ts)?;
                self.graph.edge(n0, n1, EdgeContextState::Default, None)?;
            }
            None => {
                self.state_change(target, ts)?;
            }
        }
        Ok(())
    }

    fn wait_blocked(
        &mut self,
        target: WorkerId,
        current: Option<WorkerId>,
        host: &str,
        cpu: u32,
        ts: u64,
    ) -> Result<(), GraphError> {
        let context = self.model.peek_context(host, cpu);
        match context.kind {
            ContextKind::HrTimer => self.append_wakeup(target, ts, EdgeContextState::Timer, None),
            ContextKind::Irq | ContextKind::CompleteIrq => {
                let (state, qualifier) = irq_edge(&context, &self.layout.timer_vectors);
                self.append_wakeup(target, ts, state, qualifier)
            }
            ContextKind::SoftIrq => self.softirq_wakeup(target, &context, host, cpu, ts),
            ContextKind::Ipi => self.append_wakeup(target, ts, EdgeContextState::Ipi, None),
            ContextKind::PacketReception => {
                self.packet_reception_wakeup(target, current, host, cpu, ts)
            }
            ContextKind::None => {
                let n1 = self.state_change(target, ts)?;
                if let Some(waker) = current.filter(|c| *c != target) {
                    let n0 = self.state_extend(waker, ts)?;
                    self.graph
                        .edge_vertical(n0, n1, EdgeContextState::Default, None)?;
                }
                Ok(())
            }
        }
    }

    fn append_wakeup(
        &mut self,
        target: WorkerId,
        ts: u64,
        state: EdgeContextState,
        qualifier: Option<String>,
    ) -> Result<(), GraphError> {
        let vertex = self.graph.create_vertex(target, ts)?;
        self.append_in_graph(target, vertex, state, qualifier.as_deref())
    }

    fn softirq_wakeup(
        &mut self,
        target: WorkerId,
        context: &InterruptContext,
        host: &str,
        cpu: u32,
        ts: u64,
    ) -> Result<(), GraphError> {
        let state = softirq_edge(context.vector);
        let wakeup = self.graph.create_vertex(target, ts)?;
        self.append_in_graph(target, wakeup, state, None)?;

        if context.vector.is_some_and(softirq::is_network) {
            if let Some(kernel) = self.model.existing_kernel_worker(host, cpu) {
                self.replace_incoming_network_edge(kernel, wakeup);
            }
        }
        Ok(())
    }

    fn packet_reception_wakeup(
        &mut self,
        target: WorkerId,
        current: Option<WorkerId>,
        host: &str,
        cpu: u32,
        ts: u64,
    ) -> Result<(), GraphError> {
        let inner = self.model.peek_inner_context(host, cpu);
        let (source, in_kernel) = match inner.kind {
            ContextKind::SoftIrq | ContextKind::Irq => {
                (Some(self.model.kernel_worker(&self.graph, host, cpu)?), true)
            }
            _ => (current, false),
        };

        let qualifier = match source {
            Some(worker) if !in_kernel => self.graph.worker(worker).map(|w| w.name().to_string()),
            _ => None,
        };
        let wakeup = self.graph.create_vertex(target, ts)?;
        self.append_in_graph(target, wakeup, EdgeContextState::Network, qualifier.as_deref())?;

        if let Some(source) = source {
            self.replace_incoming_network_edge(source, wakeup);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Interrupts and network
    // ---------------------------------------------------------------

    fn handle_softirq_entry(
        &mut self,
        event: &TraceEvent,
        host: &str,
        cpu: u32,
    ) -> Result<(), BuildError> {
        let vector = event.int(&self.layout.fields.softirq_vector);
        self.model
            .context_stack(host, cpu)
            .push(InterruptContext::new(ContextKind::SoftIrq, event.timestamp).with_vector(vector));

        if vector.is_some_and(softirq::is_network) {
            let kernel = self.model.kernel_worker(&self.graph, host, cpu)?;
            let vertex = self.graph.create_vertex(kernel, event.timestamp)?;
            self.graph.add(vertex)?;
        }
        Ok(())
    }

    fn handle_network_send(
        &mut self,
        event: &TraceEvent,
        host: &str,
        cpu: u32,
    ) -> Result<(), BuildError> {
        let Some(key) = PacketKey::from_event(event, &self.layout.fields) else {
            debug!(event = %event.name, "network event without packet identity");
            return Ok(());
        };
        let mut context = self.model.peek_context(host, cpu);
        if context.kind == ContextKind::PacketReception {
            context = self.model.peek_inner_context(host, cpu);
        }
        let actor = match context.kind {
            ContextKind::None => self.current_worker(event, host, cpu)?,
            ContextKind::SoftIrq => self.model.kernel_worker(&self.graph, host, cpu)?,
            other => {
                debug!(context = %other, "packet sent from unsupported context");
                return Ok(());
            }
        };
        self.submit_endpoint(actor, key, MatchDirection::Send, event.timestamp)
    }

    fn handle_network_receive(
        &mut self,
        event: &TraceEvent,
        host: &str,
        cpu: u32,
    ) -> Result<(), BuildError> {
        let Some(key) = PacketKey::from_event(event, &self.layout.fields) else {
            debug!(event = %event.name, "network event without packet identity");
            return Ok(());
        };
        let mut context = self.model.peek_context(host, cpu);
        if context.kind == ContextKind::PacketReception {
            context = self.model.peek_inner_context(host, cpu);
        }
        let actor = match context.kind {
            ContextKind::SoftIrq | ContextKind::Irq => {
                self.model.kernel_worker(&self.graph, host, cpu)?
            }
            _ => self.current_worker(event, host, cpu)?,
        };
        self.submit_endpoint(actor, key, MatchDirection::Receive, event.timestamp)
    }

    fn submit_endpoint(
        &mut self,
        actor: WorkerId,
        key: PacketKey,
        direction: MatchDirection,
        ts: u64,
    ) -> Result<(), BuildError> {
        let vertex = self.state_extend(actor, ts)?;
        let mut recorder = LinkRecorder {
            graph: &self.graph,
            links: &mut self.network_links,
            discarded: &mut self.stats.discarded_links,
        };
        self.matcher
            .submit(key, direction, ts, vertex, &mut recorder);
        Ok(())
    }
}

/// Edge of a wakeup from a hard IRQ handler
///
/// IRQ contexts carry the IRQ line, complete-IRQ contexts the CPU vector;
/// `timer_vectors` lists the vectors of the local timer.
fn irq_edge(context: &InterruptContext, timer_vectors: &[i64]) -> (EdgeContextState, Option<String>) {
    match (context.kind, context.vector) {
        (_, None) => (EdgeContextState::Unknown, None),
        (ContextKind::CompleteIrq, Some(vector)) if timer_vectors.contains(&vector) => {
            (EdgeContextState::Interrupted, None)
        }
        (ContextKind::Irq, Some(IRQ_TIMER)) => (EdgeContextState::Interrupted, None),
        (_, Some(_)) => (EdgeContextState::Blocked, context.name.clone()),
    }
}

/// Edge of a wakeup from a soft-IRQ handler
fn softirq_edge(vector: Option<i64>) -> EdgeContextState {
    match vector {
        Some(softirq::HRTIMER) | Some(softirq::TIMER) => EdgeContextState::Timer,
        Some(softirq::BLOCK) | Some(softirq::BLOCK_IOPOLL) => EdgeContextState::BlockDevice,
        Some(softirq::NET_RX) | Some(softirq::NET_TX) => EdgeContextState::Network,
        Some(softirq::SCHED) => EdgeContextState::Interrupted,
        Some(_) => EdgeContextState::Blocked,
        None => EdgeContextState::Unknown,
    }
}
