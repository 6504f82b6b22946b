//! Operating system state tracked while building the graph
//!
//! The builder needs to know, for every thread, its scheduling status just
//! before and just after the event being handled, which thread runs on each
//! CPU, and which interrupt handlers are nested on each CPU. The model is
//! updated first for every event; the graph handler then reads the status the
//! thread had before the event through [`SystemModel::old_status`].

use crate::edge_state::EdgeContextState;
use crate::error::GraphError;
use crate::graph::{ExecutionGraph, WorkerId};
use crate::interrupt_context::{ContextStack, InterruptContext};
use crate::worker::{Worker, WorkerKey, WorkerKind};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scheduling status of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    NotAlive,
    Unknown,
    WaitBlocked,
    Run,
    RunSyscall,
    Interrupted,
    WaitCpu,
    WaitFork,
    WaitUnknown,
    Exit,
    Zombie,
}

impl ProcessStatus {
    /// Edge state describing an interval spent in this status
    pub fn edge_state(self) -> EdgeContextState {
        match self {
            ProcessStatus::Run
            | ProcessStatus::RunSyscall
            | ProcessStatus::Interrupted
            | ProcessStatus::Exit => EdgeContextState::Running,
            ProcessStatus::WaitBlocked => EdgeContextState::Blocked,
            ProcessStatus::WaitCpu | ProcessStatus::WaitFork | ProcessStatus::WaitUnknown => {
                EdgeContextState::Preempted
            }
            ProcessStatus::Unknown | ProcessStatus::Zombie | ProcessStatus::NotAlive => {
                EdgeContextState::Unknown
            }
        }
    }

    fn is_waiting(self) -> bool {
        matches!(
            self,
            ProcessStatus::WaitBlocked
                | ProcessStatus::WaitFork
                | ProcessStatus::WaitUnknown
                | ProcessStatus::Unknown
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct StatusPair {
    current: ProcessStatus,
    old: ProcessStatus,
}

impl Default for StatusPair {
    fn default() -> Self {
        Self {
            current: ProcessStatus::Unknown,
            old: ProcessStatus::Unknown,
        }
    }
}

type CpuKey = (String, u32);

/// Per-host, per-CPU and per-thread state
#[derive(Debug, Default)]
pub struct SystemModel {
    statuses: FnvHashMap<WorkerId, StatusPair>,
    current: HashMap<CpuKey, WorkerId>,
    contexts: HashMap<CpuKey, ContextStack>,
    kernel_workers: HashMap<CpuKey, WorkerId>,
}

impl SystemModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker of thread `tid` on `host`, registering it on first sight
    ///
    /// Tid 0 is the idle task and is resolved per CPU.
    pub fn resolve_thread(
        &mut self,
        graph: &ExecutionGraph,
        host: &str,
        tid: i64,
        cpu: u32,
        name: Option<&str>,
    ) -> Result<WorkerId, GraphError> {
        let kind = if tid == 0 {
            WorkerKind::Idle { cpu }
        } else {
            WorkerKind::Thread { tid }
        };
        let key = WorkerKey {
            host: host.to_string(),
            kind,
        };
        if let Some(id) = graph.find_worker(&key) {
            return Ok(id);
        }
        let worker = match kind {
            WorkerKind::Idle { cpu } => Worker::idle(host, cpu),
            _ => Worker::thread(host, tid, name.unwrap_or_default()),
        };
        graph.add_worker(worker)
    }

    /// Kernel pseudo-worker of `cpu`, created lazily with status `Run`
    pub fn kernel_worker(
        &mut self,
        graph: &ExecutionGraph,
        host: &str,
        cpu: u32,
    ) -> Result<WorkerId, GraphError> {
        let key = (host.to_string(), cpu);
        if let Some(id) = self.kernel_workers.get(&key) {
            return Ok(*id);
        }
        let id = graph.add_worker(Worker::kernel(host, cpu))?;
        self.statuses.insert(
            id,
            StatusPair {
                current: ProcessStatus::Run,
                old: ProcessStatus::Run,
            },
        );
        self.kernel_workers.insert(key, id);
        Ok(id)
    }

    /// Kernel worker of `cpu`, if it exists yet
    pub fn existing_kernel_worker(&self, host: &str, cpu: u32) -> Option<WorkerId> {
        self.kernel_workers.get(&(host.to_string(), cpu)).copied()
    }

    pub fn status(&self, worker: WorkerId) -> ProcessStatus {
        self.statuses
            .get(&worker)
            .map_or(ProcessStatus::Unknown, |s| s.current)
    }

    /// Status before the last update of `worker`
    pub fn old_status(&self, worker: WorkerId) -> ProcessStatus {
        self.statuses
            .get(&worker)
            .map_or(ProcessStatus::Unknown, |s| s.old)
    }

    pub fn set_status(&mut self, worker: WorkerId, status: ProcessStatus) {
        let pair = self.statuses.entry(worker).or_default();
        pair.old = pair.current;
        pair.current = status;
    }

    /// Wakeup of `worker`: a waiting thread becomes runnable
    pub fn mark_woken(&mut self, worker: WorkerId) {
        let pair = self.statuses.entry(worker).or_default();
        pair.old = pair.current;
        if pair.current.is_waiting() {
            pair.current = ProcessStatus::WaitCpu;
        }
    }

    /// Thread running on `cpu`
    pub fn current(&self, host: &str, cpu: u32) -> Option<WorkerId> {
        self.current.get(&(host.to_string(), cpu)).copied()
    }

    pub fn set_current(&mut self, host: &str, cpu: u32, worker: WorkerId) {
        self.current.insert((host.to_string(), cpu), worker);
    }

    pub fn context_stack(&mut self, host: &str, cpu: u32) -> &mut ContextStack {
        self.contexts.entry((host.to_string(), cpu)).or_default()
    }

    pub fn peek_context(&self, host: &str, cpu: u32) -> InterruptContext {
        self.contexts
            .get(&(host.to_string(), cpu))
            .map_or_else(InterruptContext::none, ContextStack::peek)
    }

    /// Context below the top of `cpu`'s stack
    pub fn peek_inner_context(&self, host: &str, cpu: u32) -> InterruptContext {
        self.contexts
            .get(&(host.to_string(), cpu))
            .map_or_else(InterruptContext::none, ContextStack::peek_inner)
    }
}
