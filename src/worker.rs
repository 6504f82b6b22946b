//! Workers: the execution units that own a timeline in the graph
//!
//! A worker is a thread of a host, the idle task of a CPU, or the per-CPU
//! kernel pseudo-worker that stands for soft-IRQ/IRQ activity. Workers are
//! immutable; the graph registers each [`WorkerKey`] once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Aspect holding the display name of a worker
pub const ASPECT_NAME: &str = "name";
/// Aspect holding the thread id of a worker
pub const ASPECT_TID: &str = "tid";

/// Tid reported for kernel pseudo-workers
pub const KERNEL_TID: i64 = -1;

/// What kind of execution unit a worker stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkerKind {
    Thread { tid: i64 },
    /// Idle task (tid 0) of one CPU
    Idle { cpu: u32 },
    /// Interrupt handling on one CPU
    Kernel { cpu: u32 },
}

/// Stable lookup key: one worker per key within a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerKey {
    pub host: String,
    pub kind: WorkerKind,
}

/// Identity used to compare workers across graphs (host plus all aspects)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub host: String,
    pub aspects: BTreeMap<String, String>,
}

/// An execution unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    host: String,
    kind: WorkerKind,
    aspects: BTreeMap<String, String>,
}

impl Worker {
    /// A user or kernel thread
    pub fn thread(host: impl Into<String>, tid: i64, name: impl Into<String>) -> Self {
        Self::new(host.into(), WorkerKind::Thread { tid }, tid, name.into())
    }

    /// The idle task of `cpu`
    pub fn idle(host: impl Into<String>, cpu: u32) -> Self {
        Self::new(
            host.into(),
            WorkerKind::Idle { cpu },
            0,
            format!("swapper/{}", cpu),
        )
    }

    /// The kernel pseudo-worker of `cpu`
    pub fn kernel(host: impl Into<String>, cpu: u32) -> Self {
        Self::new(
            host.into(),
            WorkerKind::Kernel { cpu },
            KERNEL_TID,
            format!("kernel/{}", cpu),
        )
    }

    fn new(host: String, kind: WorkerKind, tid: i64, name: String) -> Self {
        let mut aspects = BTreeMap::new();
        aspects.insert(ASPECT_TID.to_string(), tid.to_string());
        aspects.insert(ASPECT_NAME.to_string(), name);
        Self {
            host,
            kind,
            aspects,
        }
    }

    /// Attach an extra display aspect
    pub fn with_aspect(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aspects.insert(key.into(), value.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn aspects(&self) -> &BTreeMap<String, String> {
        &self.aspects
    }

    pub fn aspect(&self, key: &str) -> Option<&str> {
        self.aspects.get(key).map(String::as_str)
    }

    pub fn name(&self) -> &str {
        self.aspect(ASPECT_NAME).unwrap_or_default()
    }

    /// Thread id; `0` for idle tasks and [`KERNEL_TID`] for kernel workers
    pub fn tid(&self) -> i64 {
        match self.kind {
            WorkerKind::Thread { tid } => tid,
            WorkerKind::Idle { .. } => 0,
            WorkerKind::Kernel { .. } => KERNEL_TID,
        }
    }

    pub fn key(&self) -> WorkerKey {
        WorkerKey {
            host: self.host.clone(),
            kind: self.kind,
        }
    }

    pub fn identity(&self) -> WorkerIdentity {
        WorkerIdentity {
            host: self.host.clone(),
            aspects: self.aspects.clone(),
        }
    }

    /// Same host and same aspect values
    pub fn same_identity(&self, other: &Worker) -> bool {
        self.host == other.host && self.aspects == other.aspects
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.host, self.tid(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_aspects() {
        let w = Worker::thread("host-a", 42, "nginx");
        assert_eq!(w.tid(), 42);
        assert_eq!(w.name(), "nginx");
        assert_eq!(w.aspect(ASPECT_TID), Some("42"));
        assert_eq!(w.to_string(), "host-a/42 (nginx)");
    }

    #[test]
    fn test_kernel_worker_naming() {
        let k = Worker::kernel("host-a", 3);
        assert_eq!(k.tid(), KERNEL_TID);
        assert_eq!(k.name(), "kernel/3");
        assert_eq!(k.kind(), WorkerKind::Kernel { cpu: 3 });
    }

    #[test]
    fn test_identity_compares_host_and_aspects() {
        let a = Worker::thread("h", 1, "a");
        let b = Worker::thread("h", 1, "a");
        let renamed = Worker::thread("h", 1, "b");
        let other_host = Worker::thread("g", 1, "a");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&renamed));
        assert!(!a.same_identity(&other_host));
        assert_eq!(a.key(), renamed.key());
    }

    #[test]
    fn test_with_aspect_changes_identity() {
        let a = Worker::thread("h", 1, "a");
        let tagged = a.clone().with_aspect("container", "web");
        assert!(!a.same_identity(&tagged));
        assert_eq!(tagged.aspect("container"), Some("web"));
    }
}
