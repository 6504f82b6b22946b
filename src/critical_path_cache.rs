//! Per-worker cache of critical paths
//!
//! Paths are keyed by worker identity (host plus aspects), so a worker looked
//! up from another graph or rebuilt from its name hits the same entry. The
//! cache is bounded (LRU). Invalidating a key cancels any computation still
//! running for it; the stale result is discarded instead of being cached.

use crate::critical_path::{CancellationToken, CriticalPath, CriticalPathAlgorithm, Result};
use crate::error::CriticalPathError;
use crate::graph::ExecutionGraph;
use crate::worker::{Worker, WorkerIdentity};
use crossbeam::queue::ArrayQueue;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub struct CriticalPathCache {
    graph: Arc<ExecutionGraph>,
    entries: Mutex<LruCache<WorkerIdentity, Arc<CriticalPath>>>,
    in_flight: Mutex<HashMap<WorkerIdentity, CancellationToken>>,
}

impl CriticalPathCache {
    /// A zero `capacity` is raised to one
    pub fn new(graph: Arc<ExecutionGraph>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            graph,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn graph(&self) -> &Arc<ExecutionGraph> {
        &self.graph
    }

    /// Cached path of `worker`, computed on a miss
    ///
    /// Fails with [`CriticalPathError::Cancelled`] when the key is invalidated
    /// while the path is being computed.
    pub fn get_or_compute(&self, worker: &Worker) -> Result<Arc<CriticalPath>> {
        let identity = worker.identity();
        if let Some(path) = self.lock_entries().get(&identity) {
            return Ok(Arc::clone(path));
        }

        let token = self
            .lock_in_flight()
            .entry(identity.clone())
            .or_default()
            .clone();
        let result = match self.graph.worker_id(worker) {
            Some(id) => CriticalPathAlgorithm::new(&self.graph)
                .with_cancellation(token.clone())
                .compute_for_worker(id),
            None => CriticalPathAlgorithm::new(&self.graph).compute_empty(),
        };

        let mut in_flight = self.lock_in_flight();
        if token.is_cancelled() {
            debug!(worker = %worker, "discarding critical path of invalidated worker");
            return Err(CriticalPathError::Cancelled);
        }
        if in_flight.get(&identity).is_some_and(|t| t.same_as(&token)) {
            in_flight.remove(&identity);
        }
        let path = Arc::new(result?);
        self.lock_entries().put(identity, Arc::clone(&path));
        Ok(path)
    }

    /// Drop the entry of `worker` and cancel its running computation
    pub fn invalidate(&self, worker: &Worker) {
        let identity = worker.identity();
        if let Some(token) = self.lock_in_flight().remove(&identity) {
            token.cancel();
        }
        self.lock_entries().pop(&identity);
    }

    pub fn invalidate_all(&self) {
        for (_, token) in self.lock_in_flight().drain() {
            token.cancel();
        }
        self.lock_entries().clear();
    }

    /// Compute the paths of `workers` in parallel, results in input order
    pub fn compute_many(&self, workers: &[Worker]) -> Vec<Result<Arc<CriticalPath>>> {
        if workers.is_empty() {
            return Vec::new();
        }
        let queue = ArrayQueue::new(workers.len());
        for index in 0..workers.len() {
            let _ = queue.push(index);
        }
        let threads = std::thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(workers.len());

        let outcome = crossbeam::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|_| {
                        let mut done = Vec::new();
                        while let Some(index) = queue.pop() {
                            done.push((index, self.get_or_compute(&workers[index])));
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(done) => done,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<Vec<_>>()
        });

        let mut slots: Vec<Option<Result<Arc<CriticalPath>>>> =
            (0..workers.len()).map(|_| None).collect();
        match outcome {
            Ok(done) => {
                for (index, result) in done {
                    slots[index] = Some(result);
                }
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(CriticalPathError::Cancelled)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(
        &self,
    ) -> std::sync::MutexGuard<'_, LruCache<WorkerIdentity, Arc<CriticalPath>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<WorkerIdentity, CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
