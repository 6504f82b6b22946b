//! Time breakdown of a critical path
//!
//! Where did the elapsed time go: per edge state and per worker.

use crate::critical_path::{CriticalPath, PathSegment};
use crate::edge_state::EdgeContextState;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};

/// Time attributed to one state (or one worker)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeShare {
    /// Number of segments
    pub count: u64,
    /// Total time (nanoseconds)
    pub total_ns: u64,
    /// Longest single segment (nanoseconds)
    pub max_ns: u64,
}

impl TimeShare {
    fn record(&mut self, duration: u64) {
        self.count += 1;
        self.total_ns += duration;
        self.max_ns = self.max_ns.max(duration);
    }
}

/// Tracks critical path time per state and per worker
#[derive(Debug, Default)]
pub struct PathStatistics {
    by_state: HashMap<EdgeContextState, TimeShare>,
    by_worker: HashMap<String, TimeShare>,
}

impl PathStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &CriticalPath) -> Self {
        let mut stats = Self::new();
        for segment in path.segments() {
            stats.record(&segment);
        }
        stats
    }

    pub fn record(&mut self, segment: &PathSegment) {
        let duration = segment.duration();
        self.by_state.entry(segment.state).or_default().record(duration);
        self.by_worker
            .entry(segment.worker.to_string())
            .or_default()
            .record(duration);
    }

    pub fn by_state(&self) -> &HashMap<EdgeContextState, TimeShare> {
        &self.by_state
    }

    pub fn by_worker(&self) -> &HashMap<String, TimeShare> {
        &self.by_worker
    }

    pub fn total_ns(&self) -> u64 {
        self.by_state.values().map(|s| s.total_ns).sum()
    }

    pub fn segment_count(&self) -> u64 {
        self.by_state.values().map(|s| s.count).sum()
    }

    /// States sorted by total time, largest first
    pub fn states_by_time(&self) -> Vec<(EdgeContextState, &TimeShare)> {
        let mut sorted: Vec<_> = self.by_state.iter().map(|(k, v)| (*k, v)).collect();
        sorted.sort_by(|a, b| b.1.total_ns.cmp(&a.1.total_ns).then(a.0.code().cmp(&b.0.code())));
        sorted
    }

    /// Workers sorted by total time, largest first
    pub fn workers_by_time(&self) -> Vec<(&str, &TimeShare)> {
        let mut sorted: Vec<_> = self.by_worker.iter().map(|(k, v)| (k.as_str(), v)).collect();
        sorted.sort_by(|a, b| b.1.total_ns.cmp(&a.1.total_ns).then(a.0.cmp(b.0)));
        sorted
    }

    /// Print the breakdown as a table
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.by_state.is_empty() {
            writeln!(out, "Empty critical path.")?;
            return Ok(());
        }
        let total = self.total_ns();

        writeln!(out, "% time     seconds  segments       max(ns) state")?;
        writeln!(out, "------ ----------- --------- ------------- ----------------")?;
        for (state, share) in self.states_by_time() {
            writeln!(
                out,
                "{:6.2} {:>11.6} {:>9} {:>13} {}",
                percent(share.total_ns, total),
                share.total_ns as f64 / 1_000_000_000.0,
                share.count,
                share.max_ns,
                state
            )?;
        }
        writeln!(out, "------ ----------- --------- ------------- ----------------")?;
        writeln!(
            out,
            "100.00 {:>11.6} {:>9} {:>13} total",
            total as f64 / 1_000_000_000.0,
            self.segment_count(),
            ""
        )?;

        writeln!(out)?;
        writeln!(out, "% time     seconds worker")?;
        for (worker, share) in self.workers_by_time() {
            writeln!(
                out,
                "{:6.2} {:>11.6} {}",
                percent(share.total_ns, total),
                share.total_ns as f64 / 1_000_000_000.0,
                worker
            )?;
        }
        Ok(())
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Worker;
    use std::sync::Arc;

    fn segment(worker: &Arc<Worker>, start: u64, end: u64, state: EdgeContextState) -> PathSegment {
        PathSegment {
            worker: Arc::clone(worker),
            start,
            end,
            state,
            qualifier: None,
        }
    }

    #[test]
    fn test_record_by_state_and_worker() {
        let a = Arc::new(Worker::thread("h", 1, "a"));
        let b = Arc::new(Worker::thread("h", 2, "b"));
        let mut stats = PathStatistics::new();
        stats.record(&segment(&a, 0, 10, EdgeContextState::Running));
        stats.record(&segment(&b, 10, 40, EdgeContextState::Running));
        stats.record(&segment(&a, 40, 45, EdgeContextState::Preempted));

        assert_eq!(stats.total_ns(), 45);
        assert_eq!(stats.segment_count(), 3);
        let running = &stats.by_state()[&EdgeContextState::Running];
        assert_eq!((running.count, running.total_ns, running.max_ns), (2, 40, 30));

        let workers = stats.workers_by_time();
        assert_eq!(workers[0].1.total_ns, 30);
        assert_eq!(workers[1].1.total_ns, 15);
    }

    #[test]
    fn test_states_sorted_by_time() {
        let a = Arc::new(Worker::thread("h", 1, "a"));
        let mut stats = PathStatistics::new();
        stats.record(&segment(&a, 0, 5, EdgeContextState::Running));
        stats.record(&segment(&a, 5, 50, EdgeContextState::Timer));
        let states: Vec<_> = stats.states_by_time().into_iter().map(|(s, _)| s).collect();
        assert_eq!(states, vec![EdgeContextState::Timer, EdgeContextState::Running]);
    }

    #[test]
    fn test_summary_output() {
        let a = Arc::new(Worker::thread("h", 1, "a"));
        let mut stats = PathStatistics::new();
        stats.record(&segment(&a, 0, 1_000_000_000, EdgeContextState::Running));
        let mut out = Vec::new();
        stats.write_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("100.00    1.000000"));
        assert!(text.contains("RUNNING"));
        assert!(text.contains("total"));
    }

    #[test]
    fn test_empty_summary() {
        let mut out = Vec::new();
        PathStatistics::new().write_summary(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Empty critical path.\n");
    }
}
