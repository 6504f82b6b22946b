//! JSON output format for build summaries and critical paths

use crate::builder::BuildStats;
use crate::critical_path::{CriticalPath, PathLink, PathSegment};
use crate::stats::PathStatistics;
use crate::worker::Worker;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWorker {
    pub host: String,
    pub tid: i64,
    pub name: String,
}

impl From<&Worker> for JsonWorker {
    fn from(worker: &Worker) -> Self {
        Self {
            host: worker.host().to_string(),
            tid: worker.tid(),
            name: worker.name().to_string(),
        }
    }
}

/// A horizontal piece of the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonSegment {
    pub worker: JsonWorker,
    pub start: u64,
    pub end: u64,
    pub duration: u64,
    /// Edge state label (e.g. "RUNNING", "NETWORK")
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl From<&PathSegment> for JsonSegment {
    fn from(segment: &PathSegment) -> Self {
        Self {
            worker: JsonWorker::from(segment.worker.as_ref()),
            start: segment.start,
            end: segment.end,
            duration: segment.duration(),
            state: segment.state.label().to_string(),
            qualifier: segment.qualifier.as_deref().map(str::to_string),
        }
    }
}

/// A hop between workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonLink {
    pub from: JsonWorker,
    pub to: JsonWorker,
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl From<&PathLink> for JsonLink {
    fn from(link: &PathLink) -> Self {
        Self {
            from: JsonWorker::from(link.from.as_ref()),
            to: JsonWorker::from(link.to.as_ref()),
            from_timestamp: link.from_timestamp,
            to_timestamp: link.to_timestamp,
            state: link.state.label().to_string(),
            qualifier: link.qualifier.as_deref().map(str::to_string),
        }
    }
}

/// Time spent in one state along the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonStateTime {
    pub state: String,
    pub segments: u64,
    pub total_ns: u64,
}

/// Critical path of one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCriticalPath {
    pub worker: JsonWorker,
    pub total_duration: u64,
    /// Share of the analysed interval covered by the path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<f64>,
    pub segments: Vec<JsonSegment>,
    pub links: Vec<JsonLink>,
    /// Per-state breakdown (if --summary enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<JsonStateTime>>,
}

impl JsonCriticalPath {
    pub fn new(worker: &Worker, path: &CriticalPath) -> Self {
        Self {
            worker: JsonWorker::from(worker),
            total_duration: path.total_duration(),
            coverage_percent: None,
            segments: path.segments().iter().map(JsonSegment::from).collect(),
            links: path.links().iter().map(JsonLink::from).collect(),
            breakdown: None,
        }
    }

    /// Record the share of `interval` nanoseconds covered by the path
    pub fn with_coverage(mut self, path: &CriticalPath, interval: u64) -> Self {
        self.coverage_percent = Some(path.critical_path_percentage(interval));
        self
    }

    pub fn with_breakdown(mut self, stats: &PathStatistics) -> Self {
        self.breakdown = Some(
            stats
                .states_by_time()
                .into_iter()
                .map(|(state, share)| JsonStateTime {
                    state: state.label().to_string(),
                    segments: share.count,
                    total_ns: share.total_ns,
                })
                .collect(),
        );
        self
    }
}

/// Graph construction summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonBuildSummary {
    pub workers: usize,
    pub vertices: usize,
    pub edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BuildStats>,
}

/// Complete JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub build: JsonBuildSummary,
    pub critical_paths: Vec<JsonCriticalPath>,
    /// Workers whose path could not be computed, with the reason
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unavailable: Vec<JsonUnavailable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonUnavailable {
    pub worker: JsonWorker,
    pub reason: String,
}

impl JsonOutput {
    pub fn new(build: JsonBuildSummary) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "rastro-json-v1".to_string(),
            build,
            critical_paths: Vec::new(),
            unavailable: Vec::new(),
        }
    }

    pub fn add_path(&mut self, path: JsonCriticalPath) {
        self.critical_paths.push(path);
    }

    pub fn add_unavailable(&mut self, worker: &Worker, reason: impl Into<String>) {
        self.unavailable.push(JsonUnavailable {
            worker: JsonWorker::from(worker),
            reason: reason.into(),
        });
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_state::EdgeContextState;
    use std::sync::Arc;

    fn summary() -> JsonBuildSummary {
        JsonBuildSummary {
            workers: 2,
            vertices: 5,
            edges: 4,
            stats: None,
        }
    }

    #[test]
    fn test_segment_conversion() {
        let segment = PathSegment {
            worker: Arc::new(Worker::thread("h", 7, "app")),
            start: 10,
            end: 25,
            state: EdgeContextState::Network,
            qualifier: Some(Arc::from("eth0")),
        };
        let json = JsonSegment::from(&segment);
        assert_eq!(json.duration, 15);
        assert_eq!(json.state, "NETWORK");
        assert_eq!(json.worker.tid, 7);
        assert_eq!(json.qualifier.as_deref(), Some("eth0"));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let segment = JsonSegment {
            worker: JsonWorker {
                host: "h".into(),
                tid: 1,
                name: "a".into(),
            },
            start: 0,
            end: 1,
            duration: 1,
            state: "RUNNING".into(),
            qualifier: None,
        };
        let json = serde_json::to_string(&segment).unwrap();
        assert!(!json.contains("qualifier"));

        let output = JsonOutput::new(summary());
        let json = output.to_json().unwrap();
        assert!(!json.contains("unavailable"));
        assert!(!json.contains("\"stats\""));
        assert!(json.contains("rastro-json-v1"));
    }

    #[test]
    fn test_unavailable_listed() {
        let mut output = JsonOutput::new(summary());
        output.add_unavailable(&Worker::thread("h", 3, "x"), "cycle detected");
        let parsed: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(parsed["unavailable"][0]["reason"], "cycle detected");
        assert_eq!(parsed["unavailable"][0]["worker"]["tid"], 3);
    }
}
