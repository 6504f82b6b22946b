//! Error types for graph construction and analysis
//!
//! Construction-time errors never abort a whole graph: the builder drops the
//! offending event and keeps going. Algorithm-time errors abort only the single
//! requested critical path computation.

use crate::graph::{EdgeDirection, VertexId, WorkerId};
use thiserror::Error;

/// Errors raised by the execution graph store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("timestamp {timestamp} on worker {worker} precedes {previous}")]
    InvalidTimestamp {
        worker: WorkerId,
        timestamp: u64,
        previous: u64,
    },

    #[error("horizontal chain cycle detected at vertex {vertex}")]
    CycleDetected { vertex: VertexId },

    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),

    #[error("vertex {0} has not been added to its worker's chain")]
    VertexNotInGraph(VertexId),

    #[error("vertex {0} is already part of its worker's chain")]
    AlreadyInGraph(VertexId),

    #[error("cannot link vertex {0} to itself")]
    SelfLoop(VertexId),

    #[error("vertex {vertex} already has an {direction} edge")]
    EdgeSlotOccupied {
        vertex: VertexId,
        direction: EdgeDirection,
    },

    #[error("graph is closed, no further mutation allowed")]
    Closed,

    #[error("graph has been disposed")]
    Disposed,
}

/// Reasons an event was rejected by the graph builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{event}: no resolvable worker for field '{field}'")]
    UnknownWorker { event: String, field: String },

    #[error("{event}: event has no usable cpu")]
    UnknownCpu { event: String },

    #[error("cpu {cpu}: {expected} exit without matching entry")]
    UnmatchedContext { cpu: u32, expected: String },

    #[error("event at {timestamp} arrived after {last}")]
    OutOfOrder { timestamp: u64, last: u64 },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failures of a single critical path computation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriticalPathError {
    #[error("cycle detected while resolving the critical path at vertex {0}")]
    CycleDetected(VertexId),

    #[error("no head vertex for the chain of vertex {0}")]
    MissingHead(VertexId),

    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    #[error("critical path computation was cancelled")]
    Cancelled,

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Errors raised while saving or reopening a graph snapshot
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode graph: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode graph: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Graph version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Graph was built from a trace starting at {found}, expected {expected}")]
    StartTimeMismatch { expected: u64, found: u64 },

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

/// Errors raised while loading an analysis configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
