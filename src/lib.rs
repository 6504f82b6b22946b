//! Rastro - execution graph reconstruction and critical path analysis
//!
//! This library rebuilds a causal execution graph from a kernel event stream
//! (scheduling, interrupts, network packets) and computes the critical path
//! of any thread through it: the chain of work, on whichever thread or CPU,
//! that the thread actually waited on.
//!
//! # Example
//! ```
//! use rastro::builder::GraphBuilder;
//! use rastro::config::AnalysisConfig;
//! use rastro::critical_path::CriticalPathAlgorithm;
//! use rastro::event::TraceEvent;
//! use rastro::graph::ExecutionGraph;
//! use std::sync::Arc;
//!
//! let graph = Arc::new(ExecutionGraph::new(0));
//! let mut builder = GraphBuilder::new(Arc::clone(&graph), &AnalysisConfig::default()).unwrap();
//! builder.handle_event(
//!     &TraceEvent::new("sched_switch", 10, 0)
//!         .with_field("prev_tid", 0)
//!         .with_field("prev_state", 0)
//!         .with_field("next_tid", 42)
//!         .with_field("next_comm", "app"),
//! );
//! builder.handle_event(
//!     &TraceEvent::new("sched_switch", 50, 0)
//!         .with_field("prev_tid", 42)
//!         .with_field("prev_state", 0)
//!         .with_field("next_tid", 0),
//! );
//! builder.finish(100).unwrap();
//!
//! let worker = graph.workers().into_iter().find(|(_, w)| w.tid() == 42).unwrap().0;
//! let path = CriticalPathAlgorithm::new(&graph).compute_for_worker(worker).unwrap();
//! assert_eq!(path.total_duration(), 40);
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod critical_path;
pub mod critical_path_cache;
pub mod edge_state;
pub mod error;
pub mod event;
pub mod event_matching;
pub mod graph;
pub mod interrupt_context;
pub mod json_output;
pub mod layout;
pub mod persistence;
pub mod stats;
pub mod system_model;
pub mod worker;
