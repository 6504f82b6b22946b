//! Edge context states
//!
//! Every edge of the execution graph carries an [`EdgeContextState`] telling
//! what the worker was doing (or waiting for) during the edge's interval.
//! Two derived properties drive the critical path search:
//!
//! ```text
//! state        role     matchable
//! ───────────  ───────  ─────────
//! Running      Pass     no
//! Preempted    Pass     no
//! Timer        Pass     no
//! Blocked      Block    yes        <- explained by a vertical edge
//! Network      Block    yes        <- explained by a vertical edge
//! UserInput    Pass     no
//! Default      Unknown  no
//! ```
//!
//! States are persisted as small integer codes (see [`EdgeContextState::code`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an edge for the critical path search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeRole {
    /// The edge's own duration explains the elapsed time
    Pass,
    /// The worker was waiting; another worker may explain the interval
    Block,
    /// No classification available
    Unknown,
}

/// Classification of a causal edge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EdgeContextState {
    /// Filler edge with no meaning (closing vertices, `add`)
    NoEdge,
    /// Zero-duration hop between vertices at the same timestamp
    Epsilon,
    Unknown,
    /// Plain causal link
    Default,
    Running,
    Blocked,
    Interrupted,
    Preempted,
    Timer,
    Network,
    UserInput,
    BlockDevice,
    Ipi,
}

impl EdgeContextState {
    /// Every state, in code order
    pub const ALL: [EdgeContextState; 13] = [
        EdgeContextState::NoEdge,
        EdgeContextState::Epsilon,
        EdgeContextState::Unknown,
        EdgeContextState::Default,
        EdgeContextState::Running,
        EdgeContextState::Blocked,
        EdgeContextState::Interrupted,
        EdgeContextState::Preempted,
        EdgeContextState::Timer,
        EdgeContextState::Network,
        EdgeContextState::UserInput,
        EdgeContextState::BlockDevice,
        EdgeContextState::Ipi,
    ];

    /// Integer code used for persistence
    pub fn code(self) -> u8 {
        match self {
            EdgeContextState::NoEdge => 0,
            EdgeContextState::Epsilon => 1,
            EdgeContextState::Unknown => 2,
            EdgeContextState::Default => 3,
            EdgeContextState::Running => 4,
            EdgeContextState::Blocked => 5,
            EdgeContextState::Interrupted => 6,
            EdgeContextState::Preempted => 7,
            EdgeContextState::Timer => 8,
            EdgeContextState::Network => 9,
            EdgeContextState::UserInput => 10,
            EdgeContextState::BlockDevice => 11,
            EdgeContextState::Ipi => 12,
        }
    }

    /// Decode a persisted code
    ///
    /// Total: codes that do not name a state decode to [`EdgeContextState::Unknown`].
    ///
    /// # Example
    ///
    /// ```
    /// use rastro::edge_state::EdgeContextState;
    ///
    /// assert_eq!(EdgeContextState::from_code(9), EdgeContextState::Network);
    /// assert_eq!(EdgeContextState::from_code(200), EdgeContextState::Unknown);
    /// ```
    pub fn from_code(code: u8) -> Self {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .unwrap_or(EdgeContextState::Unknown)
    }

    /// Critical path role of this state
    pub fn role(self) -> EdgeRole {
        match self {
            EdgeContextState::Blocked | EdgeContextState::Network => EdgeRole::Block,
            EdgeContextState::Epsilon | EdgeContextState::Default => EdgeRole::Unknown,
            EdgeContextState::NoEdge
            | EdgeContextState::Unknown
            | EdgeContextState::Running
            | EdgeContextState::Interrupted
            | EdgeContextState::Preempted
            | EdgeContextState::Timer
            | EdgeContextState::BlockDevice
            | EdgeContextState::Ipi
            | EdgeContextState::UserInput => EdgeRole::Pass,
        }
    }

    /// Whether a blocked interval in this state may be explained by another worker
    pub fn is_matchable(self) -> bool {
        matches!(self, EdgeContextState::Blocked | EdgeContextState::Network)
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            EdgeContextState::NoEdge => "NO_EDGE",
            EdgeContextState::Epsilon => "EPS",
            EdgeContextState::Unknown => "UNKNOWN",
            EdgeContextState::Default => "DEFAULT",
            EdgeContextState::Running => "RUNNING",
            EdgeContextState::Blocked => "BLOCKED",
            EdgeContextState::Interrupted => "INTERRUPTED",
            EdgeContextState::Preempted => "PREEMPTED",
            EdgeContextState::Timer => "TIMER",
            EdgeContextState::Network => "NETWORK",
            EdgeContextState::UserInput => "USER_INPUT",
            EdgeContextState::BlockDevice => "BLOCK_DEVICE",
            EdgeContextState::Ipi => "IPI",
        }
    }

    /// Display colour as `0xRRGGBB`
    pub fn color(self) -> u32 {
        match self {
            EdgeContextState::NoEdge => 0xFFFFFF,
            EdgeContextState::Epsilon => 0xC8C8C8,
            EdgeContextState::Unknown => 0x404040,
            EdgeContextState::Default => 0xC8C8C8,
            EdgeContextState::Running => 0x00C800,
            EdgeContextState::Blocked => 0xC80000,
            EdgeContextState::Interrupted => 0xFF8080,
            EdgeContextState::Preempted => 0xC8C800,
            EdgeContextState::Timer => 0x006400,
            EdgeContextState::Network => 0x6464FF,
            EdgeContextState::UserInput => 0x00FFFF,
            EdgeContextState::BlockDevice => 0xAA0080,
            EdgeContextState::Ipi => 0xFF00FF,
        }
    }

    /// Whether the edge carries information (everything but filler)
    pub fn is_meaningful(self) -> bool {
        self != EdgeContextState::NoEdge
    }
}

impl Default for EdgeContextState {
    fn default() -> Self {
        EdgeContextState::Default
    }
}

impl fmt::Display for EdgeContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
