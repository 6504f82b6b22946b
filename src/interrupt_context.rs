//! Per-CPU interrupt context stacks
//!
//! Handler entry events push a context, the matching exit events pop it. The
//! context on top of the stack when a thread is woken tells the builder what
//! caused the wakeup.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Linux softirq vectors
pub mod softirq {
    pub const HI: i64 = 0;
    pub const TIMER: i64 = 1;
    pub const NET_TX: i64 = 2;
    pub const NET_RX: i64 = 3;
    pub const BLOCK: i64 = 4;
    pub const BLOCK_IOPOLL: i64 = 5;
    pub const TASKLET: i64 = 6;
    pub const SCHED: i64 = 7;
    pub const HRTIMER: i64 = 8;
    pub const RCU: i64 = 9;

    /// Vectors that move network packets
    pub fn is_network(vector: i64) -> bool {
        vector == NET_RX || vector == NET_TX
    }
}

/// Hardware IRQ line of the timer interrupt
pub const IRQ_TIMER: i64 = 0;

/// x86 APIC vector of the local timer (`LOCAL_TIMER_VECTOR`)
pub const LOCAL_TIMER_VECTOR: i64 = 0xec;

/// Kind of handler running on a CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    HrTimer,
    Irq,
    /// Interrupt fully handled in hard-IRQ context (e.g. local timer vectors)
    CompleteIrq,
    SoftIrq,
    Ipi,
    PacketReception,
    None,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextKind::HrTimer => "hrtimer",
            ContextKind::Irq => "irq",
            ContextKind::CompleteIrq => "complete irq",
            ContextKind::SoftIrq => "softirq",
            ContextKind::Ipi => "ipi",
            ContextKind::PacketReception => "packet reception",
            ContextKind::None => "none",
        };
        f.write_str(name)
    }
}

/// A context frame, with the handler details the wakeup classification needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptContext {
    pub kind: ContextKind,
    pub timestamp: u64,
    /// IRQ line or softirq vector
    pub vector: Option<i64>,
    /// Handler name (IRQ name)
    pub name: Option<String>,
}

impl InterruptContext {
    pub fn new(kind: ContextKind, timestamp: u64) -> Self {
        Self {
            kind,
            timestamp,
            vector: None,
            name: None,
        }
    }

    /// The empty-stack context
    pub fn none() -> Self {
        Self::new(ContextKind::None, 0)
    }

    pub fn with_vector(mut self, vector: Option<i64>) -> Self {
        self.vector = vector;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

/// Strict LIFO of the handlers nested on one CPU
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<InterruptContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: InterruptContext) {
        self.frames.push(context);
    }

    pub fn pop(&mut self) -> Option<InterruptContext> {
        self.frames.pop()
    }

    /// Pop the top frame, expecting it to be of `kind`
    ///
    /// A mismatch is logged but the frame is still popped, so a lost exit
    /// event cannot wedge the stack. An empty stack yields `None`.
    pub fn pop_expecting(&mut self, kind: ContextKind) -> Option<InterruptContext> {
        let frame = self.frames.pop()?;
        if frame.kind != kind {
            warn!(expected = %kind, found = %frame.kind, "interrupt context mismatch");
        }
        Some(frame)
    }

    /// Top of the stack, or the `None` context when empty
    pub fn peek(&self) -> InterruptContext {
        self.frames
            .last()
            .cloned()
            .unwrap_or_else(InterruptContext::none)
    }

    /// Context directly below the top, or `None` context
    pub fn peek_inner(&self) -> InterruptContext {
        self.frames
            .len()
            .checked_sub(2)
            .and_then(|i| self.frames.get(i))
            .cloned()
            .unwrap_or_else(InterruptContext::none)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
