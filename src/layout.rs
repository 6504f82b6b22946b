//! Event and field names understood by the graph builder
//!
//! Defaults follow the LTTng kernel tracer. Traces produced by other tracers
//! can be analysed by overriding names in the `[layout]` section of the
//! configuration file.

use crate::interrupt_context::LOCAL_TIMER_VECTOR;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the builder does with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SchedSwitch,
    Wakeup,
    Fork,
    Exit,
    IrqEntry,
    IrqExit,
    SoftIrqEntry,
    SoftIrqExit,
    HrTimerEntry,
    HrTimerExit,
    IpiEntry,
    IpiExit,
    CompleteIrqEntry,
    CompleteIrqExit,
    PacketReceptionEntry,
    PacketReceptionExit,
    NetworkSend,
    NetworkReceive,
}

/// Field names read from events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub prev_tid: String,
    pub prev_state: String,
    pub prev_comm: String,
    pub next_tid: String,
    pub next_comm: String,
    /// Thread of wakeup and exit events
    pub tid: String,
    pub comm: String,
    pub parent_tid: String,
    pub child_tid: String,
    pub child_comm: String,
    pub irq: String,
    pub irq_name: String,
    pub softirq_vector: String,
    /// Vector of complete-IRQ and IPI handlers
    pub vector: String,
    pub seq: String,
    pub ack_seq: String,
    pub flags: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            prev_tid: "prev_tid".into(),
            prev_state: "prev_state".into(),
            prev_comm: "prev_comm".into(),
            next_tid: "next_tid".into(),
            next_comm: "next_comm".into(),
            tid: "tid".into(),
            comm: "comm".into(),
            parent_tid: "parent_tid".into(),
            child_tid: "child_tid".into(),
            child_comm: "child_comm".into(),
            irq: "irq".into(),
            irq_name: "name".into(),
            softirq_vector: "vec".into(),
            vector: "vector".into(),
            seq: "seq".into(),
            ack_seq: "ack_seq".into(),
            flags: "flags".into(),
        }
    }
}

/// Event names, per builder concern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLayout {
    pub sched_switch: Vec<String>,
    pub wakeup: Vec<String>,
    pub fork: Vec<String>,
    pub exit: Vec<String>,
    pub irq_entry: Vec<String>,
    pub irq_exit: Vec<String>,
    pub softirq_entry: Vec<String>,
    pub softirq_exit: Vec<String>,
    pub hrtimer_entry: Vec<String>,
    pub hrtimer_exit: Vec<String>,
    pub ipi_entry: Vec<String>,
    pub ipi_exit: Vec<String>,
    pub complete_irq_entry: Vec<String>,
    pub complete_irq_exit: Vec<String>,
    pub packet_reception_entry: Vec<String>,
    pub packet_reception_exit: Vec<String>,
    pub network_send: Vec<String>,
    pub network_receive: Vec<String>,
    /// Complete-IRQ vectors raised by the local timer
    pub timer_vectors: Vec<i64>,
    pub fields: FieldNames,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for EventLayout {
    fn default() -> Self {
        Self::lttng()
    }
}

impl EventLayout {
    /// LTTng kernel tracer naming
    pub fn lttng() -> Self {
        Self {
            sched_switch: names(&["sched_switch"]),
            wakeup: names(&["sched_waking", "sched_wakeup", "sched_wakeup_new"]),
            fork: names(&["sched_process_fork"]),
            exit: names(&["sched_process_exit"]),
            irq_entry: names(&["irq_handler_entry"]),
            irq_exit: names(&["irq_handler_exit"]),
            softirq_entry: names(&["irq_softirq_entry"]),
            softirq_exit: names(&["irq_softirq_exit"]),
            hrtimer_entry: names(&["timer_hrtimer_expire_entry"]),
            hrtimer_exit: names(&["timer_hrtimer_expire_exit"]),
            ipi_entry: names(&[
                "x86_irq_vectors_reschedule_entry",
                "x86_irq_vectors_call_function_entry",
                "x86_irq_vectors_call_function_single_entry",
                "x86_irq_vectors_irq_work_entry",
            ]),
            ipi_exit: names(&[
                "x86_irq_vectors_reschedule_exit",
                "x86_irq_vectors_call_function_exit",
                "x86_irq_vectors_call_function_single_exit",
                "x86_irq_vectors_irq_work_exit",
            ]),
            complete_irq_entry: names(&["x86_irq_vectors_local_timer_entry"]),
            complete_irq_exit: names(&["x86_irq_vectors_local_timer_exit"]),
            packet_reception_entry: names(&[
                "net_if_receive_skb_entry",
                "net_napi_gro_receive_entry",
            ]),
            packet_reception_exit: names(&[
                "net_if_receive_skb_exit",
                "net_napi_gro_receive_exit",
            ]),
            network_send: names(&["inet_sock_local_out"]),
            network_receive: names(&["inet_sock_local_in"]),
            timer_vectors: vec![LOCAL_TIMER_VECTOR],
            fields: FieldNames::default(),
        }
    }

    fn groups(&self) -> [(&Vec<String>, EventKind); 18] {
        [
            (&self.sched_switch, EventKind::SchedSwitch),
            (&self.wakeup, EventKind::Wakeup),
            (&self.fork, EventKind::Fork),
            (&self.exit, EventKind::Exit),
            (&self.irq_entry, EventKind::IrqEntry),
            (&self.irq_exit, EventKind::IrqExit),
            (&self.softirq_entry, EventKind::SoftIrqEntry),
            (&self.softirq_exit, EventKind::SoftIrqExit),
            (&self.hrtimer_entry, EventKind::HrTimerEntry),
            (&self.hrtimer_exit, EventKind::HrTimerExit),
            (&self.ipi_entry, EventKind::IpiEntry),
            (&self.ipi_exit, EventKind::IpiExit),
            (&self.complete_irq_entry, EventKind::CompleteIrqEntry),
            (&self.complete_irq_exit, EventKind::CompleteIrqExit),
            (&self.packet_reception_entry, EventKind::PacketReceptionEntry),
            (&self.packet_reception_exit, EventKind::PacketReceptionExit),
            (&self.network_send, EventKind::NetworkSend),
            (&self.network_receive, EventKind::NetworkReceive),
        ]
    }

    /// Name to kind lookup table
    ///
    /// Fails with the first event name listed under two kinds.
    pub fn index(&self) -> Result<HashMap<String, EventKind>, String> {
        let mut index = HashMap::new();
        for (list, kind) in self.groups() {
            for name in list {
                if let Some(existing) = index.insert(name.clone(), kind) {
                    if existing != kind {
                        return Err(format!(
                            "event '{}' is listed as both {:?} and {:?}",
                            name, existing, kind
                        ));
                    }
                }
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lttng_index() {
        let index = EventLayout::lttng().index().unwrap();
        assert_eq!(index.get("sched_switch"), Some(&EventKind::SchedSwitch));
        assert_eq!(index.get("sched_wakeup_new"), Some(&EventKind::Wakeup));
        assert_eq!(index.get("irq_softirq_entry"), Some(&EventKind::SoftIrqEntry));
        assert_eq!(index.get("inet_sock_local_in"), Some(&EventKind::NetworkReceive));
        assert_eq!(index.get("syscall_entry_read"), None);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut layout = EventLayout::lttng();
        layout.irq_exit.push("irq_handler_entry".into());
        let err = layout.index().unwrap_err();
        assert!(err.contains("irq_handler_entry"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let layout: EventLayout = toml::from_str(
            r#"
            sched_switch = ["my_switch"]
            [fields]
            next_tid = "ntid"
            "#,
        )
        .unwrap();
        assert_eq!(layout.sched_switch, vec!["my_switch".to_string()]);
        assert_eq!(layout.fields.next_tid, "ntid");
        assert_eq!(layout.fields.prev_tid, "prev_tid");
        assert_eq!(layout.wakeup, EventLayout::lttng().wakeup);
        assert_eq!(layout.timer_vectors, vec![LOCAL_TIMER_VECTOR]);
    }
}
