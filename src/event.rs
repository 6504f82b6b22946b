//! Trace events consumed by the graph builder
//!
//! Events come from an external decoder. The builder needs only the event
//! name, timestamp, CPU, host and a bag of named integer or string fields.
//! The on-disk form read by the CLI is one JSON object per line:
//!
//! ```text
//! {"name":"sched_switch","timestamp":1200,"cpu":0,"host":"web1",
//!  "fields":{"prev_tid":42,"prev_state":1,"next_tid":0}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;

/// Value of an event field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// A decoded trace event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    /// Nanoseconds
    pub timestamp: u64,
    #[serde(default)]
    pub cpu: Option<u32>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl TraceEvent {
    pub fn new(name: impl Into<String>, timestamp: u64, cpu: u32) -> Self {
        Self {
            name: name.into(),
            timestamp,
            cpu: Some(cpu),
            host: String::new(),
            fields: HashMap::new(),
        }
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Integer field; numeric strings are accepted
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Str(s) => s.trim().parse().ok(),
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Str(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }
}

/// Read a JSON-lines event stream, skipping blank lines
pub fn read_events<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<TraceEvent, serde_json::Error>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line)),
        Err(err) => Some(Err(serde_json::Error::io(err))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_line() {
        let line = r#"{"name":"sched_switch","timestamp":5,"cpu":1,"host":"h","fields":{"prev_tid":42,"prev_comm":"app","next_tid":"7"}}"#;
        let event: TraceEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.name, "sched_switch");
        assert_eq!(event.cpu, Some(1));
        assert_eq!(event.int("prev_tid"), Some(42));
        assert_eq!(event.int("next_tid"), Some(7));
        assert_eq!(event.str("prev_comm"), Some("app"));
        assert_eq!(event.int("missing"), None);
    }

    #[test]
    fn test_optional_parts_default() {
        let event: TraceEvent = serde_json::from_str(r#"{"name":"x","timestamp":1}"#).unwrap();
        assert_eq!(event.cpu, None);
        assert!(event.host.is_empty());
        assert!(event.fields.is_empty());
    }

    #[test]
    fn test_read_events_skips_blank_lines() {
        let input = "{\"name\":\"a\",\"timestamp\":1}\n\n{\"name\":\"b\",\"timestamp\":2}\nnot json\n";
        let events: Vec<_> = read_events(input.as_bytes()).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].as_ref().unwrap().name, "b");
        assert!(events[2].is_err());
    }

    #[test]
    fn test_builder_helpers() {
        let event = TraceEvent::new("irq_handler_entry", 10, 2)
            .on_host("h1")
            .with_field("irq", 19)
            .with_field("name", "eth0");
        assert_eq!(event.host, "h1");
        assert_eq!(event.int("irq"), Some(19));
        assert_eq!(event.str("name"), Some("eth0"));
        assert_eq!(event.str("irq"), None);
    }
}
