//! Matching of network send and receive events
//!
//! A packet leaves one host through a send event and shows up, possibly in
//! another trace, as a receive event. Both carry the same packet identity
//! ([`PacketKey`]). The matcher keeps whichever side arrived first until the
//! other side is submitted, then hands both payloads to a [`MatchSink`].
//!
//! Arrival order does not matter: a receive may be submitted before its send
//! when the streams of two hosts are merged with clock skew.

use crate::event::TraceEvent;
use crate::layout::FieldNames;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Identity of a TCP segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketKey {
    pub seq: u64,
    pub ack_seq: u64,
    pub flags: u32,
}

impl PacketKey {
    /// Read the identity fields of `event`; `None` if any is missing
    pub fn from_event(event: &TraceEvent, fields: &FieldNames) -> Option<Self> {
        Some(Self {
            seq: u64::try_from(event.int(&fields.seq)?).ok()?,
            ack_seq: u64::try_from(event.int(&fields.ack_seq)?).ok()?,
            flags: u32::try_from(event.int(&fields.flags)?).ok()?,
        })
    }
}

/// Which end of the exchange an event is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchDirection {
    Send,
    Receive,
}

/// A completed send/receive pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair<T> {
    pub key: PacketKey,
    pub source: T,
    pub source_timestamp: u64,
    pub destination: T,
    pub destination_timestamp: u64,
}

/// Receiver of completed pairs
pub trait MatchSink<T> {
    fn on_match(&mut self, pair: MatchedPair<T>);
}

impl<T, F: FnMut(MatchedPair<T>)> MatchSink<T> for F {
    fn on_match(&mut self, pair: MatchedPair<T>) {
        self(pair)
    }
}

/// Matcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherStats {
    pub matched: u64,
    /// Pending endpoints dropped by the TTL or the size bound
    pub expired: u64,
    /// Pending endpoints overwritten by a newer one with the same key
    pub replaced: u64,
    pub pending_sources: usize,
    pub pending_destinations: usize,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    timestamp: u64,
    payload: T,
}

/// Pairs send and receive events by packet identity
#[derive(Debug)]
pub struct EventMatcher<T> {
    sources: FnvHashMap<PacketKey, Pending<T>>,
    destinations: FnvHashMap<PacketKey, Pending<T>>,
    ttl: Option<u64>,
    max_pending: Option<usize>,
    matched: u64,
    expired: u64,
    replaced: u64,
}

impl<T> Default for EventMatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventMatcher<T> {
    /// Matcher keeping unmatched endpoints forever
    pub fn new() -> Self {
        Self {
            sources: FnvHashMap::default(),
            destinations: FnvHashMap::default(),
            ttl: None,
            max_pending: None,
            matched: 0,
            expired: 0,
            replaced: 0,
        }
    }

    /// Drop unmatched endpoints older than `ttl` nanoseconds
    pub fn with_ttl(mut self, ttl: Option<u64>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Keep at most `max` unmatched endpoints per direction
    pub fn with_max_pending(mut self, max: Option<usize>) -> Self {
        self.max_pending = max;
        self
    }

    /// Submit one endpoint
    ///
    /// Returns `true` when it completed a pair (the sink has been called).
    pub fn submit<S: MatchSink<T> + ?Sized>(
        &mut self,
        key: PacketKey,
        direction: MatchDirection,
        timestamp: u64,
        payload: T,
        sink: &mut S,
    ) -> bool {
        self.expire(timestamp);

        let (own, other) = match direction {
            MatchDirection::Send => (&mut self.sources, &mut self.destinations),
            MatchDirection::Receive => (&mut self.destinations, &mut self.sources),
        };

        if let Some(peer) = other.remove(&key) {
            let pair = match direction {
                MatchDirection::Send => MatchedPair {
                    key,
                    source: payload,
                    source_timestamp: timestamp,
                    destination: peer.payload,
                    destination_timestamp: peer.timestamp,
                },
                MatchDirection::Receive => MatchedPair {
                    key,
                    source: peer.payload,
                    source_timestamp: peer.timestamp,
                    destination: payload,
                    destination_timestamp: timestamp,
                },
            };
            self.matched += 1;
            debug!(?key, "network events matched");
            sink.on_match(pair);
            return true;
        }

        if own.insert(key, Pending { timestamp, payload }).is_some() {
            warn!(?key, ?direction, "duplicate pending packet, keeping the newest");
            self.replaced += 1;
        }
        if let Some(max) = self.max_pending {
            while own.len() > max {
                let oldest = own
                    .iter()
                    .min_by_key(|(k, p)| (p.timestamp, k.seq, k.ack_seq, k.flags))
                    .map(|(k, _)| *k);
                match oldest {
                    Some(k) => {
                        own.remove(&k);
                        self.expired += 1;
                    }
                    None => break,
                }
            }
        }
        false
    }

    /// Drop endpoints that waited longer than the TTL before `now`
    pub fn expire(&mut self, now: u64) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.sources.len() + self.destinations.len();
        let fresh = |p: &Pending<T>| now.saturating_sub(p.timestamp) <= ttl;
        self.sources.retain(|_, p| fresh(p));
        self.destinations.retain(|_, p| fresh(p));
        let dropped = before - self.sources.len() - self.destinations.len();
        if dropped > 0 {
            warn!(dropped, now, "expired unmatched network events");
            self.expired += dropped as u64;
        }
        dropped
    }

    pub fn pending(&self) -> usize {
        self.sources.len() + self.destinations.len()
    }

    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            matched: self.matched,
            expired: self.expired,
            replaced: self.replaced,
            pending_sources: self.sources.len(),
            pending_destinations: self.destinations.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seq: u64) -> PacketKey {
        PacketKey {
            seq,
            ack_seq: 100,
            flags: 0x18,
        }
    }

    #[test]
    fn test_send_then_receive() {
        let mut matcher = EventMatcher::new();
        let mut pairs = Vec::new();
        let mut sink = |p: MatchedPair<&'static str>| pairs.push(p);
        assert!(!matcher.submit(key(1), MatchDirection::Send, 10, "out", &mut sink));
        assert!(matcher.submit(key(1), MatchDirection::Receive, 20, "in", &mut sink));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source, "out");
        assert_eq!(pairs[0].destination, "in");
        assert_eq!(pairs[0].source_timestamp, 10);
        assert_eq!(matcher.pending(), 0);
        assert_eq!(matcher.stats().matched, 1);
    }

    #[test]
    fn test_receive_before_send() {
        let mut matcher = EventMatcher::new();
        let mut pairs = Vec::new();
        let mut sink = |p: MatchedPair<u32>| pairs.push(p);
        matcher.submit(key(7), MatchDirection::Receive, 5, 2, &mut sink);
        matcher.submit(key(7), MatchDirection::Send, 8, 1, &mut sink);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].source, pairs[0].destination), (1, 2));
    }

    #[test]
    fn test_different_keys_stay_pending() {
        let mut matcher = EventMatcher::new();
        let mut sink = |_: MatchedPair<u32>| panic!("no match expected");
        matcher.submit(key(1), MatchDirection::Send, 1, 1, &mut sink);
        matcher.submit(key(2), MatchDirection::Receive, 2, 2, &mut sink);
        let stats = matcher.stats();
        assert_eq!(stats.pending_sources, 1);
        assert_eq!(stats.pending_destinations, 1);
    }

    #[test]
    fn test_duplicate_replaces() {
        let mut matcher = EventMatcher::new();
        let mut pairs = Vec::new();
        let mut sink = |p: MatchedPair<u32>| pairs.push(p);
        matcher.submit(key(1), MatchDirection::Send, 1, 1, &mut sink);
        matcher.submit(key(1), MatchDirection::Send, 2, 2, &mut sink);
        matcher.submit(key(1), MatchDirection::Receive, 3, 3, &mut sink);
        assert_eq!(pairs[0].source, 2);
        assert_eq!(matcher.stats().replaced, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let mut matcher = EventMatcher::new().with_ttl(Some(100));
        let mut sink = |_: MatchedPair<u32>| panic!("expired endpoint must not match");
        matcher.submit(key(1), MatchDirection::Send, 0, 1, &mut sink);
        matcher.submit(key(2), MatchDirection::Send, 150, 2, &mut sink);
        assert_eq!(matcher.stats().expired, 1);
        assert!(!matcher.submit(key(1), MatchDirection::Receive, 160, 3, &mut sink));
        assert_eq!(matcher.pending(), 2);
    }

    #[test]
    fn test_max_pending_drops_oldest() {
        let mut matcher = EventMatcher::new().with_max_pending(Some(2));
        let mut sink = |_: MatchedPair<u32>| {};
        for seq in 0..4 {
            matcher.submit(key(seq), MatchDirection::Send, seq * 10, seq as u32, &mut sink);
        }
        let stats = matcher.stats();
        assert_eq!(stats.pending_sources, 2);
        assert_eq!(stats.expired, 2);
        let mut pairs = Vec::new();
        let mut sink = |p: MatchedPair<u32>| pairs.push(p);
        assert!(!matcher.submit(key(0), MatchDirection::Receive, 50, 9, &mut sink));
        assert!(matcher.submit(key(3), MatchDirection::Receive, 50, 9, &mut sink));
    }

    #[test]
    fn test_key_from_event() {
        let fields = FieldNames::default();
        let event = TraceEvent::new("inet_sock_local_out", 1, 0)
            .with_field("seq", 11)
            .with_field("ack_seq", 22)
            .with_field("flags", 0x10);
        assert_eq!(
            PacketKey::from_event(&event, &fields),
            Some(PacketKey {
                seq: 11,
                ack_seq: 22,
                flags: 0x10
            })
        );
        let partial = TraceEvent::new("inet_sock_local_out", 1, 0).with_field("seq", 11);
        assert_eq!(PacketKey::from_event(&partial, &fields), None);
    }
}
