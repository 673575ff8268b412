// Counters for units of work absorbed by the log-and-continue policy
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DropCounters {
    received: AtomicU64,
    forwarded: AtomicU64,
    decode_dropped: AtomicU64,
    publish_dropped: AtomicU64,
    relay_dropped: AtomicU64,
}

/// Point-in-time copy of `DropCounters`, served on `/metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub decode_dropped: u64,
    pub publish_dropped: u64,
    pub relay_dropped: u64,
}

impl DropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_drop(&self) {
        self.decode_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_drop(&self) {
        self.publish_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relay_drop(&self) {
        self.relay_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DropSnapshot {
        DropSnapshot {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            decode_dropped: self.decode_dropped.load(Ordering::Relaxed),
            publish_dropped: self.publish_dropped.load(Ordering::Relaxed),
            relay_dropped: self.relay_dropped.load(Ordering::Relaxed),
        }
    }
}
