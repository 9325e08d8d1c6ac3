//! Internal-only metrics: counters and a latency histogram for
//! `SignalSystem::emit`,
//! filter match/miss tallies, subscriber notifications, panics, and WAL
//! errors. Nothing here is exported over the wire — an embedder that wants
//! a `/metrics` endpoint scrapes [`registry`] itself.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref EVENTS_TOTAL: IntCounter = IntCounter::new(
        "axon_events_total",
        "Total SignalEvents accepted by emit()"
    )
    .expect("metric definition");

    pub static ref EVENTS_BY_TYPE: IntCounterVec = IntCounterVec::new(
        Opts::new("axon_events_by_type_total", "SignalEvents accepted, by event_type"),
        &["event_type"]
    )
    .expect("metric definition");

    pub static ref EMIT_DURATION_US: HistogramVec = HistogramVec::new(
        HistogramOpts::new("axon_emit_duration_us", "emit() processing time in microseconds")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
        &["event_type"]
    )
    .expect("metric definition");

    pub static ref FILTER_MATCHES: IntCounter =
        IntCounter::new("axon_filter_matches_total", "Subscriber filter evaluations that matched")
            .expect("metric definition");

    pub static ref FILTER_MISSES: IntCounter =
        IntCounter::new("axon_filter_misses_total", "Subscriber filter evaluations that missed")
            .expect("metric definition");

    pub static ref SUBSCRIBER_NOTIFICATIONS: IntCounter = IntCounter::new(
        "axon_subscriber_notifications_total",
        "Events successfully delivered to a subscriber"
    )
    .expect("metric definition");

    pub static ref PANICS_TOTAL: IntCounter =
        IntCounter::new("axon_panics_total", "Panics caught at a catch_panic boundary")
            .expect("metric definition");

    pub static ref WAL_ERRORS_TOTAL: IntCounter =
        IntCounter::new("axon_wal_errors_total", "Append-only log write errors")
            .expect("metric definition");
}

/// Register every collector with [`REGISTRY`]. Idempotent: safe to call
/// once at `Runtime` construction; a second call is a no-op since
/// `prometheus::Registry::register` errors are swallowed here (duplicate
/// registration only happens in tests that construct more than one
/// `Runtime` in the same process).
pub fn register_all() {
    let _ = REGISTRY.register(Box::new(EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EVENTS_BY_TYPE.clone()));
    let _ = REGISTRY.register(Box::new(EMIT_DURATION_US.clone()));
    let _ = REGISTRY.register(Box::new(FILTER_MATCHES.clone()));
    let _ = REGISTRY.register(Box::new(FILTER_MISSES.clone()));
    let _ = REGISTRY.register(Box::new(SUBSCRIBER_NOTIFICATIONS.clone()));
    let _ = REGISTRY.register(Box::new(PANICS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WAL_ERRORS_TOTAL.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let before = EVENTS_TOTAL.get();
        EVENTS_TOTAL.inc();
        assert_eq!(EVENTS_TOTAL.get(), before + 1);
    }

    #[test]
    fn register_all_is_idempotent() {
        register_all();
        register_all();
    }
}
