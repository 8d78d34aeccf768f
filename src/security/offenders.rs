//! Failed-attempt tracking and temporary blocking per client address.
//!
//! # Window Semantics
//! The window is anchored at the earliest recorded attempt. Once that attempt
//! is older than the window, the whole history is discarded and the new
//! attempt starts a fresh count. The attempt that takes the count past
//! `max_attempts` blocks the address for `block_secs`.
//!
//! # Design Decisions
//! - One `DashMap` entry per address; the entry guard makes the
//!   read-reset-append-compare sequence atomic per address
//! - Block expiry is evaluated lazily on read; `sweep` only reclaims memory

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::OffenderConfig;
use crate::observability::logging::AUDIT_TARGET;
use crate::observability::metrics;

#[derive(Debug, Default)]
struct OffenderRecord {
    attempts: Vec<SystemTime>,
    blocked_until: Option<SystemTime>,
}

impl OffenderRecord {
    fn is_blocked_at(&self, now: SystemTime) -> Option<SystemTime> {
        self.blocked_until.filter(|until| now < *until)
    }
}

/// Read-only view of one tracked address.
#[derive(Debug, Clone, Serialize)]
pub struct OffenderSnapshot {
    pub address: String,
    pub attempts: usize,
    /// Seconds since the Unix epoch, present while the block is active.
    pub blocked_until: Option<f64>,
}

/// Per-address failure counter with temporary blocking.
pub struct OffenderTracker {
    records: DashMap<String, OffenderRecord>,
    max_attempts: usize,
    window: Duration,
    block: Duration,
}

impl OffenderTracker {
    pub fn new(config: &OffenderConfig) -> Self {
        Self {
            records: DashMap::new(),
            max_attempts: config.max_attempts.max(1) as usize,
            window: secs(config.window_secs),
            block: secs(config.block_secs),
        }
    }

    /// Whether `address` is currently blocked, and until when.
    pub fn is_blocked(&self, address: &str) -> (bool, Option<SystemTime>) {
        let now = SystemTime::now();
        match self
            .records
            .get(address)
            .and_then(|record| record.is_blocked_at(now))
        {
            Some(until) => (true, Some(until)),
            None => (false, None),
        }
    }

    /// Record a failed attempt. Returns whether this attempt blocked the address.
    pub fn register_attempt(&self, address: &str, tenant_code: &str) -> (bool, String) {
        let now = SystemTime::now();
        metrics::record_offender_attempt();

        let mut inserted = false;
        let mut record = self.records.entry(address.to_string()).or_insert_with(|| {
            inserted = true;
            OffenderRecord::default()
        });

        let window_lapsed = record
            .attempts
            .first()
            .map_or(true, |first| elapsed(*first, now) > self.window);
        if window_lapsed {
            record.attempts.clear();
        }
        record.attempts.push(now);

        let count = record.attempts.len();
        let until = (count > self.max_attempts).then(|| now + self.block);
        if until.is_some() {
            record.blocked_until = until;
        }
        // Shard lock must be released before counting the map.
        drop(record);
        if inserted {
            metrics::record_tracked_offenders(self.records.len());
        }

        let Some(until) = until else {
            tracing::debug!(address = %address, tenant = %tenant_code, attempts = count, "Failed attempt recorded");
            return (false, String::new());
        };

        metrics::record_offender_block();
        tracing::warn!(
            target: AUDIT_TARGET,
            address = %address,
            tenant = %tenant_code,
            attempts = count,
            block_secs = self.block.as_secs_f64(),
            "Client blocked after repeated failures"
        );
        (true, blocked_reason(until))
    }

    /// Forget an address entirely. Returns true if it was tracked.
    pub fn reset(&self, address: &str) -> bool {
        let removed = self.records.remove(address).is_some();
        if removed {
            tracing::info!(target: AUDIT_TARGET, address = %address, "Offender record reset");
            metrics::record_tracked_offenders(self.records.len());
        }
        removed
    }

    /// Drop records that are unblocked and whose window has lapsed.
    ///
    /// Such records would be reset wholesale by the next attempt anyway.
    pub fn sweep(&self) -> usize {
        let now = SystemTime::now();
        let before = self.records.len();
        self.records.retain(|_, record| {
            record.is_blocked_at(now).is_some()
                || record
                    .attempts
                    .first()
                    .is_some_and(|first| elapsed(*first, now) <= self.window)
        });
        let after = self.records.len();
        metrics::record_tracked_offenders(after);
        before.saturating_sub(after)
    }

    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    pub fn snapshot(&self) -> Vec<OffenderSnapshot> {
        let now = SystemTime::now();
        let mut list: Vec<OffenderSnapshot> = self
            .records
            .iter()
            .map(|entry| OffenderSnapshot {
                address: entry.key().clone(),
                attempts: entry.attempts.len(),
                blocked_until: entry.is_blocked_at(now).map(unix_secs),
            })
            .collect();
        list.sort_by(|a, b| a.address.cmp(&b.address));
        list
    }

    /// Periodically sweep idle records until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.tracked(), "Swept idle offender records");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Offender sweeper received shutdown signal, exiting loop");
                    return;
                }
            }
        }
    }
}

/// Human-facing reason for an active block.
pub fn blocked_reason(until: SystemTime) -> String {
    format!("Blocked until {:.3}", unix_secs(until))
}

fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

fn elapsed(earlier: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(earlier).unwrap_or_default()
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::metrics::{
        with_local_recorder, Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder,
        SharedString, Unit,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread::sleep;

    fn tracker(max_attempts: u32, window_secs: f64, block_secs: f64) -> OffenderTracker {
        OffenderTracker::new(&OffenderConfig {
            max_attempts,
            window_secs,
            block_secs,
            sweep_interval_secs: 60,
        })
    }

    #[test]
    fn test_block_after_threshold_and_expiry() {
        let offenders = tracker(1, 60.0, 0.2);

        assert_eq!(offenders.register_attempt("10.0.0.1", "acme"), (false, String::new()));

        let (blocked, reason) = offenders.register_attempt("10.0.0.1", "acme");
        assert!(blocked);
        assert!(reason.starts_with("Blocked until "));

        let (blocked, until) = offenders.is_blocked("10.0.0.1");
        assert!(blocked);
        assert!(until.unwrap() > SystemTime::now());

        sleep(Duration::from_millis(300));
        assert!(!offenders.is_blocked("10.0.0.1").0);
    }

    #[test]
    fn test_window_resets_wholesale() {
        let offenders = tracker(2, 0.2, 60.0);

        assert!(!offenders.register_attempt("10.0.0.2", "").0);
        assert!(!offenders.register_attempt("10.0.0.2", "").0);

        sleep(Duration::from_millis(300));

        assert_eq!(offenders.register_attempt("10.0.0.2", ""), (false, String::new()));
        assert_eq!(offenders.snapshot()[0].attempts, 1);
        assert!(!offenders.is_blocked("10.0.0.2").0);
    }

    /// Recorder capturing only the tracked-offenders gauge.
    #[derive(Default)]
    struct TrackedGauge(AtomicU64);

    impl ::metrics::GaugeFn for TrackedGauge {
        fn increment(&self, value: f64) {
            self.set(self.value() + value);
        }

        fn decrement(&self, value: f64) {
            self.set(self.value() - value);
        }

        fn set(&self, value: f64) {
            self.0.store(value.to_bits(), Ordering::SeqCst);
        }
    }

    impl TrackedGauge {
        fn value(&self) -> f64 {
            f64::from_bits(self.0.load(Ordering::SeqCst))
        }
    }

    #[derive(Default)]
    struct GaugeRecorder(Arc<TrackedGauge>);

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == "gateway_tracked_offenders" {
                Gauge::from_arc(self.0.clone())
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_tracked_gauge_follows_new_records() {
        let recorder = GaugeRecorder::default();
        with_local_recorder(&recorder, || {
            let offenders = tracker(5, 60.0, 60.0);

            offenders.register_attempt("a", "");
            assert_eq!(recorder.0.value(), 1.0);

            offenders.register_attempt("a", "");
            offenders.register_attempt("b", "");
            assert_eq!(recorder.0.value(), 2.0);

            offenders.reset("a");
            assert_eq!(recorder.0.value(), 1.0);
        });
    }

    #[test]
    fn test_addresses_are_independent() {
        let offenders = tracker(1, 60.0, 60.0);
        offenders.register_attempt("a", "");
        offenders.register_attempt("a", "");

        assert!(offenders.is_blocked("a").0);
        assert!(!offenders.is_blocked("b").0);
        assert_eq!(offenders.is_blocked("b"), (false, None));
    }

    #[test]
    fn test_reset_unblocks() {
        let offenders = tracker(1, 60.0, 60.0);
        offenders.register_attempt("a", "");
        offenders.register_attempt("a", "");

        assert!(offenders.reset("a"));
        assert!(!offenders.is_blocked("a").0);
        assert!(!offenders.reset("a"));
    }

    #[test]
    fn test_sweep_keeps_live_records() {
        let offenders = tracker(1, 0.1, 60.0);
        offenders.register_attempt("blocked", "");
        offenders.register_attempt("blocked", "");
        offenders.register_attempt("idle", "");

        sleep(Duration::from_millis(200));
        offenders.register_attempt("fresh", "");

        assert_eq!(offenders.sweep(), 1);
        let addresses: Vec<String> = offenders.snapshot().into_iter().map(|s| s.address).collect();
        assert_eq!(addresses, vec!["blocked".to_string(), "fresh".to_string()]);
    }

    #[test]
    fn test_concurrent_attempts_count_exactly() {
        let offenders = Arc::new(tracker(50, 60.0, 60.0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let offenders = offenders.clone();
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|_| offenders.register_attempt("shared", "").0)
                        .count()
                })
            })
            .collect();

        let blocks: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 80 attempts against a limit of 50: attempts 51..=80 all report a block.
        assert_eq!(blocks, 30);
        assert_eq!(offenders.snapshot()[0].attempts, 80);
    }
}
