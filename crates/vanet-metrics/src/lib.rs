//! Diagnostic counters for the cost-sharing protocol.
//!
//! [`SharingMetrics`] is owned by the simulation harness and handed to every
//! agent as an `Arc`. Agents on different worker threads only ever increment
//! it; counters are monotonic and never reset.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Cross-agent counters, updated with atomic increments.
#[derive(Debug, Default)]
pub struct SharingMetrics {
    malicious_accepted: AtomicU64,
    genuine_accepted: AtomicU64,
    messages_sent: AtomicU64,
    messages_delivered: AtomicU64,
    outdated_echoes: AtomicU64,
    replans: AtomicU64,
}

impl SharingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accepted on-route cost matched an adversarial sentinel.
    pub fn record_malicious(&self) {
        self.malicious_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// An accepted on-route cost looked genuine.
    pub fn record_genuine(&self) {
        self.genuine_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, count: u64) {
        self.messages_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_outdated_echo(&self) {
        self.outdated_echoes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replan(&self) {
        self.replans.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            malicious_accepted: self.malicious_accepted.load(Ordering::Relaxed),
            genuine_accepted: self.genuine_accepted.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            outdated_echoes: self.outdated_echoes.load(Ordering::Relaxed),
            replans: self.replans.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`SharingMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub malicious_accepted: u64,
    pub genuine_accepted: u64,
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub outdated_echoes: u64,
    pub replans: u64,
}

impl MetricsSnapshot {
    /// Share of accepted on-route costs that were adversarial, in `[0, 1]`.
    pub fn malicious_ratio(&self) -> f64 {
        let total = self.malicious_accepted + self.genuine_accepted;
        if total == 0 {
            0.0
        } else {
            self.malicious_accepted as f64 / total as f64
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sharing: {} sent, {} delivered, {} echoes, accepted {} genuine / {} malicious, {} replans",
            self.messages_sent,
            self.messages_delivered,
            self.outdated_echoes,
            self.genuine_accepted,
            self.malicious_accepted,
            self.replans
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters_start_at_zero() {
        let m = SharingMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
        assert_eq!(m.snapshot().malicious_ratio(), 0.0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let m = Arc::new(SharingMetrics::new());
        thread::scope(|s| {
            for _ in 0..8 {
                let m = Arc::clone(&m);
                s.spawn(move || {
                    for _ in 0..1000 {
                        m.record_sent();
                        m.record_genuine();
                    }
                });
            }
        });
        let snap = m.snapshot();
        assert_eq!(snap.messages_sent, 8000);
        assert_eq!(snap.genuine_accepted, 8000);
    }

    #[test]
    fn ratio_and_display() {
        let m = SharingMetrics::new();
        m.record_malicious();
        m.record_genuine();
        m.record_genuine();
        m.record_genuine();
        m.record_delivered(5);
        let snap = m.snapshot();
        assert!((snap.malicious_ratio() - 0.25).abs() < 1e-12);
        let text = snap.to_string();
        assert!(text.contains("5 delivered"));
        assert!(text.contains("3 genuine / 1 malicious"));
    }
}
