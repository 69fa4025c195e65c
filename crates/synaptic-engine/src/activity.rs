//! Bounded event history and derived statistics (§3, §4.3).
//!
//! Fixed-capacity ring buffers of transmission and plasticity events, with
//! O(1) append and an O(1) atomically-updated running total so
//! `statistics()` never has to walk the buffers.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::constants::{MAX_PLASTICITY_HISTORY, MAX_TRANSMISSION_HISTORY};
use crate::ring_buffer::RingBuffer;

/// One transmission attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionEventRecord {
    #[serde(skip)]
    pub at: Option<Instant>,
    pub released: bool,
    pub effective_value: f64,
}

/// Kind of plasticity event recorded for a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlasticityEventKind {
    Ltp,
    Ltd,
    NoChange,
}

/// One completed `apply_plasticity` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlasticityEventRecord {
    #[serde(skip)]
    pub at: Option<Instant>,
    pub kind: PlasticityEventKind,
    pub weight_before: f64,
    pub weight_after: f64,
    pub delta: f64,
    /// Free-form context tag supplied by the caller (e.g. "cooperative"),
    /// mirrored into `report_plasticity_event`.
    pub context: String,
}

/// Snapshot of monitor state; cheap to clone, safe to hand to a caller
/// outside the synapse's lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityStatistics {
    pub total_transmissions: u64,
    pub total_releases: u64,
    pub total_plasticity_events: u64,
    pub total_ltp_events: u64,
    pub total_ltd_events: u64,
    /// Count of `DeliveryFailed` outcomes (§7: "counted in statistics;
    /// not retried internally").
    pub total_delivery_failures: u64,
    pub average_effective_value: f64,
    pub average_weight_delta: f64,
}

/// Bounded history of a single synapse's runtime activity.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    transmissions: RingBuffer<TransmissionEventRecord>,
    plasticity_events: RingBuffer<PlasticityEventRecord>,
    stats: ActivityStatistics,
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityMonitor {
    pub fn new() -> Self {
        Self {
            transmissions: RingBuffer::new(MAX_TRANSMISSION_HISTORY),
            plasticity_events: RingBuffer::new(MAX_PLASTICITY_HISTORY),
            stats: ActivityStatistics::default(),
        }
    }

    pub fn record_transmission(&mut self, released: bool, effective_value: f64) {
        self.stats.total_transmissions += 1;
        if released {
            self.stats.total_releases += 1;
        }
        let n = self.stats.total_transmissions as f64;
        self.stats.average_effective_value +=
            (effective_value - self.stats.average_effective_value) / n;

        self.transmissions.push(TransmissionEventRecord {
            at: Some(Instant::now()),
            released,
            effective_value,
        });
    }

    pub fn record_plasticity_event(
        &mut self,
        kind: PlasticityEventKind,
        weight_before: f64,
        weight_after: f64,
        delta: f64,
        context: impl Into<String>,
    ) -> PlasticityEventRecord {
        self.stats.total_plasticity_events += 1;
        match kind {
            PlasticityEventKind::Ltp => self.stats.total_ltp_events += 1,
            PlasticityEventKind::Ltd => self.stats.total_ltd_events += 1,
            PlasticityEventKind::NoChange => {}
        }
        let n = self.stats.total_plasticity_events as f64;
        self.stats.average_weight_delta += (delta - self.stats.average_weight_delta) / n;

        let record = PlasticityEventRecord {
            at: Some(Instant::now()),
            kind,
            weight_before,
            weight_after,
            delta,
            context: context.into(),
        };
        self.plasticity_events.push(record.clone());
        record
    }

    /// Record a `DeliveryFailed` outcome (§7). Not tied to a ring buffer
    /// entry — just the running count callers read via `statistics()`.
    pub fn record_delivery_failure(&mut self) {
        self.stats.total_delivery_failures += 1;
    }

    pub fn statistics(&self) -> ActivityStatistics {
        self.stats.clone()
    }

    pub fn transmissions(&self) -> Vec<TransmissionEventRecord> {
        self.transmissions.to_vec()
    }

    pub fn plasticity_events(&self) -> Vec<PlasticityEventRecord> {
        self.plasticity_events.to_vec()
    }

    pub fn reset(&mut self) {
        self.transmissions.clear();
        self.plasticity_events.clear();
        self.stats = ActivityStatistics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_stay_within_capacity() {
        let mut mon = ActivityMonitor::new();
        for i in 0..(MAX_TRANSMISSION_HISTORY * 2) {
            mon.record_transmission(i % 2 == 0, i as f64);
        }
        assert_eq!(mon.transmissions().len(), MAX_TRANSMISSION_HISTORY);
        assert_eq!(mon.statistics().total_transmissions, (MAX_TRANSMISSION_HISTORY * 2) as u64);
    }

    #[test]
    fn running_average_matches_naive_mean() {
        let mut mon = ActivityMonitor::new();
        let values = [1.0, 2.0, 3.0, 4.0];
        for v in values {
            mon.record_transmission(true, v);
        }
        let expected: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mon.statistics().average_effective_value - expected).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut mon = ActivityMonitor::new();
        mon.record_transmission(true, 1.0);
        mon.record_plasticity_event(PlasticityEventKind::Ltp, 0.5, 0.6, 0.1, "test");
        mon.reset();
        assert!(mon.transmissions().is_empty());
        assert!(mon.plasticity_events().is_empty());
        assert_eq!(mon.statistics().total_transmissions, 0);
    }
}
