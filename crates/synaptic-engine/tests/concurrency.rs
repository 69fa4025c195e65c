//! Stress test for the per-synapse locking discipline (§5).
//!
//! Many threads hammer a single shared synapse concurrently; nothing here
//! should panic, deadlock, or leave the weight outside its configured
//! bounds.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use synaptic_engine::callbacks::testing::RecordingCallbacks;
use synaptic_engine::{Synapse, SynapseConfig};

#[test]
fn concurrent_transmit_and_plasticity_never_panics_or_corrupts_state() {
    let mut cfg = SynapseConfig::new("syn-stress", "pre", "post");
    cfg.stdp.cooperativity_threshold = 1;
    cfg.vesicles.baseline_probability = 0.9;
    let callbacks = RecordingCallbacks::new(Duration::ZERO);
    let syn = Arc::new(Synapse::new(cfg, callbacks).unwrap());

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let syn = Arc::clone(&syn);
            thread::spawn(move || {
                for j in 0..500 {
                    let _ = syn.transmit(1.0);
                    let dt = if (i + j) % 2 == 0 { -5_000_000 } else { 5_000_000 };
                    syn.apply_plasticity(dt, 2);
                    let _ = syn.should_prune();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().expect("worker thread must not panic");
    }

    let weight = syn.get_weight();
    assert!(weight.is_finite());
    assert!((0.001..=2.0).contains(&weight));

    let stats = syn.statistics();
    assert!(stats.activity.total_transmissions > 0);
    assert!(stats.plasticity.total_calls > 0);
}

#[test]
fn transmission_history_stays_bounded_under_heavy_load() {
    let cfg = SynapseConfig::new("syn-history", "pre", "post");
    let callbacks = RecordingCallbacks::new(Duration::ZERO);
    let syn = Arc::new(Synapse::new(cfg, callbacks).unwrap());

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let syn = Arc::clone(&syn);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let _ = syn.transmit(1.0);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let stats = syn.statistics();
    assert_eq!(stats.activity.total_transmissions, 8000);
}
