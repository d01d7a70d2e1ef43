//! Entropy quality tests for collector seeds.
//!
//! Shannon entropy for uniform bytes approaches 8.0 bits/byte as the sample
//! grows. For finite samples not all 256 values appear, so thresholds are
//! relaxed to catch degenerate output (all-zeros, repeated patterns) without
//! false positives:
//!
//! | Sample size | Expected entropy | Threshold |
//! |-------------|------------------|-----------|
//! | 32 bytes    | ~4.88            | 4.0       |
//! | 1 KB        | ~7.81            | 7.5       |

use std::sync::Arc;

use trez_core::{CollectorConfig, EntropyCollector, EntropyPool};

/// Shannon entropy of a byte slice (bits per byte).
#[allow(clippy::cast_precision_loss)]
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] = freq[b as usize].saturating_add(1);
    }
    let len = data.len() as f64;
    freq.iter()
        .filter(|&&f| f > 0)
        .map(|&f| {
            let p = f as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn fast_collector(pool: Arc<EntropyPool>) -> EntropyCollector {
    EntropyCollector::with_config(
        pool,
        CollectorConfig {
            jitter_window_ms: 1,
            jitter_samples: 4,
            min_sample_bits: 1,
            diffusion_window_ms: 1,
            ..CollectorConfig::default()
        },
    )
    .expect("collector config should be valid")
}

#[test]
fn single_seed_entropy() {
    let collector = fast_collector(Arc::new(EntropyPool::new()));
    let seed = collector.collect_seed().expect("seed collection should succeed");
    let entropy = shannon_entropy(seed.expose());
    assert!(
        entropy > 4.0,
        "collect_seed() entropy too low: {entropy:.4} (expected > 4.0)"
    );
}

/// Even a pool with every slot at zero must not yield structured seeds.
#[test]
fn concatenated_seeds_1kb_entropy() {
    let collector = fast_collector(Arc::new(EntropyPool::zeroed()));
    let mut data = Vec::with_capacity(1024);
    for _ in 0..32 {
        let seed = collector.collect_seed().expect("seed collection should succeed");
        data.extend_from_slice(seed.expose());
    }
    let entropy = shannon_entropy(&data);
    assert!(
        entropy > 7.5,
        "32 concatenated seeds entropy too low: {entropy:.4} (expected > 7.5)"
    );
}

#[test]
fn consecutive_seeds_are_distinct() {
    let collector = fast_collector(Arc::new(EntropyPool::zeroed()));
    let a = collector.collect_seed().expect("seed collection should succeed");
    let b = collector.collect_seed().expect("seed collection should succeed");
    assert_ne!(a.expose(), b.expose());
}
