//! Entropy mixing and seed collection feeding the envelope codec.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::stubs::XorDevice;
use trez_core::{
    dissect, CollectorConfig, EncryptConfig, EntropyCollector, EntropyPool, EntropySource,
    EnvelopeCodec,
};

fn fast_collector(pool: Arc<EntropyPool>) -> EntropyCollector {
    EntropyCollector::with_config(
        pool,
        CollectorConfig {
            jitter_window_ms: 1,
            jitter_samples: 8,
            min_sample_bits: 1,
            diffusion_window_ms: 2,
            ..CollectorConfig::default()
        },
    )
    .expect("collector config should be valid")
}

/// Returns (wrapped secret from the header, secret sent to the device).
fn wrapped_secret_for(entropy: Option<&dyn EntropySource>) -> (Vec<u8>, Vec<u8>) {
    let device = XorDevice::new(0x5A);
    let mut codec = EnvelopeCodec::with_rng(&device, StdRng::seed_from_u64(2024));
    let envelope = codec
        .encrypt_bytes(b"same payload", &EncryptConfig::default(), entropy)
        .expect("encrypt should succeed");
    let plain = codec
        .decrypt_bytes(&envelope)
        .expect("decrypt should succeed");
    assert_eq!(plain, b"same payload");

    let enc_secret = dissect(&envelope)
        .expect("dissect")
        .header
        .params
        .enc_secret;
    let secrets = device.wrap_inputs();
    assert_eq!(secrets.len(), 1);
    (
        data_encoding::HEXLOWER
            .decode(enc_secret.as_bytes())
            .expect("hex"),
        secrets[0].clone(),
    )
}

#[test]
fn seeded_rng_gives_identical_secrets_without_entropy() {
    let (a, _) = wrapped_secret_for(None);
    let (b, _) = wrapped_secret_for(None);
    assert_eq!(a, b);
}

#[test]
fn entropy_changes_the_wrapped_secret() {
    let extra = || vec![0xE7; 32];
    let (plain_run, plain_secret) = wrapped_secret_for(None);
    let (mixed_run, mixed_secret) = wrapped_secret_for(Some(&extra));
    assert_ne!(plain_run, mixed_run);
    assert_ne!(plain_secret, mixed_secret);
}

#[test]
fn different_entropy_gives_different_secrets() {
    let first = || vec![0x01; 32];
    let second = || vec![0x02; 32];
    let (a, _) = wrapped_secret_for(Some(&first));
    let (b, _) = wrapped_secret_for(Some(&second));
    assert_ne!(a, b);
}

#[test]
fn collector_feeds_codec_as_entropy_source() {
    let pool = Arc::new(EntropyPool::new());
    pool.add_entropy_sample(&[120, 340, 1_024, 768]);
    pool.add_entropy_sample(&[121, 338, 1_025, 770]);
    let collector = fast_collector(Arc::clone(&pool));

    let mut codec = EnvelopeCodec::new(XorDevice::new(0x03));
    let envelope = codec
        .encrypt_bytes(b"hardened", &EncryptConfig::default(), Some(&collector))
        .expect("encrypt should succeed");
    assert_eq!(
        codec
            .decrypt_bytes(&envelope)
            .expect("decrypt should succeed"),
        b"hardened"
    );
    assert_eq!(pool.sample_count(), 0, "collection resets the event counter");
}

#[test]
fn pool_is_shared_across_threads() {
    let pool = Arc::new(EntropyPool::zeroed());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                for i in 0..250u64 {
                    pool.add_entropy_sample(&[t * 1_000 + i]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread should finish");
    }
    assert_eq!(pool.sample_count(), 1_000);
    assert!(pool.snapshot().iter().any(|v| *v != 0));
}

#[test]
fn seeds_differ_even_with_identical_pool() {
    let pool = Arc::new(EntropyPool::zeroed());
    let collector = fast_collector(pool);
    let a = collector.collect_seed().expect("seed");
    let b = collector.collect_seed().expect("seed");
    assert_ne!(a.expose(), b.expose());
}
