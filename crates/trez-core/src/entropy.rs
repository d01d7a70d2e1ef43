//! Seed collection with locally gathered entropy.
//!
//! A weak or starved system RNG should not be the only input to a secret.
//! [`EntropyCollector::collect_seed`] absorbs, in this order, into one
//! SHA-256 context:
//!
//! 1. 32 bytes from the OS CSPRNG
//! 2. CPU timing jitter samples (floating-point work per fixed window)
//! 3. the contents of the shared [`EntropyPool`]
//! 4. environment-derived noise, diffused by re-hashing for a fixed window
//!
//! The pool is fed by callers through [`EntropyPool::add_entropy_sample`]
//! (input events, timings, anything cheap and unpredictable). It is never
//! cleared; only its event counter is reset when a seed is collected.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::digest;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use zeroize::{Zeroize, Zeroizing};

use crate::config::CollectorConfig;
use crate::error::TrezError;
use crate::secret::Secret;

/// Number of accumulator slots in the pool.
pub const POOL_SLOTS: usize = 101;

/// Largest value a slot may hold (2^53 − 1).
pub const MAX_SLOT_VALUE: u64 = 9_007_199_254_740_991;

/// Random bytes prepended to the environment description.
const ENVIRONMENT_RANDOM_LEN: usize = 101;

/// Jitter windows measured per requested sample before giving up.
const JITTER_ATTEMPTS_PER_SAMPLE: usize = 16;

/// Environment variables describing the terminal and locale.
const ENVIRONMENT_KEYS: &[&str] = &["COLUMNS", "LINES", "TERM", "LANG", "LC_ALL", "HISTSIZE"];

// ---------------------------------------------------------------------------
// EntropyPool
// ---------------------------------------------------------------------------

/// Process-lifetime accumulator of caller-supplied entropy.
///
/// Slots are atomics: concurrent writers may interleave, which costs
/// nothing here since quality, not exactness, is the goal.
pub struct EntropyPool {
    slots: [AtomicU64; POOL_SLOTS],
    position: AtomicUsize,
    samples: AtomicU64,
}

impl EntropyPool {
    /// Create a pool with every slot seeded from the OS CSPRNG.
    #[must_use]
    pub fn new() -> Self {
        let pool = Self::zeroed();
        for slot in &pool.slots {
            slot.store(OsRng.next_u64() & MAX_SLOT_VALUE, Ordering::Relaxed);
        }
        pool
    }

    /// Create a pool with all slots at zero. Useful for reproducible tests.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicU64::new(0)),
            position: AtomicUsize::new(0),
            samples: AtomicU64::new(0),
        }
    }

    /// Submit one entropy event made of `ints`.
    ///
    /// Each integer is added into the next slot (rotating modulo
    /// [`POOL_SLOTS`]). A slot whose sum would exceed [`MAX_SLOT_VALUE`]
    /// becomes 0. The event counter increments once per call.
    pub fn add_entropy_sample(&self, ints: &[u64]) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        for &value in ints {
            let pos = self.advance_position();
            // fetch_update only fails when the closure returns None.
            let _ = self.slots[pos].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(accumulate(current, value))
            });
        }
    }

    /// Events submitted since the counter was last reset.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Read and reset the event counter.
    pub fn take_sample_count(&self) -> u64 {
        self.samples.swap(0, Ordering::Relaxed)
    }

    /// Copy of the slot values.
    #[must_use]
    pub fn snapshot(&self) -> [u64; POOL_SLOTS] {
        std::array::from_fn(|i| self.slots[i].load(Ordering::Relaxed))
    }

    /// Slot values as little-endian bytes, for hashing.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(POOL_SLOTS.saturating_mul(8)));
        for slot in &self.slots {
            out.extend_from_slice(&slot.load(Ordering::Relaxed).to_le_bytes());
        }
        out
    }

    fn advance_position(&self) -> usize {
        let next = |pos: usize| {
            let n = pos.saturating_add(1);
            if n >= POOL_SLOTS {
                0
            } else {
                n
            }
        };
        self.position
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |pos| Some(next(pos)))
            .unwrap_or(0)
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(current: u64, value: u64) -> u64 {
    match current.checked_add(value) {
        Some(sum) if sum <= MAX_SLOT_VALUE => sum,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// EntropySource
// ---------------------------------------------------------------------------

/// Supplier of extra entropy mixed into an envelope secret.
pub trait EntropySource {
    /// Produce entropy bytes. The envelope codec requires exactly 32.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError`] if the source cannot produce output.
    fn entropy(&self) -> Result<Zeroizing<Vec<u8>>, TrezError>;
}

impl<F> EntropySource for F
where
    F: Fn() -> Vec<u8>,
{
    fn entropy(&self) -> Result<Zeroizing<Vec<u8>>, TrezError> {
        Ok(Zeroizing::new(self()))
    }
}

// ---------------------------------------------------------------------------
// EntropyCollector
// ---------------------------------------------------------------------------

/// Gathers a 32-byte seed from the CSPRNG, CPU jitter, the shared pool and
/// the environment.
pub struct EntropyCollector {
    pool: Arc<EntropyPool>,
    config: CollectorConfig,
}

impl EntropyCollector {
    /// Collector with default timing (about one second per seed).
    #[must_use]
    pub fn new(pool: Arc<EntropyPool>) -> Self {
        Self {
            pool,
            config: CollectorConfig::default(),
        }
    }

    /// Collector with custom timing.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] when `config` fails
    /// [`CollectorConfig::validate`].
    pub fn with_config(
        pool: Arc<EntropyPool>,
        config: CollectorConfig,
    ) -> Result<Self, TrezError> {
        config.validate()?;
        Ok(Self { pool, config })
    }

    /// Handle to the pool, for feeding events.
    #[must_use]
    pub fn pool(&self) -> &Arc<EntropyPool> {
        &self.pool
    }

    /// Collect a fresh 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Entropy`] if the OS CSPRNG fails.
    pub fn collect_seed(&self) -> Result<Secret, TrezError> {
        let events = self.pool.take_sample_count();
        if events > 0 {
            tracing::info!(events, "additional private key entropy");
        }

        let mut ctx = digest::Context::new(&digest::SHA256);

        let mut random = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| TrezError::Entropy(format!("CSPRNG fill failed: {e}")))?;
        ctx.update(&random);
        random.zeroize();

        let jitter = cpu_jitter_samples(&self.config);
        for sample in &jitter.samples {
            ctx.update(&sample.to_le_bytes());
        }

        ctx.update(&self.pool.to_bytes());

        let noise = environment_noise(&self.config)?;
        ctx.update(noise.as_ref());

        Secret::from_slice(ctx.finish().as_ref())
    }
}

impl EntropySource for EntropyCollector {
    fn entropy(&self) -> Result<Zeroizing<Vec<u8>>, TrezError> {
        let seed = self.collect_seed()?;
        Ok(Zeroizing::new(seed.expose().to_vec()))
    }
}

// ---------------------------------------------------------------------------
// CPU jitter
// ---------------------------------------------------------------------------

/// Outcome of a jitter run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JitterSamples {
    /// Accepted deltas between consecutive window counts.
    pub samples: Vec<u64>,
    /// Deltas rejected for having too few bits.
    pub discarded: usize,
}


/// Measure variation in floating-point throughput across fixed windows.
///
/// Each window counts iterations of a chained `sin(sqrt(ln(i + x)))`. The
/// absolute difference between consecutive counts is kept when its bit
/// length reaches `config.min_sample_bits`. Logs a warning when more than
/// `config.low_entropy_threshold` deltas were discarded.
///
/// At most `16 * config.jitter_samples` windows are measured. When that cap
/// is hit the samples gathered so far are returned with a warning; the seed
/// still draws on the CSPRNG, the pool and the environment.
#[must_use]
pub fn cpu_jitter_samples(config: &CollectorConfig) -> JitterSamples {
    let window = config.jitter_window();
    let max_attempts = config
        .jitter_samples
        .saturating_mul(JITTER_ATTEMPTS_PER_SAMPLE);
    let mut samples = Vec::with_capacity(config.jitter_samples);
    let mut discarded = 0usize;
    let mut attempts = 0usize;
    let mut last_count: Option<u64> = None;

    while samples.len() < config.jitter_samples {
        if attempts >= max_attempts {
            tracing::warn!(
                attempts,
                collected = samples.len(),
                requested = config.jitter_samples,
                "CPU jitter sampling stopped at attempt limit"
            );
            break;
        }
        attempts = attempts.saturating_add(1);
        let count = floating_point_count(window);
        if let Some(last) = last_count {
            let delta = count.abs_diff(last);
            if bit_length(delta) < config.min_sample_bits {
                discarded = discarded.saturating_add(1);
                continue;
            }
            samples.push(delta);
        }
        last_count = Some(count);
    }

    if discarded > config.low_entropy_threshold {
        #[allow(clippy::cast_precision_loss)]
        let pct = discarded as f64 / config.jitter_samples as f64 * 100.0;
        tracing::warn!(discarded, "{pct:.2}% low CPU entropy re-sampled");
    }

    JitterSamples { samples, discarded }
}

fn floating_point_count(window: Duration) -> u64 {
    let start = Instant::now();
    let mut i: u64 = 0;
    let mut x: f64 = 0.0;
    while start.elapsed() < window {
        i = i.wrapping_add(1);
        #[allow(clippy::cast_precision_loss)]
        let n = i as f64;
        x = (n + x).ln().sqrt().sin();
    }
    std::hint::black_box(x);
    i
}

/// `⌊log2(v)⌋ + 1`, or 0 for 0.
const fn bit_length(v: u64) -> u32 {
    u64::BITS.saturating_sub(v.leading_zeros())
}

// ---------------------------------------------------------------------------
// Environment noise
// ---------------------------------------------------------------------------

/// Best-effort host noise, diffused into 32 bytes.
///
/// Starts from 101 CSPRNG bytes, then appends a description of the running
/// environment (timestamp, pid, terminal geometry, locale, history size,
/// environment variables). When disabled or when nothing is available, the
/// SHA-256 of a timestamp is appended instead. The result is re-hashed in a
/// loop for `config.diffusion_window`.
///
/// # Errors
///
/// Returns [`TrezError::Entropy`] if the OS CSPRNG fails.
pub fn environment_noise(config: &CollectorConfig) -> Result<[u8; 32], TrezError> {
    let mut material = Zeroizing::new(vec![0u8; ENVIRONMENT_RANDOM_LEN]);
    OsRng
        .try_fill_bytes(&mut material)
        .map_err(|e| TrezError::Entropy(format!("CSPRNG fill failed: {e}")))?;

    let description = if config.environment_noise {
        describe_environment()
    } else {
        String::new()
    };
    if description.is_empty() {
        let stamp = digest::digest(&digest::SHA256, timestamp().as_bytes());
        material.extend_from_slice(stamp.as_ref());
    } else {
        material.extend_from_slice(description.as_bytes());
    }
    material.extend_from_slice(timestamp().as_bytes());

    let window = config.diffusion_window();
    let start = Instant::now();
    let mut state = digest::digest(&digest::SHA256, &material);
    while start.elapsed() < window {
        state = digest::digest(&digest::SHA256, state.as_ref());
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(state.as_ref());
    Ok(out)
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().to_string())
        .unwrap_or_default()
}

fn describe_environment() -> String {
    let mut out = String::new();
    let _ = write!(out, "{} {} ", timestamp(), std::process::id());
    if let Ok(parallelism) = std::thread::available_parallelism() {
        let _ = write!(out, "{parallelism} ");
    }
    for key in ENVIRONMENT_KEYS {
        if let Ok(value) = std::env::var(key) {
            let _ = write!(out, "{key}={value} ");
        }
    }
    if let Ok(dir) = std::env::current_dir() {
        let _ = write!(out, "{} ", dir.display());
    }
    for (key, value) in std::env::vars_os() {
        let _ = write!(out, "{}={} ", key.to_string_lossy(), value.to_string_lossy());
    }
    out
}
