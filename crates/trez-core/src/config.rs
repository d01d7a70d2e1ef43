//! Typed configuration for envelope encryption and seed collection.
//!
//! All defaults live here:
//!
//! | Option            | Default          |
//! |-------------------|------------------|
//! | `address`         | `[0]`            |
//! | `trezorMsg`       | `"Trez Cypher"`  |
//! | `askOnEncrypt`    | `false`          |
//! | `askOnDecrypt`    | `true`           |
//! | `iv`              | none             |
//!
//! Both structs deserialize from camelCase JSON with missing keys falling
//! back to their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::TrezError;

/// Default label bound into the device wrap.
pub const DEFAULT_TREZOR_MSG: &str = "Trez Cypher";

/// Initialization vector length in bytes.
pub const IV_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Iv
// ---------------------------------------------------------------------------

/// A 16-byte initialization vector forwarded to the device.
///
/// Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iv([u8; IV_LEN]);

impl Iv {
    /// Wrap a fixed-size array.
    #[must_use]
    pub const fn new(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] unless `bytes` is 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TrezError> {
        let arr: [u8; IV_LEN] = bytes.try_into().map_err(|_| {
            TrezError::Configuration(format!(
                "iv needs to be {IV_LEN} bytes, instead got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse a hex string (either case).
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] for non-hex input or a decoded
    /// length other than 16.
    pub fn from_hex(hex: &str) -> Result<Self, TrezError> {
        let bytes = data_encoding::HEXLOWER_PERMISSIVE
            .decode(hex.as_bytes())
            .map_err(|e| TrezError::Configuration(format!("iv needs to be a hex string: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, as stored in the header.
    #[must_use]
    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }
}

impl TryFrom<String> for Iv {
    type Error = TrezError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Iv> for String {
    fn from(iv: Iv) -> Self {
        iv.to_hex()
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// EncryptConfig
// ---------------------------------------------------------------------------

/// Options for [`crate::codec::EnvelopeCodec::encrypt`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncryptConfig {
    /// Device key derivation path.
    pub address: Vec<u32>,
    /// Label bound into the wrap and shown on the device.
    pub trezor_msg: String,
    /// Ask for on-device confirmation when wrapping.
    pub ask_on_encrypt: bool,
    /// Ask for on-device confirmation when unwrapping.
    pub ask_on_decrypt: bool,
    /// Optional IV forwarded to the device.
    pub iv: Option<Iv>,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            address: vec![0],
            trezor_msg: DEFAULT_TREZOR_MSG.to_owned(),
            ask_on_encrypt: false,
            ask_on_decrypt: true,
            iv: None,
        }
    }
}

impl EncryptConfig {
    /// Parse from JSON, filling omitted keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] for malformed JSON, a malformed
    /// `iv`, or values rejected by [`Self::validate`].
    pub fn from_json(json: &str) -> Result<Self, TrezError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrezError::Configuration(format!("invalid encrypt config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that the type system does not.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] for an empty `address` or an
    /// empty `trezor_msg`.
    pub fn validate(&self) -> Result<(), TrezError> {
        if self.address.is_empty() {
            return Err(TrezError::Configuration(
                "address must contain at least one path index".into(),
            ));
        }
        if self.trezor_msg.is_empty() {
            return Err(TrezError::Configuration("trezorMsg must not be empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CollectorConfig
// ---------------------------------------------------------------------------

/// Tuning for [`crate::entropy::EntropyCollector`].
///
/// Windows are fixed wall-clock durations so total runtime is predictable
/// (about one second with the defaults) regardless of host speed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectorConfig {
    /// Duration of one floating-point counting window, in milliseconds.
    pub jitter_window_ms: u64,
    /// Number of accepted jitter samples to collect.
    pub jitter_samples: usize,
    /// Minimum bit length of an accepted sample delta.
    pub min_sample_bits: u32,
    /// Discarded-sample count above which a low-entropy warning is logged.
    pub low_entropy_threshold: usize,
    /// Duration of the environment-noise re-hashing loop, in milliseconds.
    pub diffusion_window_ms: u64,
    /// Gather environment-derived noise.
    pub environment_noise: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            jitter_window_ms: 7,
            jitter_samples: 128,
            min_sample_bits: 4,
            low_entropy_threshold: 10,
            diffusion_window_ms: 250,
            environment_noise: true,
        }
    }
}

impl CollectorConfig {
    /// Jitter counting window.
    #[must_use]
    pub const fn jitter_window(&self) -> Duration {
        Duration::from_millis(self.jitter_window_ms)
    }

    /// Environment-noise diffusion window.
    #[must_use]
    pub const fn diffusion_window(&self) -> Duration {
        Duration::from_millis(self.diffusion_window_ms)
    }

    /// Parse from JSON, filling omitted keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] for malformed JSON or values
    /// rejected by [`Self::validate`].
    pub fn from_json(json: &str) -> Result<Self, TrezError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TrezError::Configuration(format!("invalid collector config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`TrezError::Configuration`] for a zero-length jitter window,
    /// zero requested samples, or a minimum sample bit length no `u64` delta
    /// can reach.
    pub fn validate(&self) -> Result<(), TrezError> {
        if self.jitter_window_ms == 0 {
            return Err(TrezError::Configuration(
                "jitterWindowMs must be at least 1".into(),
            ));
        }
        if self.jitter_samples == 0 {
            return Err(TrezError::Configuration(
                "jitterSamples must be at least 1".into(),
            ));
        }
        if self.min_sample_bits > u64::BITS {
            return Err(TrezError::Configuration(format!(
                "minSampleBits must be at most {}, instead got {}",
                u64::BITS,
                self.min_sample_bits
            )));
        }
        Ok(())
    }
}
