//! Zeroize-on-drop container for the 32-byte data-encryption secret.

use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;
use zeroize::Zeroize;

use crate::error::TrezError;

/// Secret length in bytes (256 bits), matching the device's key strength.
pub const SECRET_LEN: usize = 32;

/// A 256-bit symmetric secret.
///
/// Wraps [`secrecy::SecretBox`] so the bytes are zeroized when dropped.
/// `Debug` output is masked.
pub struct Secret {
    inner: SecretBox<[u8; SECRET_LEN]>,
}

impl Secret {
    /// Take ownership of `bytes`. The caller's copy is not zeroized.
    #[must_use]
    pub fn new(bytes: [u8; SECRET_LEN]) -> Self {
        Self {
            inner: SecretBox::new(Box::new(bytes)),
        }
    }

    /// Copy a slice into a new secret.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::InternalConsistency`] if `bytes` is not exactly
    /// [`SECRET_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TrezError> {
        let mut buf: [u8; SECRET_LEN] = bytes.try_into().map_err(|_| {
            TrezError::InternalConsistency(format!(
                "invalid secret length: {} bytes (expected {SECRET_LEN})",
                bytes.len()
            ))
        })?;
        let secret = Self::new(buf);
        buf.zeroize();
        Ok(secret)
    }

    /// Generate a fresh secret from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`TrezError::Entropy`] if the RNG fails.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, TrezError> {
        let mut buf = [0u8; SECRET_LEN];
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| TrezError::Entropy(format!("CSPRNG fill failed: {e}")))?;
        let secret = Self::new(buf);
        buf.zeroize();
        Ok(secret)
    }

    /// Expose the raw bytes for a cryptographic operation.
    #[must_use]
    pub fn expose(&self) -> &[u8; SECRET_LEN] {
        self.inner.expose_secret()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}
