//! Key-wrapping device abstraction.
//!
//! The device never sees the payload. It only wraps (encrypts) or unwraps
//! (decrypts) the 32-byte secret under a key held on the device, selected by
//! a derivation `address` and bound to a `key` label.
//!
//! # Architecture
//!
//! ```text
//! KeyWrapper (trait)
//! ├── <device session>   (provided by the caller, e.g. a USB transport)
//! └── NullKeyWrapper     (always NotAvailable; fallback)
//! ```
//!
//! Implementations backed by asynchronous transports block on the reply
//! inside [`KeyWrapper::cipher_key_value`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors reported by a key-wrapping device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device is connected or the session is closed.
    #[error("key wrapping device not available")]
    NotAvailable,
    /// The user declined the confirmation prompt or the device refused.
    #[error("device rejected request: {0}")]
    Rejected(String),
    /// Communication with the device failed.
    #[error("device transport error: {0}")]
    Transport(String),
    /// The device reply could not be interpreted.
    #[error("invalid device response: {0}")]
    InvalidResponse(String),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A single `CipherKeyValue` request.
///
/// With `encrypt == true`, `value` is the plaintext secret to wrap; with
/// `encrypt == false` it is the wrapped form to unwrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherKeyValueRequest<'a> {
    /// Derivation path of the device key.
    pub address: &'a [u32],
    /// Label bound into the wrap; the same label is required to unwrap.
    pub key: &'a str,
    /// Bytes to wrap or unwrap.
    pub value: &'a [u8],
    /// Direction of the operation.
    pub encrypt: bool,
    /// Require on-device confirmation when wrapping.
    pub ask_on_encrypt: bool,
    /// Require on-device confirmation when unwrapping.
    pub ask_on_decrypt: bool,
    /// Optional 16-byte initialization vector.
    pub iv: Option<&'a [u8; 16]>,
}

/// Device reply body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherKeyValueMessage {
    /// Result bytes as a hex string.
    pub value: String,
}

/// Device reply envelope, shaped like the device's JSON response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherKeyValueResponse {
    /// Reply body.
    pub message: CipherKeyValueMessage,
}

impl CipherKeyValueResponse {
    /// Build a response from raw bytes, hex-encoding them.
    #[must_use]
    pub fn from_bytes(value: &[u8]) -> Self {
        Self {
            message: CipherKeyValueMessage {
                value: data_encoding::HEXLOWER.encode(value),
            },
        }
    }

    /// Decode the hex value.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidResponse`] if the value is not hex.
    pub fn value_bytes(&self) -> Result<Vec<u8>, DeviceError> {
        data_encoding::HEXLOWER_PERMISSIVE
            .decode(self.message.value.as_bytes())
            .map_err(|e| DeviceError::InvalidResponse(format!("value is not hex: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A device session able to wrap and unwrap secrets.
pub trait KeyWrapper {
    /// Whether the session can currently serve requests.
    fn is_available(&self) -> bool;

    /// Human-readable device name, for logs.
    fn provider_name(&self) -> &'static str;

    /// Perform one wrap or unwrap.
    ///
    /// May prompt the user on the device, depending on the `ask_on_*` flags.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the device is unavailable, the user
    /// declines, or the transport fails.
    fn cipher_key_value(
        &self,
        request: &CipherKeyValueRequest<'_>,
    ) -> Result<CipherKeyValueResponse, DeviceError>;
}

impl<T: KeyWrapper + ?Sized> KeyWrapper for &T {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    fn cipher_key_value(
        &self,
        request: &CipherKeyValueRequest<'_>,
    ) -> Result<CipherKeyValueResponse, DeviceError> {
        (**self).cipher_key_value(request)
    }
}

// ---------------------------------------------------------------------------
// Null provider (fallback)
// ---------------------------------------------------------------------------

/// Fallback wrapper used when no device is connected.
pub struct NullKeyWrapper;

impl KeyWrapper for NullKeyWrapper {
    fn is_available(&self) -> bool {
        false
    }

    fn provider_name(&self) -> &'static str {
        "None"
    }

    fn cipher_key_value(
        &self,
        _request: &CipherKeyValueRequest<'_>,
    ) -> Result<CipherKeyValueResponse, DeviceError> {
        Err(DeviceError::NotAvailable)
    }
}
