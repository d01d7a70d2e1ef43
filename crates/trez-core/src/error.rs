//! Error types for `trez-core`.

use thiserror::Error;

use crate::device::DeviceError;
use crate::secretbox::SecretBoxError;

/// Boxed error returned by caller-supplied payload functions.
pub type PayloadError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by envelope operations.
#[derive(Debug, Error)]
pub enum TrezError {
    /// Invalid collaborator handle or parameter (bad `iv` length, empty
    /// address, wrong entropy length). Raised before any device I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The buffer is not a well-formed envelope.
    #[error("not a valid trez file format: {0}")]
    Format(#[from] FormatError),

    /// Authenticated decryption of the payload failed.
    #[error("decryption failed: {0}")]
    Decryption(#[source] SecretBoxError),

    /// Payload sealing failed.
    #[error("encryption failed: {0}")]
    Encryption(#[source] SecretBoxError),

    /// The key-wrapping device rejected or failed the request.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A secret or wrapped secret had an unexpected length. This is a
    /// defect in a collaborator, not a user error.
    #[error("internal consistency failure: {0}")]
    InternalConsistency(String),

    /// The payload-producing function failed.
    #[error("payload source failed: {0}")]
    Payload(#[source] PayloadError),

    /// Seed collection failed (CSPRNG unavailable).
    #[error("entropy error: {0}")]
    Entropy(String),
}

/// Reasons a buffer cannot be dissected into header + payload.
#[derive(Debug, Error)]
pub enum FormatError {
    /// No `"\n}\n"` header terminator was found.
    #[error("header terminator not found")]
    MissingDelimiter,

    /// The header bytes are not valid JSON for an envelope header.
    #[error("invalid header: {0}")]
    Json(#[from] serde_json::Error),

    /// A header field parsed but holds an unusable value.
    #[error("invalid header field `{field}`: {reason}")]
    InvalidField {
        /// JSON key of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
