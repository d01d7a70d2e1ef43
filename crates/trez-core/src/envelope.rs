//! Envelope container format: JSON header, terminator, sealed payload.
//!
//! This module provides:
//! - [`HeaderParams`]: the device parameters covered by the header hash
//! - [`EnvelopeHeader`]: params plus the two integrity digests
//! - [`assemble`]: render header + ciphertext into envelope bytes
//! - [`dissect`]: split envelope bytes into header + payload offset
//! - [`check`]: recompute both digests without any key material
//!
//! # Layout
//!
//! ```text
//! {                                  <- pretty JSON, two-space indent
//!   "address": [0],
//!   "trezorMsg": "...",
//!   "encSecret": "<64 hex>",
//!   "askOnEncrypt": false,
//!   "askOnDecrypt": true,
//!   "iv": "<32 hex>",                <- omitted when unset
//!   "encryptedDataSha256": "<64 hex>",
//!   "headerParamsSha256": "<64 hex>"
//! }\n
//! nonce || ciphertext || tag
//! ```
//!
//! The header ends at the first `"\n}\n"`; the payload starts right after it.
//! `headerParamsSha256` is SHA-256 over the compact JSON of [`HeaderParams`]
//! and is computed before the digest fields exist.

use ring::digest;
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Byte sequence closing the pretty-printed header object.
pub const HEADER_TERMINATOR: &[u8] = b"\n}\n";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Header fields that drive the device unwrap.
///
/// Field order is significant: it fixes the bytes hashed into
/// `headerParamsSha256`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderParams {
    /// Device key derivation path.
    pub address: Vec<u32>,
    /// Label bound into the wrap.
    pub trezor_msg: String,
    /// Hex of the device-wrapped secret.
    pub enc_secret: String,
    /// Confirmation policy when wrapping.
    pub ask_on_encrypt: bool,
    /// Confirmation policy when unwrapping.
    pub ask_on_decrypt: bool,
    /// Hex IV forwarded to the device, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl HeaderParams {
    /// SHA-256 of the compact JSON rendering, as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Json`] if serialization fails.
    pub fn digest_hex(&self) -> Result<String, FormatError> {
        let json = serde_json::to_vec(self)?;
        Ok(sha256_hex(&json))
    }
}

/// Full envelope header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeHeader {
    /// Device parameters.
    #[serde(flatten)]
    pub params: HeaderParams,
    /// SHA-256 of the bytes after the header.
    #[serde(
        default,
        alias = "encrypedDataSha256",
        skip_serializing_if = "Option::is_none"
    )]
    pub encrypted_data_sha256: Option<String>,
    /// SHA-256 of [`HeaderParams`].
    #[serde(
        default,
        alias = "trezorParamsSha256",
        skip_serializing_if = "Option::is_none"
    )]
    pub header_params_sha256: Option<String>,
}

impl EnvelopeHeader {
    /// Attach integrity digests for `params` and `ciphertext`.
    ///
    /// The params digest is taken first, over params alone.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Json`] if the params cannot be serialized.
    pub fn new(params: HeaderParams, ciphertext: &[u8]) -> Result<Self, FormatError> {
        let header_params_sha256 = params.digest_hex()?;
        Ok(Self {
            params,
            encrypted_data_sha256: Some(sha256_hex(ciphertext)),
            header_params_sha256: Some(header_params_sha256),
        })
    }
}

/// Result of [`dissect`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dissected {
    /// Parsed header.
    pub header: EnvelopeHeader,
    /// Index of the first ciphertext byte.
    pub payload_offset: usize,
}

/// Result of [`check`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// `encryptedDataSha256` matches the ciphertext.
    pub valid_data: bool,
    /// `headerParamsSha256` matches the header params.
    pub valid_header: bool,
}

impl IntegrityReport {
    /// Both digests match.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid_data && self.valid_header
    }
}

// ---------------------------------------------------------------------------
// Assemble / dissect / check
// ---------------------------------------------------------------------------

/// Render `header`, the terminator newline, and `ciphertext` into one buffer.
///
/// # Errors
///
/// Returns [`FormatError::Json`] if the header cannot be serialized.
pub fn assemble(header: &EnvelopeHeader, ciphertext: &[u8]) -> Result<Vec<u8>, FormatError> {
    let json = serde_json::to_vec_pretty(header)?;
    let mut out = Vec::with_capacity(json.len().saturating_add(1).saturating_add(ciphertext.len()));
    out.extend_from_slice(&json);
    out.push(b'\n');
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Split envelope bytes into header and payload offset.
///
/// Only presence and types of the required fields are validated; digests
/// are left to [`check`].
///
/// # Errors
///
/// Returns [`FormatError::MissingDelimiter`] when no terminator is found and
/// [`FormatError::Json`] when the header is not a valid envelope header.
pub fn dissect(data: &[u8]) -> Result<Dissected, FormatError> {
    let terminator = data
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .ok_or(FormatError::MissingDelimiter)?;

    // Keep the closing brace, drop the trailing newline.
    let header_end = terminator.saturating_add(2);
    let header: EnvelopeHeader = serde_json::from_slice(&data[..header_end])?;

    Ok(Dissected {
        header,
        payload_offset: terminator.saturating_add(HEADER_TERMINATOR.len()),
    })
}

/// Whether `data` dissects as an envelope. Used to tell envelopes from
/// plaintext input.
#[must_use]
pub fn is_envelope(data: &[u8]) -> bool {
    dissect(data).is_ok()
}

/// Recompute both digests. Never fails: unparseable input reports both
/// flags false.
#[must_use]
pub fn check(data: &[u8]) -> IntegrityReport {
    let Ok(Dissected {
        header,
        payload_offset,
    }) = dissect(data)
    else {
        return IntegrityReport::default();
    };

    let valid_header = match (&header.header_params_sha256, header.params.digest_hex()) {
        (Some(stored), Ok(computed)) => stored.eq_ignore_ascii_case(&computed),
        _ => false,
    };
    let valid_data = header
        .encrypted_data_sha256
        .as_deref()
        .is_some_and(|stored| stored.eq_ignore_ascii_case(&sha256_hex(&data[payload_offset..])));

    IntegrityReport {
        valid_data,
        valid_header,
    }
}

fn sha256_hex(data: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(digest::digest(&digest::SHA256, data).as_ref())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
