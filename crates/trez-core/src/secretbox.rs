//! Payload sealing with AES-256-GCM.
//!
//! This module provides:
//! - [`seal`]: encrypt a buffer under a 32-byte key with a fresh random nonce
//! - [`open`]: authenticate and decrypt a sealed buffer
//! - [`SealedData`]: nonce + ciphertext + tag container
//!
//! Wire format: `nonce (12 bytes) || ciphertext (variable) || tag (16 bytes)`.
//! This is the ciphertext region of an envelope.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use thiserror::Error;
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid sealed length: nonce + empty ciphertext + tag.
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

/// Errors produced by [`seal`] and [`open`].
#[derive(Debug, Error)]
pub enum SecretBoxError {
    /// The key is not exactly [`KEY_LEN`] bytes.
    #[error("invalid key length: {0} bytes (expected {KEY_LEN})")]
    InvalidKeyLength(usize),

    /// The sealed buffer cannot hold a nonce and a tag.
    #[error("sealed data too short: {0} bytes (minimum {MIN_SEALED_LEN})")]
    TooShort(usize),

    /// The AEAD refused to seal (RNG or key setup failure).
    #[error("AES-256-GCM seal failed")]
    Seal,

    /// Tag mismatch: ciphertext tampered or wrong key.
    #[error("authentication tag mismatch")]
    Authentication,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container.
///
/// Any modification to the nonce, ciphertext, or tag causes [`open`] to fail.
#[must_use = "sealed data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedData {
    /// 96-bit random nonce, unique per seal.
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted bytes (same length as the plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize to wire format: `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from wire format.
    ///
    /// # Errors
    ///
    /// Returns [`SecretBoxError::TooShort`] if `bytes` is shorter than
    /// [`MIN_SEALED_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecretBoxError> {
        let ct_end = bytes
            .len()
            .checked_sub(TAG_LEN)
            .filter(|end| *end >= NONCE_LEN)
            .ok_or(SecretBoxError::TooShort(bytes.len()))?;

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[ct_end..]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..ct_end].to_vec(),
            tag,
        })
    }
}

fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, SecretBoxError> {
    if key.len() != KEY_LEN {
        return Err(SecretBoxError::InvalidKeyLength(key.len()));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| SecretBoxError::InvalidKeyLength(key.len()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Seal `plaintext` under `key`, returning [`SealedData`].
///
/// The nonce is drawn from `OsRng` on every call.
///
/// # Errors
///
/// Returns [`SecretBoxError::InvalidKeyLength`] for a key that is not 32 bytes
/// and [`SecretBoxError::Seal`] if the AEAD operation fails.
pub fn seal_data(plaintext: &[u8], key: &[u8]) -> Result<SealedData, SecretBoxError> {
    let key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| SecretBoxError::Seal)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = key.seal_in_place_separate_tag(nonce, aead::Aad::empty(), &mut in_out) else {
        in_out.zeroize();
        return Err(SecretBoxError::Seal);
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Seal `plaintext` under `key` and return the wire bytes
/// `nonce || ciphertext || tag`.
///
/// # Errors
///
/// See [`seal_data`].
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
    seal_data(plaintext, key).map(|sealed| sealed.to_bytes())
}

/// Authenticate and decrypt wire bytes produced by [`seal`].
///
/// Fails closed: on any error no plaintext is returned and the working
/// buffer is zeroized.
///
/// # Errors
///
/// Returns [`SecretBoxError::InvalidKeyLength`] for a bad key,
/// [`SecretBoxError::TooShort`] for truncated input and
/// [`SecretBoxError::Authentication`] when the tag does not verify.
pub fn open(sealed: &[u8], key: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
    let key = aead_key(key)?;
    if sealed.len() < MIN_SEALED_LEN {
        return Err(SecretBoxError::TooShort(sealed.len()));
    }

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    // ring expects `ciphertext || tag` in one buffer, which is our wire layout
    // after the nonce.
    let mut ct_tag = sealed[NONCE_LEN..].to_vec();
    let opened = key
        .open_in_place(nonce, aead::Aad::empty(), &mut ct_tag)
        .map(|plaintext| plaintext.to_vec());
    ct_tag.zeroize();
    opened.map_err(|_| SecretBoxError::Authentication)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
