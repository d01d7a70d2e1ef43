//! `trez-core`: hardware-wrapped envelope encryption for TREZ.
//!
//! A payload is sealed locally under a fresh 256-bit secret; only that
//! secret is sent to the hardware device to be wrapped. The result is a
//! self-describing envelope (JSON header + ciphertext) that can be checked
//! for integrity without the device.
//!
//! Zero async, zero network, zero filesystem access. Device transports,
//! clipboard and file handling live with the caller.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod config;
pub mod secret;

pub mod entropy;
pub mod secretbox;

pub mod device;

pub mod codec;
pub mod envelope;

pub use codec::EnvelopeCodec;
pub use config::{CollectorConfig, EncryptConfig, Iv, DEFAULT_TREZOR_MSG, IV_LEN};
pub use device::{
    CipherKeyValueMessage, CipherKeyValueRequest, CipherKeyValueResponse, DeviceError,
    KeyWrapper, NullKeyWrapper,
};
pub use entropy::{EntropyCollector, EntropyPool, EntropySource, MAX_SLOT_VALUE, POOL_SLOTS};
pub use envelope::{
    assemble, check, dissect, is_envelope, Dissected, EnvelopeHeader, HeaderParams,
    IntegrityReport, HEADER_TERMINATOR,
};
pub use error::{FormatError, PayloadError, TrezError};
pub use secret::{Secret, SECRET_LEN};
pub use secretbox::{open, seal, SealedData, SecretBoxError};
