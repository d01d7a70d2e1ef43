//! Envelope encryption and decryption.
//!
//! Only the 32-byte secret crosses to the device. The payload is sealed
//! locally with that secret, which keeps device work small and constant
//! regardless of payload size, and lets a file be re-keyed by re-wrapping
//! the secret alone.
//!
//! # Encrypt
//!
//! ```text
//! CSPRNG ──► secret ──(optional: SHA-256(secret ‖ entropy))──► secret'
//! secret' ──► device wrap ──► encSecret (header)
//! secret' ──► AES-256-GCM(payload) ──► ciphertext
//! header params ──► SHA-256 ──► headerParamsSha256
//! ciphertext ──► SHA-256 ──► encryptedDataSha256
//! ```
//!
//! # Decrypt
//!
//! ```text
//! dissect ──► encSecret ──► device unwrap ──► secret' ──► open(ciphertext)
//! ```

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use ring::digest;
use zeroize::Zeroizing;

use crate::config::{EncryptConfig, Iv};
use crate::device::{CipherKeyValueRequest, KeyWrapper};
use crate::entropy::EntropySource;
use crate::envelope::{self, Dissected, EnvelopeHeader, HeaderParams};
use crate::error::{FormatError, PayloadError, TrezError};
use crate::secret::{Secret, SECRET_LEN};
use crate::secretbox;

/// Encrypts payloads into envelopes and back, using a key-wrapping device.
pub struct EnvelopeCodec<W, R = OsRng> {
    wrapper: W,
    rng: R,
}

impl<W: KeyWrapper> EnvelopeCodec<W, OsRng> {
    /// Codec drawing secrets from the OS CSPRNG.
    pub const fn new(wrapper: W) -> Self {
        Self {
            wrapper,
            rng: OsRng,
        }
    }
}

impl<W: KeyWrapper, R: RngCore + CryptoRng> EnvelopeCodec<W, R> {
    /// Codec drawing secrets from `rng`.
    pub const fn with_rng(wrapper: W, rng: R) -> Self {
        Self { wrapper, rng }
    }

    /// The device session.
    pub const fn wrapper(&self) -> &W {
        &self.wrapper
    }

    /// Encrypt the buffer produced by `payload` into an envelope.
    ///
    /// The secret is generated before `payload` runs; the device is called
    /// only after the payload is available. When `entropy` is given, its 32
    /// bytes are hashed with the secret to form the secret actually used.
    ///
    /// # Errors
    ///
    /// - [`TrezError::Configuration`] for invalid config, an unavailable
    ///   device, or entropy output that is not 32 bytes
    /// - [`TrezError::Payload`] when `payload` fails
    /// - [`TrezError::Device`] when the device rejects or fails the wrap
    /// - [`TrezError::InternalConsistency`] when the wrapped secret is not
    ///   32 bytes
    pub fn encrypt<F, E>(
        &mut self,
        payload: F,
        config: &EncryptConfig,
        entropy: Option<&dyn EntropySource>,
    ) -> Result<Vec<u8>, TrezError>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
        E: Into<PayloadError>,
    {
        config.validate()?;
        self.ensure_available()?;

        let mut secret = Secret::generate(&mut self.rng)?;

        let data = Zeroizing::new(payload().map_err(|e| TrezError::Payload(e.into()))?);

        if let Some(source) = entropy {
            secret = mix_entropy(&secret, source)?;
        }

        let iv = config.iv.as_ref().map(Iv::as_bytes);
        let request = CipherKeyValueRequest {
            address: &config.address,
            key: &config.trezor_msg,
            value: secret.expose(),
            encrypt: true,
            ask_on_encrypt: config.ask_on_encrypt,
            ask_on_decrypt: config.ask_on_decrypt,
            iv,
        };
        tracing::debug!(
            provider = self.wrapper.provider_name(),
            address = ?config.address,
            "wrapping secret on device"
        );
        let wrapped = self.wrapper.cipher_key_value(&request)?.value_bytes()?;
        if wrapped.len() != SECRET_LEN {
            return Err(TrezError::InternalConsistency(format!(
                "invalid wrapped secret length: {} bytes (expected {SECRET_LEN})",
                wrapped.len()
            )));
        }

        let sealed =
            secretbox::seal(data.as_slice(), secret.expose()).map_err(TrezError::Encryption)?;
        tracing::debug!(
            plaintext_len = data.len(),
            sealed_len = sealed.len(),
            "payload sealed"
        );

        let params = HeaderParams {
            address: config.address.clone(),
            trezor_msg: config.trezor_msg.clone(),
            enc_secret: data_encoding::HEXLOWER.encode(&wrapped),
            ask_on_encrypt: config.ask_on_encrypt,
            ask_on_decrypt: config.ask_on_decrypt,
            iv: config.iv.map(|iv| iv.to_hex()),
        };
        let header = EnvelopeHeader::new(params, &sealed)?;
        Ok(envelope::assemble(&header, &sealed)?)
    }

    /// [`Self::encrypt`] for a payload already in memory.
    ///
    /// # Errors
    ///
    /// See [`Self::encrypt`].
    pub fn encrypt_bytes(
        &mut self,
        payload: &[u8],
        config: &EncryptConfig,
        entropy: Option<&dyn EntropySource>,
    ) -> Result<Vec<u8>, TrezError> {
        self.encrypt(
            || Ok::<_, std::convert::Infallible>(payload.to_vec()),
            config,
            entropy,
        )
    }

    /// Decrypt the envelope produced by `source`.
    ///
    /// # Errors
    ///
    /// - [`TrezError::Configuration`] when the device is unavailable
    /// - [`TrezError::Payload`] when `source` fails
    /// - [`TrezError::Format`] when the buffer is not an envelope
    /// - [`TrezError::Device`] when the device rejects or fails the unwrap
    /// - [`TrezError::InternalConsistency`] for a secret that is not 32 bytes
    /// - [`TrezError::Decryption`] when the ciphertext does not authenticate
    pub fn decrypt<F, E>(&self, source: F) -> Result<Vec<u8>, TrezError>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
        E: Into<PayloadError>,
    {
        self.ensure_available()?;
        let data = source().map_err(|e| TrezError::Payload(e.into()))?;
        self.open_envelope(&data)
    }

    /// [`Self::decrypt`] for an envelope already in memory.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>, TrezError> {
        self.ensure_available()?;
        self.open_envelope(data)
    }

    /// Unwrap the secret and open the payload. Availability already checked.
    fn open_envelope(&self, data: &[u8]) -> Result<Vec<u8>, TrezError> {
        let Dissected {
            header,
            payload_offset,
        } = envelope::dissect(data)?;
        let params = &header.params;

        let wrapped = data_encoding::HEXLOWER_PERMISSIVE
            .decode(params.enc_secret.as_bytes())
            .map_err(|e| FormatError::InvalidField {
                field: "encSecret",
                reason: e.to_string(),
            })?;
        if wrapped.len() != SECRET_LEN {
            return Err(TrezError::InternalConsistency(format!(
                "invalid wrapped secret length: {} bytes (expected {SECRET_LEN})",
                wrapped.len()
            )));
        }

        let iv = params
            .iv
            .as_deref()
            .map(Iv::from_hex)
            .transpose()
            .map_err(|e| FormatError::InvalidField {
                field: "iv",
                reason: e.to_string(),
            })?;

        let request = CipherKeyValueRequest {
            address: &params.address,
            key: &params.trezor_msg,
            value: &wrapped,
            encrypt: false,
            ask_on_encrypt: params.ask_on_encrypt,
            ask_on_decrypt: params.ask_on_decrypt,
            iv: iv.as_ref().map(Iv::as_bytes),
        };
        tracing::debug!(
            provider = self.wrapper.provider_name(),
            address = ?params.address,
            "unwrapping secret on device"
        );
        let unwrapped = Zeroizing::new(self.wrapper.cipher_key_value(&request)?.value_bytes()?);
        let secret = Secret::from_slice(&unwrapped)?;

        secretbox::open(&data[payload_offset..], secret.expose()).map_err(TrezError::Decryption)
    }

    fn ensure_available(&self) -> Result<(), TrezError> {
        if self.wrapper.is_available() {
            Ok(())
        } else {
            Err(TrezError::Configuration(format!(
                "key wrapping device `{}` is not available",
                self.wrapper.provider_name()
            )))
        }
    }
}

/// `SHA-256(secret ‖ entropy)`, requiring exactly 32 entropy bytes.
fn mix_entropy(secret: &Secret, source: &dyn EntropySource) -> Result<Secret, TrezError> {
    let extra = source.entropy()?;
    if extra.len() != SECRET_LEN {
        return Err(TrezError::Configuration(format!(
            "entropy source should return {SECRET_LEN} bytes, instead got {}",
            extra.len()
        )));
    }
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(secret.expose());
    ctx.update(&extra);
    Secret::from_slice(ctx.finish().as_ref())
}
