//! The payload key must never appear in the envelope or in logs.

use std::cell::RefCell;

use data_encoding::HEXLOWER;
use trez_core::{
    dissect, CipherKeyValueRequest, CipherKeyValueResponse, DeviceError, EncryptConfig,
    EnvelopeCodec, KeyWrapper, Secret,
};

/// Inverts every bit and remembers what it was asked to wrap.
#[derive(Default)]
struct InvertingDevice {
    seen: RefCell<Vec<Vec<u8>>>,
}

impl KeyWrapper for InvertingDevice {
    fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "inverting-device"
    }

    fn cipher_key_value(
        &self,
        request: &CipherKeyValueRequest<'_>,
    ) -> Result<CipherKeyValueResponse, DeviceError> {
        if request.encrypt {
            self.seen.borrow_mut().push(request.value.to_vec());
        }
        let out: Vec<u8> = request.value.iter().map(|b| !b).collect();
        Ok(CipherKeyValueResponse::from_bytes(&out))
    }
}

#[test]
fn plaintext_key_absent_from_envelope() {
    let device = InvertingDevice::default();
    let mut codec = EnvelopeCodec::new(&device);
    let envelope = codec
        .encrypt_bytes(b"attack at dawn", &EncryptConfig::default(), None)
        .expect("encrypt should succeed");

    let key = device.seen.borrow()[0].clone();
    let key_hex = HEXLOWER.encode(&key);
    let dissected = dissect(&envelope).expect("dissect should succeed");
    let header_text = String::from_utf8_lossy(&envelope[..dissected.payload_offset]);

    assert!(!header_text.contains(&key_hex));
    assert_ne!(dissected.header.params.enc_secret, key_hex);
    assert!(!envelope.windows(key.len()).any(|w| w == key.as_slice()));
}

#[test]
fn plaintext_absent_from_envelope() {
    let mut codec = EnvelopeCodec::new(InvertingDevice::default());
    let payload = b"a recognisable plaintext marker string";
    let envelope = codec
        .encrypt_bytes(payload, &EncryptConfig::default(), None)
        .expect("encrypt should succeed");
    assert!(!envelope.windows(payload.len()).any(|w| w == payload));
}

#[test]
fn secret_debug_is_redacted() {
    let secret = Secret::new([0xAB; 32]);
    let rendered = format!("{secret:?}");
    assert!(!rendered.contains("171"));
    assert!(!rendered.to_lowercase().contains("ab"));
}
