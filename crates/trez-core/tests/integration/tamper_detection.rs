//! Tamper detection through `check` (no key material) and `decrypt`.

use super::stubs::XorDevice;
use serde_json::{json, Value};
use trez_core::{check, dissect, EncryptConfig, EnvelopeCodec, FormatError, Iv, TrezError};

fn encrypt(payload: &[u8], config: &EncryptConfig) -> Vec<u8> {
    EnvelopeCodec::new(XorDevice::new(0x21))
        .encrypt_bytes(payload, config, None)
        .expect("encrypt should succeed")
}

/// Re-render the envelope with `edit` applied to the header JSON.
fn rewrite_header(envelope: &[u8], edit: impl FnOnce(&mut Value)) -> Vec<u8> {
    let offset = dissect(envelope).expect("dissect").payload_offset;
    let mut header: Value =
        serde_json::from_slice(&envelope[..offset - 1]).expect("header JSON");
    edit(&mut header);
    let mut out = serde_json::to_vec_pretty(&header).expect("render");
    out.push(b'\n');
    out.extend_from_slice(&envelope[offset..]);
    out
}

#[test]
fn flipping_any_ciphertext_byte_is_detected() {
    let envelope = encrypt(b"thirteen byte", &EncryptConfig::default());
    let offset = dissect(&envelope).expect("dissect").payload_offset;
    let codec = EnvelopeCodec::new(XorDevice::new(0x21));

    for index in offset..envelope.len() {
        let mut tampered = envelope.clone();
        tampered[index] ^= 0x01;

        let report = check(&tampered);
        assert!(!report.valid_data, "byte {index}: check missed tampering");
        assert!(report.valid_header, "byte {index}: header should be intact");
        assert!(
            matches!(codec.decrypt_bytes(&tampered), Err(TrezError::Decryption(_))),
            "byte {index}: decrypt should fail with Decryption"
        );
    }
}

#[test]
fn truncated_ciphertext_fails_closed() {
    let envelope = encrypt(b"payload", &EncryptConfig::default());
    let codec = EnvelopeCodec::new(XorDevice::new(0x21));
    let truncated = &envelope[..envelope.len() - 20];
    assert!(!check(truncated).valid_data);
    assert!(matches!(
        codec.decrypt_bytes(truncated),
        Err(TrezError::Decryption(_))
    ));
}

#[test]
fn rerendered_header_without_changes_still_validates() {
    let envelope = encrypt(b"payload", &EncryptConfig::default());
    let same = rewrite_header(&envelope, |_| {});
    assert!(check(&same).is_valid());
}

#[test]
fn mutating_any_header_param_is_detected() {
    let config = EncryptConfig {
        iv: Some(Iv::new([0x01; 16])),
        ..EncryptConfig::default()
    };
    let envelope = encrypt(b"payload", &config);
    assert!(check(&envelope).is_valid());

    let edits: Vec<(&str, Value)> = vec![
        ("address", json!([1])),
        ("trezorMsg", json!("Another label")),
        ("encSecret", json!("00".repeat(32))),
        ("askOnEncrypt", json!(true)),
        ("askOnDecrypt", json!(false)),
        ("iv", json!("02".repeat(16))),
    ];
    for (field, value) in edits {
        let tampered = rewrite_header(&envelope, |header| {
            header[field] = value;
        });
        let report = check(&tampered);
        assert!(!report.valid_header, "{field}: header change not detected");
        assert!(report.valid_data, "{field}: data should be intact");
    }
}

#[test]
fn removing_iv_is_detected() {
    let config = EncryptConfig {
        iv: Some(Iv::new([0x01; 16])),
        ..EncryptConfig::default()
    };
    let envelope = encrypt(b"payload", &config);
    let tampered = rewrite_header(&envelope, |header| {
        header.as_object_mut().expect("object").remove("iv");
    });
    assert!(!check(&tampered).valid_header);
}

#[test]
fn missing_digests_report_invalid() {
    let envelope = encrypt(b"payload", &EncryptConfig::default());
    let stripped = rewrite_header(&envelope, |header| {
        let object = header.as_object_mut().expect("object");
        object.remove("encryptedDataSha256");
        object.remove("headerParamsSha256");
    });
    let report = check(&stripped);
    assert!(!report.valid_data);
    assert!(!report.valid_header);
}

#[test]
fn malformed_inputs_fail_dissect_and_check() {
    let inputs: [&[u8]; 4] = [
        b"",
        b"no delimiter anywhere",
        b"{ \"address\": [0, \n}\nrest",
        b"\xff\xfe\n}\n",
    ];
    for input in inputs {
        assert!(matches!(
            dissect(input),
            Err(FormatError::MissingDelimiter | FormatError::Json(_))
        ));
        let report = check(input);
        assert!(!report.valid_data);
        assert!(!report.valid_header);
    }
}

#[test]
fn corrupt_enc_secret_is_a_format_error() {
    let envelope = encrypt(b"payload", &EncryptConfig::default());
    let tampered = rewrite_header(&envelope, |header| {
        header["encSecret"] = json!("not-hex");
    });
    let codec = EnvelopeCodec::new(XorDevice::new(0x21));
    assert!(matches!(
        codec.decrypt_bytes(&tampered),
        Err(TrezError::Format(FormatError::InvalidField {
            field: "encSecret",
            ..
        }))
    ));
}
