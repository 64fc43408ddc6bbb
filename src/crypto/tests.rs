//! Decryption tests against ciphertexts produced by the test sender.

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::{
    proto::AppData,
    test_helpers::{WebPushSender, receiver_keys},
};

const PAYLOAD: &str = r#"{"notification":{"title":"Hello","body":"World"},"data":{"id":"42"}}"#;

#[fixture]
fn keys() -> EncryptionKeys { receiver_keys() }

#[fixture]
fn sender() -> WebPushSender { WebPushSender::default() }

fn without(mut stanza: DataMessageStanza, key: &str) -> DataMessageStanza {
    stanza.app_data.retain(|entry| entry.key != key);
    stanza
}

fn replace(mut stanza: DataMessageStanza, key: &str, value: &str) -> DataMessageStanza {
    stanza.app_data.retain(|entry| entry.key != key);
    stanza.app_data.push(AppData::new(key, value));
    stanza
}

#[rstest]
fn aesgcm_message_decrypts_to_notification(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = sender.aesgcm_stanza(&keys, "0:1", PAYLOAD);
    let notification = decrypt(&stanza, &keys).expect("decrypts");
    assert_eq!(notification.title, "Hello");
    assert_eq!(notification.body, "World");
    assert_eq!(notification.data.get("id"), Some(&json!("42")));
}

#[rstest]
fn aes128gcm_message_decrypts_to_notification(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = sender.aes128gcm_stanza(&keys, "0:1", PAYLOAD);
    let notification = decrypt(&stanza, &keys).expect("decrypts");
    assert_eq!(notification.title, "Hello");
}

#[rstest]
#[case::single_record(10, 64)]
#[case::exact_boundary(78, 80)]
#[case::many_records(300, 32)]
fn multi_record_aesgcm_round_trips(
    keys: EncryptionKeys,
    sender: WebPushSender,
    #[case] len: usize,
    #[case] rs: usize,
) {
    let plaintext: Vec<u8> = (0..len).map(|n| (n % 251) as u8).collect();
    let mut stanza = sender.aesgcm_stanza(&keys, "0:1", "{}");
    stanza.raw_data = Some(sender.encrypt_aesgcm(&keys, &plaintext, rs));
    let stanza = replace(
        stanza,
        ENCRYPTION_KEY,
        &format!("salt=MzMzMzMzMzMzMzMzMzMzMw; rs={rs}"),
    );
    assert_eq!(decrypt_payload(&stanza, &keys).expect("decrypts"), plaintext);
}

#[rstest]
fn missing_final_record_is_truncation(keys: EncryptionKeys, sender: WebPushSender) {
    // 30 data bytes fill one 32-byte record, so a padding-only record follows.
    let mut body = sender.encrypt_aesgcm(&keys, &[7; 30], 32);
    body.truncate(32 + ece::TAG_LEN);
    let mut stanza = sender.aesgcm_stanza(&keys, "0:1", "{}");
    stanza.raw_data = Some(body);
    let stanza = replace(stanza, ENCRYPTION_KEY, "salt=MzMzMzMzMzMzMzMzMzMzMw;rs=32");
    let err = decrypt_payload(&stanza, &keys).expect_err("truncated");
    assert!(matches!(err, DecryptError::Truncated));
    assert!(!err.is_ignorable());
}

#[rstest]
fn missing_crypto_key_is_ignorable(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = without(sender.aesgcm_stanza(&keys, "0:1", PAYLOAD), CRYPTO_KEY_KEY);
    let err = decrypt(&stanza, &keys).expect_err("no crypto-key");
    assert!(matches!(err, DecryptError::MissingCryptoKey));
    assert!(err.is_ignorable());
    assert_eq!(err.to_string(), "crypto-key is missing");
}

#[rstest]
fn missing_salt_is_ignorable(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = without(sender.aesgcm_stanza(&keys, "0:1", PAYLOAD), ENCRYPTION_KEY);
    let err = decrypt(&stanza, &keys).expect_err("no salt");
    assert!(matches!(err, DecryptError::MissingSalt));
    assert!(err.is_ignorable());
}

#[rstest]
fn tampered_ciphertext_fails_authentication(keys: EncryptionKeys, sender: WebPushSender) {
    let mut stanza = sender.aesgcm_stanza(&keys, "0:1", PAYLOAD);
    if let Some(byte) = stanza.raw_data.as_mut().and_then(|body| body.first_mut()) {
        *byte ^= 0x01;
    }
    let err = decrypt(&stanza, &keys).expect_err("tampered");
    assert!(matches!(err, DecryptError::Authentication));
    assert!(err.is_ignorable());
}

#[rstest]
fn wrong_auth_secret_fails_authentication(sender: WebPushSender) {
    let keys = receiver_keys();
    let stanza = sender.aesgcm_stanza(&keys, "0:1", PAYLOAD);
    let other = EncryptionKeys::new(keys.private_key().clone(), vec![9; 16]).expect("keys");
    let err = decrypt(&stanza, &other).expect_err("wrong secret");
    assert!(matches!(err, DecryptError::Authentication));
}

#[rstest]
fn missing_raw_data_is_fatal(keys: EncryptionKeys, sender: WebPushSender) {
    let mut stanza = sender.aesgcm_stanza(&keys, "0:1", PAYLOAD);
    stanza.raw_data = None;
    let err = decrypt(&stanza, &keys).expect_err("no body");
    assert!(matches!(err, DecryptError::MissingRawData));
    assert!(!err.is_ignorable());
}

#[rstest]
fn invalid_sender_key_is_fatal(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = replace(
        sender.aesgcm_stanza(&keys, "0:1", PAYLOAD),
        CRYPTO_KEY_KEY,
        "dh=AAAA",
    );
    let err = decrypt(&stanza, &keys).expect_err("bad key");
    assert!(matches!(err, DecryptError::InvalidSenderKey));
    assert!(!err.is_ignorable());
}

#[rstest]
fn non_json_plaintext_is_fatal(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = sender.aesgcm_stanza(&keys, "0:1", "plain text");
    let err = decrypt(&stanza, &keys).expect_err("not JSON");
    assert!(matches!(err, DecryptError::Payload(_)));
    assert!(!err.is_ignorable());
}

#[rstest]
fn unparsable_record_size_is_fatal(keys: EncryptionKeys, sender: WebPushSender) {
    let stanza = replace(
        sender.aesgcm_stanza(&keys, "0:1", PAYLOAD),
        ENCRYPTION_KEY,
        "salt=MzMzMzMzMzMzMzMzMzMzMw; rs=lots",
    );
    let err = decrypt(&stanza, &keys).expect_err("bad rs");
    assert!(matches!(err, DecryptError::InvalidRecordSizeParam(ref rs) if rs == "lots"));
}

#[rstest]
#[case("dh=abc", "dh", Some("abc"))]
#[case("p256ecdsa=xyz;dh=abc", "dh", Some("abc"))]
#[case("keyid=p256dh, dh=abc", "dh", Some("abc"))]
#[case("salt=\"abc\"; rs=4096", "rs", Some("4096"))]
#[case("SALT=abc", "salt", Some("abc"))]
#[case("salt=abc", "dh", None)]
#[case("", "dh", None)]
fn header_params_are_found(
    #[case] header: &str,
    #[case] name: &str,
    #[case] expected: Option<&str>,
) {
    assert_eq!(header_param(header, name), expected);
}
