#![cfg(any(test, feature = "test-helpers"))]
//! Test-only helpers: deterministic keys, a Web Push sender and frame
//! builders.

use aes_gcm::{
    Aes128Gcm,
    KeyInit,
    Nonce,
    aead::{Aead, generic_array::GenericArray},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::{PublicKey, SecretKey, ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint};

use crate::{
    crypto::{
        ContentKeys,
        CRYPTO_KEY_KEY,
        CONTENT_ENCODING_KEY,
        ENCRYPTION_KEY,
        EncryptionKeys,
        SALT_LEN,
        aes128gcm_keys,
        aesgcm_keys,
        record_nonce,
    },
    message::McsMessage,
    proto::{AppData, DataMessageStanza},
    schema::ProtocolSchema,
};

/// Salt used by [`WebPushSender`] unless overridden.
pub const TEST_SALT: [u8; SALT_LEN] = [0x33; SALT_LEN];

/// Receiver keys derived from a fixed scalar.
#[must_use]
pub fn receiver_keys() -> EncryptionKeys {
    let secret = SecretKey::from_slice(&[0x11; 32]).expect("fixed scalar is valid");
    EncryptionKeys::new(secret, (0_u8..16).collect()).expect("auth secret is non-empty")
}

/// Encrypting side of a Web Push exchange, for producing test ciphertexts.
pub struct WebPushSender {
    secret: SecretKey,
    salt: [u8; SALT_LEN],
}

impl Default for WebPushSender {
    fn default() -> Self {
        Self {
            secret: SecretKey::from_slice(&[0x22; 32]).expect("fixed scalar is valid"),
            salt: TEST_SALT,
        }
    }
}

impl WebPushSender {
    /// Uncompressed sender public key.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    fn shared_secret(&self, receiver: &EncryptionKeys) -> Vec<u8> {
        let receiver_public =
            PublicKey::from_sec1_bytes(&receiver.public_key_bytes()).expect("receiver key");
        diffie_hellman(self.secret.to_nonzero_scalar(), receiver_public.as_affine())
            .raw_secret_bytes()
            .to_vec()
    }

    fn seal(keys: &ContentKeys, counter: usize, plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes128Gcm::new(GenericArray::from_slice(&keys.cek));
        let nonce = record_nonce(&keys.nonce, counter as u64);
        cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .expect("encryption succeeds")
    }

    /// Encrypt `plaintext` with the `aesgcm` encoding and record size `rs`.
    ///
    /// A trailing padding-only record is appended when the data ends on a
    /// record boundary.
    #[must_use]
    pub fn encrypt_aesgcm(&self, receiver: &EncryptionKeys, plaintext: &[u8], rs: usize) -> Vec<u8> {
        let keys = aesgcm_keys(
            &self.shared_secret(receiver),
            receiver.auth_secret(),
            &self.salt,
            &receiver.public_key_bytes(),
            &self.public_key(),
        )
        .expect("derive aesgcm keys");
        let data_per_record = rs - 2;
        let mut body = Vec::new();
        let mut counter = 0;
        for chunk in plaintext.chunks(data_per_record) {
            let mut record = vec![0, 0];
            record.extend_from_slice(chunk);
            body.extend(Self::seal(&keys, counter, &record));
            counter += 1;
        }
        if plaintext.len() % data_per_record == 0 {
            body.extend(Self::seal(&keys, counter, &[0, 0]));
        }
        body
    }

    /// Encrypt `plaintext` as a single `aes128gcm` record with a 4096-byte
    /// record size.
    #[must_use]
    pub fn encrypt_aes128gcm(&self, receiver: &EncryptionKeys, plaintext: &[u8]) -> Vec<u8> {
        const RS: u32 = 4096;
        let sender_public = self.public_key();
        let keys = aes128gcm_keys(
            &self.shared_secret(receiver),
            receiver.auth_secret(),
            &self.salt,
            &receiver.public_key_bytes(),
            &sender_public,
        )
        .expect("derive aes128gcm keys");
        let mut record = plaintext.to_vec();
        record.push(2);
        assert!(record.len() + 16 <= RS as usize, "plaintext fits one record");

        let mut body = self.salt.to_vec();
        body.extend_from_slice(&RS.to_be_bytes());
        body.push(u8::try_from(sender_public.len()).expect("key length fits u8"));
        body.extend_from_slice(&sender_public);
        body.extend(Self::seal(&keys, 0, &record));
        body
    }

    /// A data message carrying `json` encrypted with `aesgcm`.
    #[must_use]
    pub fn aesgcm_stanza(
        &self,
        receiver: &EncryptionKeys,
        persistent_id: &str,
        json: &str,
    ) -> DataMessageStanza {
        let body = self.encrypt_aesgcm(receiver, json.as_bytes(), 4096);
        DataMessageStanza {
            from: "test-sender".into(),
            category: "org.chromium.linux".into(),
            persistent_id: Some(persistent_id.into()),
            app_data: vec![
                AppData::new(
                    CRYPTO_KEY_KEY,
                    format!("dh={}", URL_SAFE_NO_PAD.encode(self.public_key())),
                ),
                AppData::new(
                    ENCRYPTION_KEY,
                    format!("salt={}", URL_SAFE_NO_PAD.encode(self.salt)),
                ),
            ],
            raw_data: Some(body),
            ..Default::default()
        }
    }

    /// A data message carrying `json` encrypted with `aes128gcm`.
    #[must_use]
    pub fn aes128gcm_stanza(
        &self,
        receiver: &EncryptionKeys,
        persistent_id: &str,
        json: &str,
    ) -> DataMessageStanza {
        DataMessageStanza {
            from: "test-sender".into(),
            category: "org.chromium.linux".into(),
            persistent_id: Some(persistent_id.into()),
            app_data: vec![AppData::new(CONTENT_ENCODING_KEY, "aes128gcm")],
            raw_data: Some(self.encrypt_aes128gcm(receiver, json.as_bytes())),
            ..Default::default()
        }
    }
}

/// Encode `messages` as they appear on the wire, prefixed by `version`.
#[must_use]
pub fn wire_bytes(version: u8, messages: &[McsMessage]) -> Vec<u8> {
    let schema = ProtocolSchema::shared();
    let mut buf = bytes::BytesMut::from(&[version][..]);
    for message in messages {
        schema.write_frame(message, &mut buf);
    }
    buf.to_vec()
}
