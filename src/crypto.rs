//! Payload decryption for push data messages.
//!
//! A data message carries its ciphertext in `raw_data` and its key
//! parameters in app-data entries. By default the `aesgcm` encoding is
//! assumed, with the sender key in `crypto-key: dh=...` and the salt in
//! `encryption: salt=...`. Messages marked `content-encoding: aes128gcm`
//! carry everything in a binary header instead.

use crate::{notification::Notification, proto::DataMessageStanza};

mod ece;
mod keys;

pub use ece::DEFAULT_RECORD_SIZE;
#[cfg(any(test, feature = "test-helpers"))]
pub(crate) use ece::{
    ContentKeys,
    SALT_LEN,
    aes128gcm_keys,
    aesgcm_keys,
    record_nonce,
};
pub(crate) use keys::decode_base64;
pub use keys::{EncryptionKeys, KeyError};

/// App-data key naming the content encoding.
pub const CONTENT_ENCODING_KEY: &str = "content-encoding";
/// App-data key carrying the sender's public key.
pub const CRYPTO_KEY_KEY: &str = "crypto-key";
/// App-data key carrying the salt and record size.
pub const ENCRYPTION_KEY: &str = "encryption";

/// Errors decrypting a data message.
///
/// [`is_ignorable`](Self::is_ignorable) separates errors that only affect
/// the one message from those that indicate broken key material or a broken
/// peer.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    /// The `crypto-key` entry or its `dh` parameter is absent.
    #[error("crypto-key is missing")]
    MissingCryptoKey,
    /// The `encryption` entry or its `salt` parameter is absent.
    #[error("salt is missing")]
    MissingSalt,
    /// A record failed AEAD authentication.
    #[error("unable to authenticate data")]
    Authentication,
    /// The stanza has no ciphertext.
    #[error("raw data is missing")]
    MissingRawData,
    /// A parameter is not valid base64.
    #[error("{field} is not valid base64: {source}")]
    Encoding {
        /// Parameter name.
        field: &'static str,
        /// Underlying decoder error.
        #[source]
        source: base64::DecodeError,
    },
    /// The sender key is not a P-256 point.
    #[error("invalid sender public key")]
    InvalidSenderKey,
    /// The salt does not have the required length.
    #[error("invalid salt length: {0}")]
    InvalidSalt(usize),
    /// The record size is unusable.
    #[error("invalid record size: {0}")]
    InvalidRecordSize(usize),
    /// The `rs` parameter is not a number.
    #[error("invalid rs parameter: {0}")]
    InvalidRecordSizeParam(String),
    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivation,
    /// Record padding is malformed.
    #[error("invalid record padding")]
    Padding,
    /// The ciphertext ends mid-record or lacks its final record.
    #[error("ciphertext is truncated")]
    Truncated,
    /// The plaintext is not a JSON notification.
    #[error("notification payload is not valid JSON: {0}")]
    Payload(#[source] serde_json::Error),
}

impl DecryptError {
    /// Whether the message may be dropped while the client keeps running.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            Self::MissingCryptoKey | Self::MissingSalt | Self::Authentication
        )
    }
}

/// Look up `name` in a `k=v; k=v` parameter list.
///
/// Lists joined with `,` are searched too.
#[must_use]
pub fn header_param<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split([';', ','])
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn decode_param(field: &'static str, value: &str) -> Result<Vec<u8>, DecryptError> {
    decode_base64(value).map_err(|source| DecryptError::Encoding { field, source })
}

/// Decrypt a stanza's ciphertext to plaintext bytes.
///
/// # Errors
///
/// Returns a [`DecryptError`] describing why the payload could not be
/// recovered.
pub fn decrypt_payload(
    stanza: &DataMessageStanza,
    keys: &EncryptionKeys,
) -> Result<Vec<u8>, DecryptError> {
    let body = stanza
        .raw_data
        .as_deref()
        .ok_or(DecryptError::MissingRawData)?;

    let encoding = stanza.app_data_value(CONTENT_ENCODING_KEY);
    if encoding.is_some_and(|value| value.eq_ignore_ascii_case("aes128gcm")) {
        return ece::decrypt_aes128gcm(keys, body);
    }

    let crypto_key = stanza
        .app_data_value(CRYPTO_KEY_KEY)
        .and_then(|header| header_param(header, "dh"))
        .ok_or(DecryptError::MissingCryptoKey)?;
    let encryption = stanza
        .app_data_value(ENCRYPTION_KEY)
        .ok_or(DecryptError::MissingSalt)?;
    let salt = header_param(encryption, "salt").ok_or(DecryptError::MissingSalt)?;
    let record_size = header_param(encryption, "rs")
        .map(|rs| {
            rs.parse::<usize>()
                .map_err(|_| DecryptError::InvalidRecordSizeParam(rs.to_owned()))
        })
        .transpose()?
        .unwrap_or(DEFAULT_RECORD_SIZE);

    let sender_public = decode_param("dh", crypto_key)?;
    let salt = decode_param("salt", salt)?;
    ece::decrypt_aesgcm(keys, body, &sender_public, &salt, record_size)
}

/// Decrypt a stanza and parse the plaintext as a [`Notification`].
///
/// # Errors
///
/// Returns a [`DecryptError`]; [`DecryptError::is_ignorable`] tells the
/// caller whether to drop the message or stop.
pub fn decrypt(
    stanza: &DataMessageStanza,
    keys: &EncryptionKeys,
) -> Result<Notification, DecryptError> {
    let plaintext = decrypt_payload(stanza, keys)?;
    Notification::from_json(&plaintext).map_err(DecryptError::Payload)
}

#[cfg(test)]
mod tests;
