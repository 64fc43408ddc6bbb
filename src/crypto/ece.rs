//! Encrypted content-encoding record decryption.
//!
//! Two encodings are supported. `aesgcm` carries the salt and sender key out
//! of band and prefixes each record with a two-byte padding length.
//! `aes128gcm` carries them in a binary header and terminates each record
//! with a delimiter byte.

use aes_gcm::{
    Aes128Gcm,
    KeyInit,
    Nonce,
    aead::{Aead, generic_array::GenericArray},
};
use hkdf::Hkdf;
use p256::{PublicKey, ecdh::diffie_hellman};
use sha2::Sha256;

use super::{DecryptError, EncryptionKeys};

pub(crate) const KEY_LEN: usize = 16;
pub(crate) const NONCE_LEN: usize = 12;
pub(crate) const TAG_LEN: usize = 16;
pub(crate) const SALT_LEN: usize = 16;
const SECRET_LEN: usize = 32;

/// Default record size for `aesgcm` when the `rs` parameter is absent.
pub const DEFAULT_RECORD_SIZE: usize = 4096;

/// Length of the fixed part of an `aes128gcm` header.
pub(crate) const AES128GCM_HEADER_LEN: usize = SALT_LEN + 4 + 1;

const AUTH_INFO: &[u8] = b"Content-Encoding: auth\0";
const AESGCM_INFO: &[u8] = b"Content-Encoding: aesgcm\0";
const AES128GCM_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const WEBPUSH_INFO: &[u8] = b"WebPush: info\0";
const P256_LABEL: &[u8] = b"P-256\0";

/// Per-message key material.
pub(crate) struct ContentKeys {
    pub(crate) cek: [u8; KEY_LEN],
    pub(crate) nonce: [u8; NONCE_LEN],
}

fn expand<const N: usize>(hk: &Hkdf<Sha256>, info: &[&[u8]]) -> Result<[u8; N], DecryptError> {
    let mut okm = [0_u8; N];
    hk.expand_multi_info(info, &mut okm)
        .map_err(|_| DecryptError::KeyDerivation)?;
    Ok(okm)
}

fn length_prefixed(key: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let len = u16::try_from(key.len()).map_err(|_| DecryptError::InvalidSenderKey)?;
    let mut out = len.to_be_bytes().to_vec();
    out.extend_from_slice(key);
    Ok(out)
}

fn content_keys(
    ikm: &[u8],
    salt: &[u8],
    cek_info: &[&[u8]],
    nonce_info: &[&[u8]],
) -> Result<ContentKeys, DecryptError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    Ok(ContentKeys {
        cek: expand(&hk, cek_info)?,
        nonce: expand(&hk, nonce_info)?,
    })
}

/// Derive `aesgcm` keys from an ECDH secret.
pub(crate) fn aesgcm_keys(
    shared: &[u8],
    auth_secret: &[u8],
    salt: &[u8],
    receiver_public: &[u8],
    sender_public: &[u8],
) -> Result<ContentKeys, DecryptError> {
    let auth = Hkdf::<Sha256>::new(Some(auth_secret), shared);
    let ikm: [u8; SECRET_LEN] = expand(&auth, &[AUTH_INFO])?;
    let receiver = length_prefixed(receiver_public)?;
    let sender = length_prefixed(sender_public)?;
    let context: [&[u8]; 3] = [P256_LABEL, &receiver, &sender];
    content_keys(
        &ikm,
        salt,
        &[AESGCM_INFO, context[0], context[1], context[2]],
        &[NONCE_INFO, context[0], context[1], context[2]],
    )
}

/// Derive `aes128gcm` keys from an ECDH secret.
pub(crate) fn aes128gcm_keys(
    shared: &[u8],
    auth_secret: &[u8],
    salt: &[u8],
    receiver_public: &[u8],
    sender_public: &[u8],
) -> Result<ContentKeys, DecryptError> {
    let auth = Hkdf::<Sha256>::new(Some(auth_secret), shared);
    let ikm: [u8; SECRET_LEN] = expand(&auth, &[WEBPUSH_INFO, receiver_public, sender_public])?;
    content_keys(&ikm, salt, &[AES128GCM_INFO], &[NONCE_INFO])
}

/// Nonce for record `counter`: the base nonce with the counter XORed into
/// its last six bytes.
pub(crate) fn record_nonce(base: &[u8; NONCE_LEN], counter: u64) -> [u8; NONCE_LEN] {
    let mut nonce = *base;
    let counter = counter.to_be_bytes();
    for (byte, mask) in nonce.iter_mut().skip(NONCE_LEN - 6).zip(counter.iter().skip(2)) {
        *byte ^= mask;
    }
    nonce
}

fn shared_secret(keys: &EncryptionKeys, sender_public: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let sender =
        PublicKey::from_sec1_bytes(sender_public).map_err(|_| DecryptError::InvalidSenderKey)?;
    let shared = diffie_hellman(keys.private_key().to_nonzero_scalar(), sender.as_affine());
    Ok(shared.raw_secret_bytes().to_vec())
}

fn open_record(
    cipher: &Aes128Gcm,
    base: &[u8; NONCE_LEN],
    counter: usize,
    record: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let nonce = record_nonce(base, counter as u64);
    cipher
        .decrypt(Nonce::from_slice(&nonce), record)
        .map_err(|_| DecryptError::Authentication)
}

fn strip_aesgcm_padding(record: &[u8]) -> Result<&[u8], DecryptError> {
    let (len, rest) = record.split_at_checked(2).ok_or(DecryptError::Padding)?;
    let pad = usize::from(u16::from_be_bytes([len[0], len[1]]));
    let (padding, data) = rest.split_at_checked(pad).ok_or(DecryptError::Padding)?;
    if padding.iter().any(|&byte| byte != 0) {
        return Err(DecryptError::Padding);
    }
    Ok(data)
}

fn strip_aes128gcm_padding(record: &[u8], last: bool) -> Result<&[u8], DecryptError> {
    let end = record
        .iter()
        .rposition(|&byte| byte != 0)
        .ok_or(DecryptError::Padding)?;
    let expected = if last { 2 } else { 1 };
    if record[end] != expected {
        return Err(DecryptError::Padding);
    }
    Ok(&record[..end])
}

/// Decrypt an `aesgcm` body with out-of-band salt, sender key and record
/// size.
pub(crate) fn decrypt_aesgcm(
    keys: &EncryptionKeys,
    body: &[u8],
    sender_public: &[u8],
    salt: &[u8],
    record_size: usize,
) -> Result<Vec<u8>, DecryptError> {
    if salt.len() != SALT_LEN {
        return Err(DecryptError::InvalidSalt(salt.len()));
    }
    if record_size < 2 {
        return Err(DecryptError::InvalidRecordSize(record_size));
    }
    let shared = shared_secret(keys, sender_public)?;
    let derived = aesgcm_keys(
        &shared,
        keys.auth_secret(),
        salt,
        &keys.public_key_bytes(),
        sender_public,
    )?;
    let cipher = Aes128Gcm::new(GenericArray::from_slice(&derived.cek));

    let chunk = record_size + TAG_LEN;
    let mut plaintext = Vec::with_capacity(body.len());
    let mut start = 0;
    let mut counter = 0;
    while start < body.len() {
        let end = (start + chunk).min(body.len());
        let record = &body[start..end];
        if record.len() <= TAG_LEN {
            return Err(DecryptError::Truncated);
        }
        // A full final record means the trailing padding-only record is missing.
        if end == body.len() && record.len() == chunk {
            return Err(DecryptError::Truncated);
        }
        let opened = open_record(&cipher, &derived.nonce, counter, record)?;
        plaintext.extend_from_slice(strip_aesgcm_padding(&opened)?);
        start = end;
        counter += 1;
    }
    Ok(plaintext)
}

/// Decrypt an `aes128gcm` body, reading salt, record size and sender key
/// from its header.
pub(crate) fn decrypt_aes128gcm(
    keys: &EncryptionKeys,
    body: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let (header, rest) = body
        .split_at_checked(AES128GCM_HEADER_LEN)
        .ok_or(DecryptError::Truncated)?;
    let (salt, tail) = header.split_at(SALT_LEN);
    let record_size = usize::try_from(u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]))
        .map_err(|_| DecryptError::InvalidRecordSize(usize::MAX))?;
    let id_len = usize::from(tail[4]);
    let (sender_public, records) = rest
        .split_at_checked(id_len)
        .ok_or(DecryptError::Truncated)?;
    if record_size <= TAG_LEN + 1 {
        return Err(DecryptError::InvalidRecordSize(record_size));
    }

    let shared = shared_secret(keys, sender_public)?;
    let derived = aes128gcm_keys(
        &shared,
        keys.auth_secret(),
        salt,
        &keys.public_key_bytes(),
        sender_public,
    )?;
    let cipher = Aes128Gcm::new(GenericArray::from_slice(&derived.cek));

    let mut plaintext = Vec::with_capacity(records.len());
    let mut counter = 0;
    let mut chunks = records.chunks(record_size).peekable();
    if chunks.peek().is_none() {
        return Err(DecryptError::Truncated);
    }
    while let Some(record) = chunks.next() {
        if record.len() <= TAG_LEN {
            return Err(DecryptError::Truncated);
        }
        let last = chunks.peek().is_none();
        let opened = open_record(&cipher, &derived.nonce, counter, record)?;
        plaintext.extend_from_slice(strip_aes128gcm_padding(&opened, last)?);
        counter += 1;
    }
    Ok(plaintext)
}
