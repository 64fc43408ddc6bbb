//! Receiver key material.

use std::fmt;

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use p256::{SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use serde::Deserialize;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode base64 in either the URL-safe or the standard alphabet, with or
/// without padding.
pub(crate) fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let input = input.trim();
    URL_SAFE_LENIENT
        .decode(input)
        .or_else(|_| STANDARD_LENIENT.decode(input))
}

/// Errors loading key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// A key field is not valid base64.
    #[error("{field} is not valid base64: {source}")]
    Encoding {
        /// Name of the offending field.
        field: &'static str,
        /// Underlying decoder error.
        #[source]
        source: base64::DecodeError,
    },
    /// The private key is not a valid P-256 scalar.
    #[error("private key is not a valid P-256 scalar")]
    InvalidPrivateKey,
    /// The auth secret is empty.
    #[error("auth secret must not be empty")]
    EmptyAuthSecret,
}

/// The receiver's static P-256 key and shared auth secret.
///
/// # Examples
///
/// ```
/// use pushframe::crypto::EncryptionKeys;
///
/// let keys = EncryptionKeys::from_base64(
///     "ERERERERERERERERERERERERERERERERERERERERERE",
///     "AAECAwQFBgcICQoLDA0ODw",
/// )
/// .expect("valid key material");
/// assert_eq!(keys.public_key_bytes().len(), 65);
/// ```
#[derive(Clone, Deserialize)]
#[serde(try_from = "RawKeys")]
pub struct EncryptionKeys {
    private_key: SecretKey,
    auth_secret: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeys {
    private_key: String,
    auth_secret: String,
}

impl TryFrom<RawKeys> for EncryptionKeys {
    type Error = KeyError;

    fn try_from(raw: RawKeys) -> Result<Self, Self::Error> {
        Self::from_base64(&raw.private_key, &raw.auth_secret)
    }
}

impl EncryptionKeys {
    /// Build keys from raw parts.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptyAuthSecret`] if `auth_secret` is empty.
    pub fn new(private_key: SecretKey, auth_secret: Vec<u8>) -> Result<Self, KeyError> {
        if auth_secret.is_empty() {
            return Err(KeyError::EmptyAuthSecret);
        }
        Ok(Self {
            private_key,
            auth_secret,
        })
    }

    /// Decode keys from the base64 strings produced by registration.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if either value is not base64, the private key is
    /// not a valid scalar, or the auth secret is empty.
    pub fn from_base64(private_key: &str, auth_secret: &str) -> Result<Self, KeyError> {
        let key_bytes = decode_base64(private_key).map_err(|source| KeyError::Encoding {
            field: "privateKey",
            source,
        })?;
        let private_key =
            SecretKey::from_slice(&key_bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let auth_secret = decode_base64(auth_secret).map_err(|source| KeyError::Encoding {
            field: "authSecret",
            source,
        })?;
        Self::new(private_key, auth_secret)
    }

    pub(crate) fn private_key(&self) -> &SecretKey { &self.private_key }

    pub(crate) fn auth_secret(&self) -> &[u8] { &self.auth_secret }

    /// Uncompressed SEC1 encoding of the receiver public key.
    #[must_use]
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.private_key
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }
}

impl fmt::Debug for EncryptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeys").finish_non_exhaustive()
    }
}
