//! Connection credentials and the registration seam.
//!
//! Credentials are produced by an external registration flow. The client
//! consumes them through [`CredentialsProvider`], which is queried once
//! before the first connection attempt.

use std::{fmt, path::Path};

use async_trait::async_trait;
use serde::Deserialize;

use crate::crypto::EncryptionKeys;

/// Errors obtaining credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// Reading a credentials file failed.
    #[error("failed to read credentials: {0}")]
    Io(#[from] std::io::Error),
    /// The credentials document is malformed.
    #[error("invalid credentials: {0}")]
    Parse(#[from] serde_json::Error),
    /// The android id is not a decimal integer.
    #[error("android id must be a decimal integer, got {0:?}")]
    InvalidAndroidId(String),
    /// A provider failed to produce credentials.
    #[error("credentials unavailable: {0}")]
    Unavailable(String),
}

/// Device identity issued by check-in.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GcmIdentity {
    /// Decimal android id.
    pub android_id: String,
    /// Security token paired with the android id.
    pub security_token: String,
}

impl GcmIdentity {
    /// The android id as lowercase hex, as used in the device id.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidAndroidId`] if the id is not an
    /// unsigned 64-bit decimal.
    pub fn android_id_hex(&self) -> Result<String, CredentialsError> {
        self.android_id
            .parse::<u64>()
            .map(|id| format!("{id:x}"))
            .map_err(|_| CredentialsError::InvalidAndroidId(self.android_id.clone()))
    }
}

impl fmt::Debug for GcmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcmIdentity")
            .field("android_id", &self.android_id)
            .finish_non_exhaustive()
    }
}

/// Identity plus the keys needed to decrypt payloads.
#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    /// Device identity.
    pub gcm: GcmIdentity,
    /// Payload decryption keys.
    pub keys: EncryptionKeys,
}

/// Credentials document as written by registration, optionally carrying the
/// persistent ids delivered in an earlier run.
///
/// # Examples
///
/// ```
/// use pushframe::credentials::CredentialsFile;
///
/// let file = CredentialsFile::from_json(
///     r#"{
///         "gcm": {"androidId": "5", "securityToken": "t"},
///         "keys": {
///             "privateKey": "ERERERERERERERERERERERERERERERERERERERERERE",
///             "authSecret": "AAECAwQFBgcICQoLDA0ODw"
///         },
///         "persistentIds": ["0:1"]
///     }"#,
/// )
/// .expect("valid document");
/// assert_eq!(file.persistent_ids, ["0:1"]);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsFile {
    /// Identity and keys.
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Ids already delivered.
    #[serde(default)]
    pub persistent_ids: Vec<String>,
}

impl CredentialsFile {
    /// Parse a credentials document.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Parse`] if the document is malformed or
    /// the keys are invalid.
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let file: Self = serde_json::from_str(json)?;
        file.credentials.gcm.android_id_hex()?;
        Ok(file)
    }

    /// Read and parse a credentials document.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

/// Source of credentials, typically a registration client.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CredentialsProvider: Send + Sync {
    /// Obtain credentials for a new client.
    async fn credentials(&self) -> Result<Credentials, CredentialsError>;
}

/// Provider returning credentials obtained earlier.
#[derive(Clone, Debug)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> { Ok(self.0.clone()) }
}
