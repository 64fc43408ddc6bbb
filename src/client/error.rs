//! Error types for the connection manager.

use std::{io, sync::Arc};

use crate::{credentials::CredentialsError, crypto::DecryptError};

/// Errors emitted by [`crate::client::PushClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client was destroyed.
    #[error("client destroyed")]
    Destroyed,
    /// Credentials were unusable.
    #[error("invalid credentials: {0}")]
    Credentials(#[from] CredentialsError),
    /// A payload failed to decrypt for a reason that is not safe to skip.
    #[error("failed to decrypt notification: {0}")]
    Decrypt(#[from] DecryptError),
    /// The client stopped earlier on this fatal error.
    #[error("client stopped: {0}")]
    Stopped(Arc<ClientError>),
    /// Transport configuration failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}
