#![doc(html_root_url = "https://docs.rs/pushframe/latest")]
//! Public API for the `pushframe` library.
//!
//! This crate is a client for the mobile push connection protocol used to
//! deliver web push notifications. It keeps a TLS connection to the
//! connection server, logs in with device credentials, and decodes the
//! framed protobuf stream. Data messages are decrypted into
//! [`Notification`]s, and each persistent id is delivered at most once
//! across reconnects.

pub mod client;
pub mod codec;
pub mod credentials;
pub mod crypto;
pub mod ledger;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod proto;
pub mod schema;
pub mod tag;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::{ClientConfig, ClientError, ClientEvent, PushClient, PushClientBuilder};
pub use codec::{CodecError, McsCodec, StreamParser};
pub use credentials::{Credentials, CredentialsFile};
pub use crypto::{DecryptError, EncryptionKeys};
pub use ledger::PersistentIdLedger;
pub use message::McsMessage;
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};
pub use notification::Notification;
