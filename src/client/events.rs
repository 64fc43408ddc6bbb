//! Events delivered to the consumer of a [`PushClient`](super::PushClient).

use std::{sync::Arc, time::Duration};

use super::ClientError;
use crate::notification::Notification;

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The login request was sent; no response yet.
    AwaitingHandshake,
    /// The server accepted the login.
    Authenticated,
}

/// Conditions worth surfacing that do not stop the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// Opening the transport failed.
    ConnectFailed {
        /// Transport error text.
        reason: String,
    },
    /// The transport closed before the login request could be sent.
    ClosedBeforeHandshake,
    /// The stream could not be decoded and the connection was dropped.
    StreamCorrupted {
        /// Codec error text.
        reason: String,
    },
    /// A message was dropped because it could not be decrypted.
    MessageDropped {
        /// Id of the dropped message.
        persistent_id: String,
        /// Decryption error text.
        reason: String,
    },
    /// A reconnect was scheduled.
    ReconnectScheduled {
        /// Delay before the attempt.
        delay: Duration,
    },
}

/// Event emitted by the connection manager.
///
/// For every session `Disconnected` precedes the `Connected` of the next
/// attempt.
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// The transport opened; the login request is being sent.
    Connected,
    /// The server acknowledged the login.
    Authenticated,
    /// A session that emitted [`ClientEvent::Connected`] ended.
    Disconnected,
    /// A new notification arrived. Persist `persistent_id` to keep
    /// suppressing redelivery across restarts.
    Notification {
        /// Decrypted content.
        notification: Notification,
        /// Server id of the message.
        persistent_id: String,
    },
    /// A non-fatal condition.
    Diagnostic(Diagnostic),
    /// The client stopped on a fatal error and will not reconnect.
    Stopped(Arc<ClientError>),
}
