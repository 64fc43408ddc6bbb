//! Connection manager for the push channel.
//!
//! A [`PushClient`] opens a transport, sends the login request, and then
//! routes inbound messages: it decrypts data messages into notifications,
//! suppresses redelivered ids and answers heartbeats. When a transport
//! drops it reconnects with linear back-off. Everything the consumer needs
//! to observe arrives as a [`ClientEvent`] on the channel returned by
//! [`PushClientBuilder::build`].

mod backoff;
mod config;
mod error;
mod events;
mod login;
mod runtime;
mod session;
mod transport;

pub use backoff::ReconnectBackoff;
pub use config::{
    ClientConfig,
    DEFAULT_HOST,
    DEFAULT_LEDGER_CAPACITY,
    DEFAULT_MAX_BACKOFF,
    DEFAULT_PORT,
};
pub use error::ClientError;
pub use events::{ClientEvent, ConnectionState, Diagnostic};
pub use login::{CLIENT_ID, LOGIN_DOMAIN, login_frame, login_request};
pub use runtime::{PushClient, PushClientBuilder};
pub use transport::{BoxedTransport, Connector, TlsConnector, Transport};

#[cfg(test)]
pub(crate) use transport::MockConnector;
