//! Per-connection message dispatch.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::{
    ClientError,
    events::{ClientEvent, ConnectionState, Diagnostic},
    runtime::Shared,
};
use crate::{
    crypto,
    message::McsMessage,
    metrics::{self, DropReason},
    proto::{DataMessageStanza, HeartbeatAck, HeartbeatPing, LoginResponse},
};

/// Routes decoded messages for one connection.
pub(super) struct Session {
    shared: Arc<Shared>,
    authenticated: bool,
}

impl Session {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            authenticated: false,
        }
    }

    /// Handle one inbound message, returning a reply to send if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when a data message fails to decrypt for a
    /// reason that is not safe to skip.
    pub(super) fn handle(&mut self, message: McsMessage) -> Result<Option<McsMessage>, ClientError> {
        match message {
            McsMessage::LoginResponse(response) => self.on_login_response(&response),
            McsMessage::DataMessageStanza(stanza) => self.on_data_message(&stanza)?,
            McsMessage::HeartbeatPing(ping) => return Ok(self.on_heartbeat_ping(&ping)),
            McsMessage::HeartbeatAck(_) => trace!("heartbeat acknowledged"),
            McsMessage::Close(_) => info!("server requested close"),
            McsMessage::StreamErrorStanza(error) => {
                warn!(kind = %error.r#type, text = error.text(), "server reported a stream error");
            }
            McsMessage::IqStanza(iq) => debug!(id = %iq.id, kind = iq.r#type, "iq stanza ignored"),
            McsMessage::LoginRequest(_) => debug!("ignoring login request sent by server"),
        }
        Ok(None)
    }

    fn on_login_response(&mut self, response: &LoginResponse) {
        if self.authenticated {
            warn!(id = %response.id, "unexpected second login response");
            return;
        }
        if let Some(error) = &response.error {
            warn!(
                code = error.code,
                reason = error.message(),
                "login response carries an error"
            );
        }
        self.authenticated = true;
        let reported = {
            let mut ledger = self.shared.ledger();
            let reported = ledger.len();
            ledger.clear();
            reported
        };
        info!(reported, "login acknowledged");
        self.shared.set_state(ConnectionState::Authenticated);
        self.shared.emit(ClientEvent::Authenticated);
    }

    fn on_heartbeat_ping(&self, ping: &HeartbeatPing) -> Option<McsMessage> {
        if !self.shared.config.answer_heartbeats() {
            return None;
        }
        trace!("answering heartbeat ping");
        Some(McsMessage::HeartbeatAck(HeartbeatAck {
            last_stream_id_received: ping.stream_id,
            ..Default::default()
        }))
    }

    fn on_data_message(&self, stanza: &DataMessageStanza) -> Result<(), ClientError> {
        let persistent_id = stanza.persistent_id().to_owned();
        if !persistent_id.is_empty() && self.shared.ledger().has_seen(&persistent_id) {
            debug!(%persistent_id, "duplicate data message dropped");
            metrics::inc_dropped(DropReason::Duplicate);
            return Ok(());
        }

        match crypto::decrypt(stanza, &self.shared.credentials.keys) {
            Ok(notification) => {
                self.remember(&persistent_id);
                metrics::inc_notifications();
                debug!(%persistent_id, "notification received");
                self.shared.emit(ClientEvent::Notification {
                    notification,
                    persistent_id,
                });
                Ok(())
            }
            Err(err) if err.is_ignorable() => {
                warn!(%persistent_id, error = %err, "message dropped as it could not be decrypted");
                self.remember(&persistent_id);
                metrics::inc_dropped(DropReason::Undecryptable);
                self.shared
                    .emit(ClientEvent::Diagnostic(Diagnostic::MessageDropped {
                        persistent_id,
                        reason: err.to_string(),
                    }));
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remember(&self, persistent_id: &str) {
        if !persistent_id.is_empty() {
            self.shared.ledger().mark_seen(persistent_id);
        }
    }
}
