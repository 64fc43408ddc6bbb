//! Connection supervisor and the public client handle.
//!
//! [`PushClient::connect`] makes the first attempt inline and then hands the
//! connection to a supervisor task. The supervisor drives one session at a
//! time, and when a session ends it sleeps for the back-off delay before the
//! next attempt. Cancelling the shutdown token stops it at the next await
//! point, and [`PushClient::destroy`] also aborts the task outright so no
//! event can follow a destroy.

use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
    atomic::{AtomicBool, Ordering},
};

use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncWriteExt, split},
    select,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};
use tracing::{Instrument, error, info, info_span, warn};

use super::{
    ClientConfig,
    ClientError,
    ReconnectBackoff,
    events::{ClientEvent, ConnectionState, Diagnostic},
    login,
    session::Session,
    transport::{BoxedTransport, Connector, TlsConnector},
};
use crate::{
    codec::{CodecError, McsCodec},
    credentials::{Credentials, CredentialsError, CredentialsProvider},
    ledger::PersistentIdLedger,
    metrics::{self, Direction},
    schema::ProtocolSchema,
};

type Outcome = Option<Result<(), Arc<ClientError>>>;

/// State shared by the client handle, the supervisor and the session.
pub(super) struct Shared {
    pub(super) credentials: Credentials,
    pub(super) config: ClientConfig,
    connector: Arc<dyn Connector>,
    codec: McsCodec,
    ledger: Mutex<PersistentIdLedger>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<ClientEvent>,
    shutdown: CancellationToken,
    writable: AtomicBool,
    outcome: watch::Sender<Outcome>,
}

impl Shared {
    pub(super) fn ledger(&self) -> MutexGuard<'_, PersistentIdLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn set_state(&self, state: ConnectionState) { self.state.send_replace(state); }

    /// Deliver `event` unless the client has been shut down.
    pub(super) fn emit(&self, event: ClientEvent) {
        if self.shutdown.is_cancelled() {
            return;
        }
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    fn finish(&self, outcome: Result<(), Arc<ClientError>>) {
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }

    fn stop(&self, err: ClientError) -> Arc<ClientError> {
        error!(error = %err, "client stopped");
        let err = Arc::new(err);
        self.emit(ClientEvent::Stopped(Arc::clone(&err)));
        self.finish(Err(Arc::clone(&err)));
        self.shutdown.cancel();
        self.set_state(ConnectionState::Disconnected);
        err
    }

    /// Mark the transport closed. The gauge drops once per open transport
    /// even when `destroy` races the supervisor.
    fn release_transport(&self) {
        if self.writable.swap(false, Ordering::AcqRel) {
            metrics::dec_connections();
        }
    }

    fn end_session(&self) {
        self.release_transport();
        self.set_state(ConnectionState::Disconnected);
        self.emit(ClientEvent::Disconnected);
    }
}

/// Result of one connection attempt.
enum Attempt {
    /// Transport open and login written.
    Open(BoxedTransport),
    /// Transport opened but closed before the login was written.
    ClosedEarly,
    /// Transport could not be opened.
    Failed,
}

/// How a session ended.
enum SessionEnd {
    Closed,
    Cancelled,
    Fatal(ClientError),
}

async fn establish(shared: &Shared) -> Result<Attempt, ClientError> {
    shared.set_state(ConnectionState::Connecting);
    let mut transport = match shared.connector.connect().await {
        Ok(transport) => transport,
        Err(err) => {
            warn!(error = %err, "failed to open connection");
            metrics::inc_errors("connect");
            shared.set_state(ConnectionState::Disconnected);
            shared.emit(ClientEvent::Diagnostic(Diagnostic::ConnectFailed {
                reason: err.to_string(),
            }));
            return Ok(Attempt::Failed);
        }
    };

    let login = login::login_frame(
        &ProtocolSchema::shared(),
        &shared.credentials.gcm,
        &shared.ledger(),
    )?;
    metrics::inc_connections();
    shared.writable.store(true, Ordering::Release);
    shared.set_state(ConnectionState::AwaitingHandshake);
    shared.emit(ClientEvent::Connected);

    let written = async {
        transport.write_all(&login).await?;
        transport.flush().await
    }
    .await;
    if let Err(err) = written {
        warn!(error = %err, "connection closed before the login request was sent");
        shared.emit(ClientEvent::Diagnostic(Diagnostic::ClosedBeforeHandshake));
        shared.end_session();
        return Ok(Attempt::ClosedEarly);
    }
    metrics::inc_frames(Direction::Outbound);
    info!(
        reported = shared.ledger().len(),
        "login request sent"
    );
    Ok(Attempt::Open(transport))
}

fn report_stream_error(shared: &Shared, err: &CodecError) {
    metrics::inc_errors(err.error_type());
    if let CodecError::Io(io) = err {
        warn!(error = %io, "socket error");
        return;
    }
    warn!(error = %err, kind = err.error_type(), "stream error, dropping connection");
    shared.emit(ClientEvent::Diagnostic(Diagnostic::StreamCorrupted {
        reason: err.to_string(),
    }));
}

async fn drive(shared: &Arc<Shared>, transport: BoxedTransport) -> SessionEnd {
    let (reader, writer) = split(transport);
    let mut frames = FramedRead::new(reader, shared.codec.decoder());
    let mut replies = FramedWrite::new(writer, shared.codec.encoder());
    let mut session = Session::new(Arc::clone(shared));

    loop {
        let next = select! {
            biased;

            () = shared.shutdown.cancelled() => return SessionEnd::Cancelled,
            next = frames.next() => next,
        };
        let message = match next {
            None => {
                info!("connection closed");
                return SessionEnd::Closed;
            }
            Some(Err(err)) => {
                report_stream_error(shared, &err);
                return SessionEnd::Closed;
            }
            Some(Ok(message)) => message,
        };
        metrics::inc_frames(Direction::Inbound);
        match session.handle(message) {
            Ok(None) => {}
            Ok(Some(reply)) => {
                if let Err(err) = replies.send(reply).await {
                    warn!(error = %err, "failed to send reply");
                    return SessionEnd::Closed;
                }
                metrics::inc_frames(Direction::Outbound);
            }
            Err(err) => return SessionEnd::Fatal(err),
        }
    }
}

async fn supervise(shared: Arc<Shared>, first: Attempt) {
    let mut backoff = ReconnectBackoff::new(
        shared.config.backoff_step(),
        shared.config.max_backoff(),
    );
    let mut attempt = first;
    loop {
        match attempt {
            Attempt::Open(transport) => {
                backoff.reset();
                let end = drive(&shared, transport)
                    .instrument(info_span!("client.session"))
                    .await;
                shared.end_session();
                match end {
                    SessionEnd::Closed => {}
                    SessionEnd::Cancelled => return,
                    SessionEnd::Fatal(err) => {
                        shared.stop(err);
                        return;
                    }
                }
            }
            Attempt::ClosedEarly => backoff.reset(),
            Attempt::Failed => {}
        }

        let delay = backoff.next_delay();
        info!(
            delay_secs = delay.as_secs_f64(),
            retries = backoff.retries(),
            "scheduling reconnect"
        );
        metrics::inc_reconnects();
        shared.emit(ClientEvent::Diagnostic(Diagnostic::ReconnectScheduled { delay }));
        select! {
            biased;

            () = shared.shutdown.cancelled() => return,
            () = sleep(delay) => {}
        }

        let result = select! {
            biased;

            () = shared.shutdown.cancelled() => return,
            result = establish(&shared).instrument(info_span!("client.connect")) => result,
        };
        attempt = match result {
            Ok(next) => next,
            Err(err) => {
                shared.stop(err);
                return;
            }
        };
    }
}

/// Handle to a push connection.
///
/// Dropping the handle destroys the client.
pub struct PushClient {
    shared: Arc<Shared>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PushClient {
    /// Start building a client for `credentials`.
    #[must_use]
    pub fn builder(credentials: Credentials) -> PushClientBuilder {
        PushClientBuilder::new(credentials)
    }

    fn terminal_error(&self) -> Option<ClientError> {
        match self.shared.outcome.borrow().as_ref()? {
            Ok(()) => Some(ClientError::Destroyed),
            Err(err) => Some(ClientError::Stopped(Arc::clone(err))),
        }
    }

    /// Open the connection and start the supervisor.
    ///
    /// Transport failures are not errors: they are reported as
    /// [`Diagnostic`] events and retried with back-off. Calling `connect`
    /// on a running client does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Destroyed`] after [`destroy`](Self::destroy),
    /// or [`ClientError::Stopped`] if the client hit a fatal error.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if let Some(err) = self.terminal_error() {
            return Err(err);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let span = info_span!(
            "client.connect",
            host = self.shared.config.host(),
            port = self.shared.config.port()
        );
        let result = select! {
            biased;

            () = self.shared.shutdown.cancelled() => None,
            result = establish(&self.shared).instrument(span) => Some(result),
        };
        let first = match result {
            Some(Ok(attempt)) if !self.shared.shutdown.is_cancelled() => attempt,
            Some(Err(err)) if !self.shared.shutdown.is_cancelled() => {
                return Err(ClientError::Stopped(self.shared.stop(err)));
            }
            _ => {
                // `destroy` ran while the attempt was in flight. Undo any
                // transport state the attempt published after it.
                self.shared.release_transport();
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(ClientError::Destroyed);
            }
        };

        let handle = tokio::spawn(supervise(Arc::clone(&self.shared), first).in_current_span());
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        *task = Some(handle);
        Ok(())
    }

    /// Tear down the connection and cancel any pending reconnect.
    ///
    /// No events are emitted afterwards. Calling `destroy` again does
    /// nothing.
    pub fn destroy(&self) {
        self.shared.shutdown.cancel();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.shared.release_transport();
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.finish(Ok(()));
    }

    /// Whether a transport is open and writable.
    ///
    /// This is a local liveness check; it says nothing about whether the
    /// server is reachable.
    #[must_use]
    pub fn check_connection(&self) -> bool {
        !self.shared.shutdown.is_cancelled() && self.shared.writable.load(Ordering::Acquire)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { *self.shared.state.borrow() }

    /// Watch connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> { self.shared.state.subscribe() }

    /// Ids currently held in the ledger, oldest first.
    #[must_use]
    pub fn persistent_ids(&self) -> Vec<String> { self.shared.ledger().to_vec() }

    /// Wait until the client is destroyed or stops on a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Stopped`] carrying the fatal error.
    pub async fn closed(&self) -> Result<(), ClientError> {
        let mut outcome = self.shared.outcome.subscribe();
        let result = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Ok(())),
            Err(_) => Ok(()),
        };
        result.map_err(ClientError::Stopped)
    }
}

impl Drop for PushClient {
    fn drop(&mut self) { self.destroy(); }
}

impl std::fmt::Debug for PushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushClient")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PushClient`].
///
/// # Examples
///
/// ```no_run
/// use pushframe::{client::PushClient, credentials::CredentialsFile};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let file = CredentialsFile::load("credentials.json").await?;
/// let (client, mut events) = PushClient::builder(file.credentials)
///     .persistent_ids(file.persistent_ids)
///     .build()?;
/// client.connect().await?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct PushClientBuilder {
    credentials: Credentials,
    config: ClientConfig,
    persistent_ids: Vec<String>,
    connector: Option<Arc<dyn Connector>>,
}

impl PushClientBuilder {
    /// Start from `credentials` with the default configuration.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: ClientConfig::default(),
            persistent_ids: Vec::new(),
            connector: None,
        }
    }

    /// Start from credentials produced by `provider`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn from_provider(
        provider: &dyn CredentialsProvider,
    ) -> Result<Self, CredentialsError> {
        Ok(Self::new(provider.credentials().await?))
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the ledger with ids delivered in an earlier run.
    #[must_use]
    pub fn persistent_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persistent_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Open transports with `connector` instead of TLS to the configured
    /// endpoint.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the client and the receiver for its events.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Credentials`] if the android id is invalid,
    /// or [`ClientError::Io`] if the TLS configuration cannot be built.
    pub fn build(self) -> Result<(PushClient, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        self.credentials.gcm.android_id_hex()?;
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TlsConnector::new(&self.config)?),
        };
        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Shared {
            codec: McsCodec::new(ProtocolSchema::shared(), self.config.max_frame_length()),
            ledger: Mutex::new(PersistentIdLedger::with_ids(
                self.config.ledger_capacity(),
                self.persistent_ids,
            )),
            credentials: self.credentials,
            config: self.config,
            connector,
            state: watch::Sender::new(ConnectionState::Disconnected),
            events,
            shutdown: CancellationToken::new(),
            writable: AtomicBool::new(false),
            outcome: watch::Sender::new(None),
        };
        let client = PushClient {
            shared: Arc::new(shared),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        };
        Ok((client, receiver))
    }
}
