//! Session lifecycle for a single ESL connection

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::{
    channel::HangupCause,
    command::{CommandId, EslCommand, EslResponse, LogLevel, SendMsg},
    constants::{
        DEFAULT_HANDSHAKE_TIMEOUT_MS, HEADER_CONTENT_DISPOSITION, MAX_EVENT_QUEUE_SIZE,
        REPLY_OK, SOCKET_BUF_SIZE,
    },
    correlation::ReplyCorrelator,
    dispatch::{EventDispatcher, EventListener, Listeners},
    error::{EslError, EslResult},
    event::{EslEvent, EslEventType, EventFormat},
    message::EslMessage,
    protocol::{FrameDecoder, MessageType},
};

fn event_types_to_string(events: &[EslEventType]) -> String {
    events
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Only plain events are decoded; any other format would end the session on the
/// first event the switch sends.
fn require_plain(format: EventFormat) -> EslResult<()> {
    match format {
        EventFormat::Plain => Ok(()),
        other => Err(EslError::UnsupportedEventFormat {
            format: other.to_string(),
        }),
    }
}

/// Which side opened the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// We dialed the switch's event socket and authenticate to it.
    Inbound,
    /// The switch dialed our listener for one channel.
    Outbound,
}

/// Why a ready session ended
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Server sent a text/disconnect-notice without a linger disposition
    ServerNotice,
    /// EOF on the transport
    ConnectionClosed,
    /// Transport read failed (io::Error is not Clone, so only the message is kept)
    IoError(String),
    /// An inbound frame could not be decoded
    ProtocolError(String),
    /// `close()` or `disconnect()` was called
    ClientRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ServerNotice => write!(f, "server sent disconnect notice"),
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
        }
    }
}

/// Lifecycle of a session.
///
/// `Disconnected → Connecting → Handshaking → Ready → Closed`, with `Failed` reachable
/// from `Connecting` and `Handshaking`. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
    Closed(DisconnectReason),
    /// Handshake did not complete; carries the server's rejection text or the error.
    Failed(String),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed(_) | SessionState::Failed(_))
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Handshaking => write!(f, "handshaking"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closed(reason) => write!(f, "closed ({})", reason),
            SessionState::Failed(text) => write!(f, "failed ({})", text),
        }
    }
}

/// Options for ESL connection configuration.
///
/// Fixed at connection time. Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct EslConnectOptions {
    /// Capacity of each listener lane. Default: 1000.
    pub event_queue_size: usize,
    /// Budget for transport connect plus handshake. Default: 5 seconds.
    pub handshake_timeout: Duration,
}

impl Default for EslConnectOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
        }
    }
}

/// Credentials for a dial-out (inbound mode) connection.
#[derive(Clone)]
pub(crate) enum Credentials {
    Password(String),
    User { user: String, password: String },
}

impl Credentials {
    /// `userauth` needs `user@domain`; the switch rejects anything else.
    fn validate(&self) -> EslResult<()> {
        if let Credentials::User { user, .. } = self {
            if !user.contains('@') {
                return Err(EslError::auth_failed(format!(
                    "Invalid username format '{}': must be user@domain (e.g., admin@default)",
                    user
                )));
            }
        }
        Ok(())
    }

    fn to_command(&self) -> EslCommand {
        match self {
            Credentials::Password(password) => EslCommand::Auth {
                password: password.clone(),
            },
            Credentials::User { user, password } => EslCommand::UserAuth {
                user: user.clone(),
                password: password.clone(),
            },
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password([REDACTED])"),
            Credentials::User { user, .. } => write!(f, "User({}:[REDACTED])", user),
        }
    }
}

/// What to do once the transport is up.
#[derive(Debug, Clone)]
pub(crate) enum Handshake {
    Inbound(Credentials),
    Outbound,
}

impl Handshake {
    fn mode(&self) -> ConnectionMode {
        match self {
            Handshake::Inbound(_) => ConnectionMode::Inbound,
            Handshake::Outbound => ConnectionMode::Outbound,
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// State shared between session handles and the reader task
struct SharedState {
    correlator: ReplyCorrelator,
    /// Write half; the reader shuts it down when the session ends
    writer: Mutex<BoxedWriter>,
    /// Wakes the reader when `close()` gives up waiting for the peer
    closing: Notify,
    /// How long `close()` and teardown wait on the peer
    close_timeout: Duration,
    /// Set by close()/disconnect() so the eventual EOF is reported as ours
    close_requested: AtomicBool,
    dropped_event_count: Arc<AtomicU64>,
}

impl SharedState {
    fn end_reason(&self, observed: DisconnectReason) -> DisconnectReason {
        if self
            .close_requested
            .load(Ordering::Relaxed)
        {
            DisconnectReason::ClientRequested
        } else {
            observed
        }
    }

    /// Close our side of the transport so the peer sees EOF.
    async fn shutdown_writer(&self) {
        let mut writer = match tokio::time::timeout(self.close_timeout, self.writer.lock()).await {
            Ok(writer) => writer,
            Err(_) => {
                warn!("[SESSION] Writer busy, transport left for the peer to close");
                return;
            }
        };
        if let Err(e) = writer
            .shutdown()
            .await
        {
            debug!("[SESSION] Shutdown of write half failed: {}", e);
        }
    }
}

/// One authenticated ESL connection (Clone + Send).
///
/// Commands from any number of tasks are written under one lock and their replies are
/// matched in send order. Events go to the [`Listeners`] the session was started with.
#[derive(Clone)]
pub struct EslSession {
    mode: ConnectionMode,
    shared: Arc<SharedState>,
    state_rx: watch::Receiver<SessionState>,
    listeners: Listeners,
    channel_data: Option<Arc<EslEvent>>,
    peer_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for EslSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EslSession")
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

/// Read a single ESL message from the stream into the decoder.
///
/// Only used during the handshake; afterwards the reader task owns the read half.
async fn recv_message<S>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    read_buffer: &mut [u8],
) -> EslResult<EslMessage>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(message) = decoder.parse_message()? {
            trace!("[RECV] {}", message);
            return Ok(message);
        }
        let bytes_read = stream
            .read(read_buffer)
            .await?;
        if bytes_read == 0 {
            return Err(EslError::ConnectionClosed);
        }
        decoder.add_data(&read_buffer[..bytes_read])?;
    }
}

async fn write_command<S>(stream: &mut S, command: &EslCommand) -> EslResult<()>
where
    S: AsyncWrite + Unpin,
{
    let wire = command.to_wire_format()?;
    debug!("[SEND] {}", command);
    stream
        .write_all(wire.as_bytes())
        .await?;
    stream
        .flush()
        .await?;
    Ok(())
}

/// Inbound handshake: wait for `auth/request`, send credentials, check the reply.
async fn authenticate<S>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    read_buffer: &mut [u8],
    credentials: &Credentials,
) -> EslResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("[AUTH] Waiting for auth request from FreeSWITCH");
    let greeting = recv_message(stream, decoder, read_buffer).await?;
    if greeting.message_type() != MessageType::AuthRequest {
        return Err(EslError::handshake_failed(format!(
            "expected auth request, got {}",
            greeting
        )));
    }

    write_command(stream, &credentials.to_command()).await?;

    let reply = recv_message(stream, decoder, read_buffer).await?;
    if reply.message_type() != MessageType::CommandReply {
        return Err(EslError::handshake_failed(format!(
            "expected auth reply, got {}",
            reply
        )));
    }
    let reply_text = reply
        .reply_text()
        .ok_or_else(|| EslError::handshake_failed("auth reply carries no Reply-Text"))?;
    if !reply_text.starts_with(REPLY_OK) {
        warn!("[AUTH] Rejected: {}", reply_text);
        return Err(EslError::auth_failed(reply_text));
    }

    debug!("[AUTH] Authentication successful");
    Ok(())
}

/// Outbound handshake: send `connect` and take the channel data from the reply.
async fn connect_channel<S>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    read_buffer: &mut [u8],
) -> EslResult<EslEvent>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_command(stream, &EslCommand::Connect).await?;

    let reply = recv_message(stream, decoder, read_buffer).await?;
    if reply.message_type() != MessageType::CommandReply {
        return Err(EslError::handshake_failed(format!(
            "expected connect reply, got {}",
            reply
        )));
    }
    let event = EslEvent::from_channel_data(&reply)
        .map_err(|e| EslError::handshake_failed(format!("unusable channel data: {}", e)))?;
    if !event.is_event_type(EslEventType::ChannelData) {
        return Err(EslError::handshake_failed(format!(
            "expected CHANNEL_DATA, got {:?}",
            event.event_name()
        )));
    }
    debug!("[CONNECT] Channel data received: {}", event);
    Ok(event)
}

/// Run one handshake attempt within the configured timeout and start the session.
///
/// `connect` produces the transport; its duration counts against the timeout too.
/// Every outcome is published on `state_tx`.
pub(crate) async fn open<S, C>(
    connect: C,
    handshake: Handshake,
    listeners: Listeners,
    options: &EslConnectOptions,
    state_tx: watch::Sender<SessionState>,
) -> EslResult<EslSession>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    C: Future<Output = EslResult<(S, Option<SocketAddr>)>>,
{
    let timeout_ms = duration_ms(options.handshake_timeout);
    state_tx.send_replace(SessionState::Connecting);

    let attempt = async {
        if let Handshake::Inbound(credentials) = &handshake {
            credentials.validate()?;
        }
        let (mut stream, peer_addr) = connect.await?;
        state_tx.send_replace(SessionState::Handshaking);

        let mut decoder = FrameDecoder::new();
        let mut read_buffer = vec![0u8; SOCKET_BUF_SIZE];
        let channel_data = match &handshake {
            Handshake::Inbound(credentials) => {
                authenticate(&mut stream, &mut decoder, &mut read_buffer, credentials).await?;
                None
            }
            Handshake::Outbound => {
                Some(connect_channel(&mut stream, &mut decoder, &mut read_buffer).await?)
            }
        };
        Ok::<_, EslError>((stream, decoder, channel_data, peer_addr))
    };

    let outcome = match tokio::time::timeout(options.handshake_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => {
            warn!("[CONNECT] Handshake timed out after {}ms", timeout_ms);
            Err(EslError::Timeout { timeout_ms })
        }
    };

    let started = outcome.and_then(|parts| {
        EventDispatcher::start(listeners.clone(), options.event_queue_size)
            .map(|dispatcher| (parts, dispatcher))
    });

    match started {
        Ok(((stream, decoder, channel_data, peer_addr), dispatcher)) => {
            info!("[CONNECT] Session ready ({:?})", handshake.mode());
            Ok(EslSession::start(
                stream,
                decoder,
                handshake.mode(),
                channel_data,
                peer_addr,
                listeners,
                dispatcher,
                state_tx,
                options.handshake_timeout,
            ))
        }
        Err(e) => {
            let text = match &e {
                EslError::AuthFailed { reply_text } => reply_text.clone(),
                other => other.to_string(),
            };
            state_tx.send_replace(SessionState::Failed(text));
            Err(e)
        }
    }
}

/// Background reader task
async fn reader_loop<R>(
    mut reader: R,
    mut decoder: FrameDecoder,
    shared: Arc<SharedState>,
    state_tx: watch::Sender<SessionState>,
    dispatcher: EventDispatcher,
) where
    R: AsyncRead + Unpin,
{
    let outcome = AssertUnwindSafe(read_frames(&mut reader, &mut decoder, &shared, &dispatcher))
        .catch_unwind()
        .await;
    let reason = match outcome {
        Ok(reason) => reason,
        Err(_) => {
            error!("reader task panicked");
            DisconnectReason::IoError("reader task panicked".to_string())
        }
    };

    info!("[SESSION] Closed: {}", reason);
    state_tx.send_replace(SessionState::Closed(reason.clone()));
    shared
        .shutdown_writer()
        .await;
    shared
        .correlator
        .fail_all(&reason)
        .await;
    dispatcher
        .close(reason)
        .await;
}

async fn read_frames<R>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
    shared: &SharedState,
    dispatcher: &EventDispatcher,
) -> DisconnectReason
where
    R: AsyncRead + Unpin,
{
    let mut read_buffer = vec![0u8; SOCKET_BUF_SIZE];

    loop {
        // Drain everything already buffered before touching the socket
        loop {
            match decoder.parse_message() {
                Ok(Some(message)) => {
                    if let Some(reason) = route_frame(message, shared, dispatcher).await {
                        return reason;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("[RECV] Undecodable frame: {}", e);
                    return DisconnectReason::ProtocolError(e.to_string());
                }
            }
        }

        let read = tokio::select! {
            read = reader.read(&mut read_buffer) => read,
            _ = shared.closing.notified() => {
                info!("[RECV] Stopped waiting for the peer to hang up");
                return DisconnectReason::ClientRequested;
            }
        };
        match read {
            Ok(0) => {
                info!("[RECV] Connection closed (EOF)");
                return shared.end_reason(DisconnectReason::ConnectionClosed);
            }
            Ok(n) => {
                trace!("[RECV] Read {} bytes", n);
                if let Err(e) = decoder.add_data(&read_buffer[..n]) {
                    warn!("[RECV] Buffer error: {}", e);
                    return DisconnectReason::ProtocolError(e.to_string());
                }
            }
            Err(e) => {
                warn!("[RECV] Read error: {}", e);
                return shared.end_reason(DisconnectReason::IoError(e.to_string()));
            }
        }
    }
}

/// Route one frame; `Some` ends the session.
async fn route_frame(
    message: EslMessage,
    shared: &SharedState,
    dispatcher: &EventDispatcher,
) -> Option<DisconnectReason> {
    match message.message_type() {
        MessageType::CommandReply | MessageType::ApiResponse => {
            shared
                .correlator
                .resolve(message)
                .await;
            None
        }
        MessageType::Event => match EslEvent::from_message(&message) {
            Ok(event) => {
                trace!("[RECV] {}", event);
                dispatcher.dispatch(event);
                None
            }
            Err(e) => {
                warn!("[RECV] Cannot decode {}: {}", message, e);
                Some(DisconnectReason::ProtocolError(e.to_string()))
            }
        },
        MessageType::Disconnect => {
            if message.header(HEADER_CONTENT_DISPOSITION) == Some("linger") {
                debug!("Received disconnect notice with linger disposition, ignoring");
                return None;
            }
            info!("Received disconnect notice from server");
            Some(shared.end_reason(DisconnectReason::ServerNotice))
        }
        other => {
            trace!("[RECV] Ignoring {:?} frame", other);
            None
        }
    }
}

impl EslSession {
    /// Authenticate over an already open stream (inbound mode).
    pub async fn connect_stream<S>(
        stream: S,
        password: &str,
        listeners: Listeners,
        options: EslConnectOptions,
    ) -> EslResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        open(
            async { Ok((stream, None)) },
            Handshake::Inbound(Credentials::Password(password.to_string())),
            listeners,
            &options,
            state_tx,
        )
        .await
    }

    /// Take over a stream the switch opened to us (outbound mode).
    pub async fn accept_stream<S>(
        stream: S,
        peer_addr: Option<SocketAddr>,
        listeners: Listeners,
        options: EslConnectOptions,
    ) -> EslResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        open(
            async move { Ok((stream, peer_addr)) },
            Handshake::Outbound,
            listeners,
            &options,
            state_tx,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    fn start<S>(
        stream: S,
        decoder: FrameDecoder,
        mode: ConnectionMode,
        channel_data: Option<EslEvent>,
        peer_addr: Option<SocketAddr>,
        listeners: Listeners,
        dispatcher: EventDispatcher,
        state_tx: watch::Sender<SessionState>,
        close_timeout: Duration,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shared = Arc::new(SharedState {
            correlator: ReplyCorrelator::new(),
            writer: Mutex::new(Box::new(write_half)),
            closing: Notify::new(),
            close_timeout,
            close_requested: AtomicBool::new(false),
            dropped_event_count: dispatcher.dropped_counter(),
        });

        let state_rx = state_tx.subscribe();
        state_tx.send_replace(SessionState::Ready);
        tokio::spawn(reader_loop(
            read_half,
            decoder,
            shared.clone(),
            state_tx,
            dispatcher,
        ));

        EslSession {
            mode,
            shared,
            state_rx,
            listeners,
            channel_data: channel_data.map(Arc::new),
            peer_addr,
        }
    }

    /// Send a command and wait for its reply.
    ///
    /// The slot for the reply is queued and the bytes written under the writer lock, so
    /// concurrent callers get their replies in the order their commands hit the wire.
    /// There is no reply timeout; wrap the call in `tokio::time::timeout` if needed.
    pub async fn send_command(&self, command: EslCommand) -> EslResult<EslResponse> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Closed(_) => return Err(EslError::ConnectionClosed),
            _ => return Err(EslError::NotConnected),
        }

        let wire = command.to_wire_format()?;
        let id = CommandId::next();
        let command_text = command.to_string();
        debug!("[SEND] {} {}", id, command_text);

        let reply = {
            let mut writer = self
                .shared
                .writer
                .lock()
                .await;
            let reply = self
                .shared
                .correlator
                .register(id)
                .await?;
            let written = async {
                writer
                    .write_all(wire.as_bytes())
                    .await?;
                writer
                    .flush()
                    .await
            }
            .await;
            if let Err(e) = written {
                self.shared
                    .correlator
                    .cancel(id)
                    .await;
                return Err(EslError::Io(e));
            }
            reply
        };

        let message = reply
            .await
            .map_err(|_| EslError::ConnectionClosed)??;
        let response = EslResponse::new(command_text, id, message);
        debug!(
            "[REPLY] {} status={:?}",
            response.command_id(),
            response.reply_status()
        );
        Ok(response)
    }

    /// Send a command and require a successful response, discarding the body.
    async fn send_command_ok(&self, command: EslCommand) -> EslResult<()> {
        self.send_command(command)
            .await?
            .into_result()
            .map(|_| ())
    }

    /// Execute an API command and return its `api/response`.
    ///
    /// The switch runs `api` inline on the socket: no events are delivered until it
    /// returns. Use [`bg_api`](Self::bg_api) for long-running commands.
    ///
    /// ```rust,no_run
    /// # async fn example(session: &freeswitch_esl_engine::EslSession) -> Result<(), freeswitch_esl_engine::EslError> {
    /// let resp = session.api("status").await?;
    /// println!("{}", resp.body());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn api(&self, command: &str) -> EslResult<EslResponse> {
        self.send_command(EslCommand::Api {
            command: command.to_string(),
        })
        .await
    }

    /// Start a background job and return its `Job-UUID`.
    ///
    /// The result arrives later as a `BACKGROUND_JOB` event carrying the same UUID,
    /// delivered through [`EventListener::on_background_job`].
    pub async fn bg_api(&self, command: &str) -> EslResult<Uuid> {
        self.send_command(EslCommand::BgApi {
            command: command.to_string(),
        })
        .await?
        .into_result()?
        .job_uuid()
    }

    /// `event <format> <names>` with a raw, space separated list of names.
    ///
    /// Fails with [`EslError::UnsupportedEventFormat`] for anything but plain.
    pub async fn event(&self, format: EventFormat, events: &str) -> EslResult<()> {
        require_plain(format)?;
        self.send_command_ok(EslCommand::Event {
            format,
            events: events.to_string(),
        })
        .await
    }

    /// Subscribe to the given event types.
    pub async fn subscribe_events(
        &self,
        format: EventFormat,
        events: &[EslEventType],
    ) -> EslResult<()> {
        self.event(format, &event_types_to_string(events))
            .await
    }

    /// Unsubscribe from the given event types.
    pub async fn nixevent(&self, events: &[EslEventType]) -> EslResult<()> {
        self.send_command_ok(EslCommand::NixEvent {
            events: event_types_to_string(events),
        })
        .await
    }

    /// Drop every event subscription.
    pub async fn noevents(&self) -> EslResult<()> {
        self.send_command_ok(EslCommand::NoEvents)
            .await
    }

    /// Only deliver events whose `header` equals `value`.
    pub async fn filter(&self, header: &str, value: &str) -> EslResult<()> {
        self.send_command_ok(EslCommand::Filter {
            header: header.to_string(),
            value: value.to_string(),
        })
        .await
    }

    /// Remove a filter; without a value every filter on `header` goes.
    pub async fn filter_delete(&self, header: &str, value: Option<&str>) -> EslResult<()> {
        self.send_command_ok(EslCommand::FilterDelete {
            header: header.to_string(),
            value: value.map(str::to_string),
        })
        .await
    }

    /// Execute a dialplan application through `sendmsg`.
    pub async fn execute(&self, msg: impl Into<SendMsg>) -> EslResult<EslResponse> {
        self.send_command(EslCommand::SendMsg(msg.into()))
            .await?
            .into_result()
    }

    /// Hang up a channel; `None` targets the dial-in socket's own channel.
    pub async fn hangup(&self, uuid: Option<&str>, cause: HangupCause) -> EslResult<()> {
        self.send_command_ok(EslCommand::Hangup {
            uuid: uuid.map(str::to_string),
            cause,
        })
        .await
    }

    /// Enable log forwarding at the given level.
    ///
    /// Log lines arrive as `log/data` frames, which the session does not surface.
    pub async fn log(&self, level: LogLevel) -> EslResult<()> {
        self.send_command_ok(EslCommand::Log { level })
            .await
    }

    /// Disable log forwarding.
    pub async fn nolog(&self) -> EslResult<()> {
        self.send_command_ok(EslCommand::NoLog)
            .await
    }

    /// Events of this socket's own channel only (outbound mode).
    pub async fn myevents(&self, format: EventFormat) -> EslResult<()> {
        require_plain(format)?;
        self.send_command_ok(EslCommand::MyEvents { format, uuid: None })
            .await
    }

    /// Events of one channel only (inbound mode).
    pub async fn myevents_uuid(&self, uuid: &str, format: EventFormat) -> EslResult<()> {
        require_plain(format)?;
        self.send_command_ok(EslCommand::MyEvents {
            format,
            uuid: Some(uuid.to_string()),
        })
        .await
    }

    /// Keep the socket open after hangup to receive the remaining events.
    pub async fn linger(&self, timeout: Option<u32>) -> EslResult<()> {
        self.send_command_ok(EslCommand::Linger { timeout })
            .await
    }

    pub async fn nolinger(&self) -> EslResult<()> {
        self.send_command_ok(EslCommand::NoLinger)
            .await
    }

    /// Continue the dialplan when the socket closes (outbound mode).
    pub async fn resume(&self) -> EslResult<()> {
        self.send_command_ok(EslCommand::Resume)
            .await
    }

    /// Forward events of running applications (e.g. DTMF while playing) to the socket.
    pub async fn divert_events(&self, on: bool) -> EslResult<()> {
        self.send_command_ok(EslCommand::DivertEvents { on })
            .await
    }

    /// Read a channel variable (outbound mode).
    ///
    /// `getvar` answers with the bare value in `Reply-Text` and no `+OK`/`-ERR`
    /// prefix; an unset variable yields an empty string.
    pub async fn getvar(&self, name: &str) -> EslResult<String> {
        let response = self
            .send_command(EslCommand::GetVar {
                name: name.to_string(),
            })
            .await?;
        Ok(response
            .reply_text()
            .unwrap_or("")
            .to_string())
    }

    /// Send `exit` and wait until the switch has closed the connection.
    ///
    /// Once `exit` is answered our side of the transport is shut down. A peer that
    /// still keeps the socket open is given the handshake timeout, after which the
    /// session ends anyway.
    pub async fn close(&self) -> EslResult<()> {
        if self
            .state()
            .is_terminal()
        {
            return Ok(());
        }
        info!("Client requested close");
        self.shared
            .close_requested
            .store(true, Ordering::Relaxed);
        match self
            .send_command(EslCommand::Exit)
            .await
        {
            // the switch may hang up before its reply is read
            Ok(_) | Err(EslError::ConnectionClosed) => {}
            Err(e) => return Err(e),
        }
        self.shared
            .shutdown_writer()
            .await;
        if tokio::time::timeout(self.shared.close_timeout, self.wait_closed())
            .await
            .is_err()
        {
            warn!(
                "Peer kept the connection open {:?} after exit, dropping it",
                self.shared.close_timeout
            );
            self.shared
                .closing
                .notify_one();
            self.wait_closed()
                .await;
        }
        Ok(())
    }

    /// Shut the write half down without a goodbye.
    pub async fn disconnect(&self) -> EslResult<()> {
        info!("Client requested disconnect");
        self.shared
            .close_requested
            .store(true, Ordering::Relaxed);
        let mut writer = self
            .shared
            .writer
            .lock()
            .await;
        writer
            .shutdown()
            .await
            .map_err(EslError::Io)?;
        Ok(())
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_rx
            .borrow()
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state_rx
            .borrow()
            .is_ready()
    }

    /// Resolve once the session has ended, with the reason.
    pub async fn wait_closed(&self) -> DisconnectReason {
        let mut state_rx = self
            .state_rx
            .clone();
        let state = match state_rx
            .wait_for(SessionState::is_terminal)
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => return DisconnectReason::ConnectionClosed,
        };
        match state {
            SessionState::Closed(reason) => reason,
            _ => DisconnectReason::ConnectionClosed,
        }
    }

    /// A reply once arrived with no command waiting for it.
    pub fn is_desynced(&self) -> bool {
        self.shared
            .correlator
            .is_desynced()
    }

    /// Events discarded because a listener lane was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared
            .dropped_event_count
            .load(Ordering::Relaxed)
    }

    /// Register a listener for events dispatched from now on.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .add(listener);
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// `CHANNEL_DATA` received in answer to `connect` (outbound mode only).
    pub fn channel_data(&self) -> Option<&EslEvent> {
        self.channel_data
            .as_deref()
    }

    /// Remote address when the transport is TCP.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}
