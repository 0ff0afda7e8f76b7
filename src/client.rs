//! Long-lived dial-out client

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    command::{EslResponse, LogLevel, SendMsg},
    connection::{open, Credentials, EslConnectOptions, EslSession, Handshake, SessionState},
    dispatch::{EventListener, Listeners},
    error::{EslError, EslResult},
    event::{EslEventType, EventFormat},
};

/// Establish a TCP connection to the switch.
async fn tcp_connect(host: &str, port: u16) -> EslResult<(TcpStream, Option<SocketAddr>)> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| {
            warn!("[CONNECT] TCP connect failed: {}", e);
            EslError::Io(e)
        })?;
    stream.set_nodelay(true)?;
    debug!("[CONNECT] TCP connection established");
    let peer_addr = stream
        .peer_addr()
        .ok();
    Ok((stream, peer_addr))
}

struct ClientInner {
    listeners: Listeners,
    options: EslConnectOptions,
    /// Serialises connect attempts
    connecting: Mutex<()>,
    session: RwLock<Option<EslSession>>,
    state_rx: RwLock<watch::Receiver<SessionState>>,
}

/// Client for the switch's event socket (inbound mode).
///
/// Owns the listener registry across reconnects: listeners added once receive events
/// from every session the client opens. Clone + Send.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), freeswitch_esl_engine::EslError> {
/// use std::time::Duration;
/// use freeswitch_esl_engine::{EslClient, EslEventType, EventFormat};
///
/// let client = EslClient::new();
/// client.connect("127.0.0.1", 8021, "ClueCon", Duration::from_secs(5)).await?;
/// client.event(EventFormat::Plain, &[EslEventType::ChannelAnswer]).await?;
/// let status = client.api("status").await?;
/// println!("{}", status.body());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EslClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for EslClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EslClient")
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners)
            .finish()
    }
}

impl Default for EslClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EslClient {
    pub fn new() -> Self {
        Self::with_options(EslConnectOptions::default())
    }

    /// `options.handshake_timeout` is overridden by the `timeout` passed to `connect`.
    pub fn with_options(options: EslConnectOptions) -> Self {
        let (_, state_rx) = watch::channel(SessionState::Disconnected);
        EslClient {
            inner: Arc::new(ClientInner {
                listeners: Listeners::new(),
                options,
                connecting: Mutex::new(()),
                session: RwLock::new(None),
                state_rx: RwLock::new(state_rx),
            }),
        }
    }

    /// Register a listener for this and every later session.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.inner
            .listeners
            .add(listener);
    }

    /// Connect with password authentication.
    ///
    /// `timeout` bounds TCP connect and authentication together. A session that is
    /// still ready is closed with `exit` first.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        password: &str,
        timeout: Duration,
    ) -> EslResult<()> {
        let credentials = Credentials::Password(password.to_string());
        self.connect_inner(host, port, credentials, timeout)
            .await
    }

    /// Connect with user authentication
    ///
    /// The user must be in the format `user@domain` (e.g., `admin@default`).
    pub async fn connect_with_user(
        &self,
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> EslResult<()> {
        let credentials = Credentials::User {
            user: user.to_string(),
            password: password.to_string(),
        };
        self.connect_inner(host, port, credentials, timeout)
            .await
    }

    /// Authenticate over a stream the caller already opened (TLS tunnels, tests).
    pub async fn connect_stream<S>(&self, stream: S, password: &str) -> EslResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let credentials = Credentials::Password(password.to_string());
        let timeout = self
            .inner
            .options
            .handshake_timeout;
        self.establish(async { Ok((stream, None)) }, credentials, timeout)
            .await
    }

    async fn connect_inner(
        &self,
        host: &str,
        port: u16,
        credentials: Credentials,
        timeout: Duration,
    ) -> EslResult<()> {
        info!("Connecting to FreeSWITCH at {}:{}", host, port);
        self.establish(tcp_connect(host, port), credentials, timeout)
            .await
    }

    async fn establish<S, C>(
        &self,
        connect: C,
        credentials: Credentials,
        timeout: Duration,
    ) -> EslResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        C: std::future::Future<Output = EslResult<(S, Option<SocketAddr>)>>,
    {
        let _connecting = self
            .inner
            .connecting
            .lock()
            .await;

        let previous = self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            if previous.is_ready() {
                info!("Closing the current session before reconnecting");
                if let Err(e) = previous
                    .close()
                    .await
                {
                    warn!("Previous session did not close cleanly: {}", e);
                }
            }
        }

        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        *self
            .inner
            .state_rx
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state_rx;

        let options = EslConnectOptions {
            handshake_timeout: timeout,
            ..self
                .inner
                .options
                .clone()
        };
        let session = open(
            connect,
            Handshake::Inbound(credentials),
            self.inner
                .listeners
                .clone(),
            &options,
            state_tx,
        )
        .await?;

        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    /// Current session, if one was established.
    pub fn session(&self) -> Option<EslSession> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_session(&self) -> EslResult<EslSession> {
        self.session()
            .ok_or(EslError::NotConnected)
    }

    /// State of the latest connection attempt.
    pub fn state(&self) -> SessionState {
        self.inner
            .state_rx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .borrow()
            .clone()
    }

    /// Whether commands can be sent right now.
    pub fn can_send(&self) -> bool {
        self.state()
            .is_ready()
    }

    /// Synchronous API call; see [`EslSession::api`].
    pub async fn api(&self, command: &str) -> EslResult<EslResponse> {
        self.current_session()?
            .api(command)
            .await
    }

    /// Background API call returning the job id; see [`EslSession::bg_api`].
    pub async fn bg_api(&self, command: &str) -> EslResult<Uuid> {
        self.current_session()?
            .bg_api(command)
            .await
    }

    /// Subscribe to event types.
    pub async fn event(&self, format: EventFormat, events: &[EslEventType]) -> EslResult<()> {
        self.current_session()?
            .subscribe_events(format, events)
            .await
    }

    pub async fn filter(&self, header: &str, value: &str) -> EslResult<()> {
        self.current_session()?
            .filter(header, value)
            .await
    }

    pub async fn filter_delete(&self, header: &str, value: Option<&str>) -> EslResult<()> {
        self.current_session()?
            .filter_delete(header, value)
            .await
    }

    /// Run a dialplan application on a channel; `msg` should name the leg.
    pub async fn execute(&self, msg: impl Into<SendMsg>) -> EslResult<EslResponse> {
        self.current_session()?
            .execute(msg)
            .await
    }

    pub async fn noevents(&self) -> EslResult<()> {
        self.current_session()?
            .noevents()
            .await
    }

    pub async fn nolog(&self) -> EslResult<()> {
        self.current_session()?
            .nolog()
            .await
    }

    pub async fn set_log_level(&self, level: LogLevel) -> EslResult<()> {
        self.current_session()?
            .log(level)
            .await
    }

    /// Close the current session with `exit`. No-op when not connected.
    pub async fn close(&self) -> EslResult<()> {
        match self.session() {
            Some(session) => {
                session
                    .close()
                    .await
            }
            None => Ok(()),
        }
    }
}
