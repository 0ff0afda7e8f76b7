//! Listener for dial-in (outbound mode) connections from the switch

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tracing::info;

use crate::{
    connection::{open, EslConnectOptions, EslSession, Handshake, SessionState},
    dispatch::{EventListener, Listeners},
    error::{EslError, EslResult},
};

/// Accepts the connections the `socket` dialplan application makes.
///
/// Each accepted session gets its own copy of the listeners registered so far, so
/// [`EslSession::subscribe`] on one call does not leak into another.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), freeswitch_esl_engine::EslError> {
/// use freeswitch_esl_engine::{AppCommand, EslServer};
///
/// let server = EslServer::bind("0.0.0.0:8040").await?;
/// loop {
///     let session = server.accept().await?;
///     tokio::spawn(async move {
///         let _ = session.execute(AppCommand::Answer).await;
///         let _ = session.execute(AppCommand::Park).await;
///     });
/// }
/// # }
/// ```
pub struct EslServer {
    listener: TcpListener,
    listeners: Listeners,
    options: EslConnectOptions,
}

impl std::fmt::Debug for EslServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EslServer")
            .field("local_addr", &self.local_addr().ok())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl EslServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> EslResult<Self> {
        Self::bind_with_options(addr, EslConnectOptions::default()).await
    }

    pub async fn bind_with_options(
        addr: impl ToSocketAddrs,
        options: EslConnectOptions,
    ) -> EslResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(EslError::Io)?;
        info!(
            "Listening for outbound connections on {}",
            listener.local_addr()?
        );
        Ok(Self {
            listener,
            listeners: Listeners::new(),
            options,
        })
    }

    pub fn local_addr(&self) -> EslResult<SocketAddr> {
        Ok(self
            .listener
            .local_addr()?)
    }

    /// Register a listener for sessions accepted from now on.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .add(listener);
    }

    /// Wait for the switch to connect, send `connect` and return the ready session.
    ///
    /// The handshake timeout starts once the TCP connection is accepted.
    pub async fn accept(&self) -> EslResult<EslSession> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(EslError::Io)?;
        info!("Accepted outbound connection from {}", addr);
        stream.set_nodelay(true)?;

        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        open(
            async move { Ok((stream, Some(addr))) },
            Handshake::Outbound,
            self.listeners
                .fork(),
            &self.options,
            state_tx,
        )
        .await
    }
}
