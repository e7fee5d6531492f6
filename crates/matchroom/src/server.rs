//! `MatchroomServer` builder and accept loop.
//!
//! Ties the layers together: a WebSocket listener, the JSON codec, and one
//! lobby actor shared by every connection task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use matchroom_lobby::{LobbyConfig, LobbyHandle, LobbyService, spawn_lobby};
use matchroom_protocol::{Codec, JsonCodec};
use matchroom_transport::{Transport, WebSocketTransport};

use crate::MatchroomError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Command queue size of the lobby actor.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) lobby: LobbyHandle,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Matchroom server.
pub struct MatchroomServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    handshake_timeout: Duration,
    idle_timeout: Duration,
}

impl MatchroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            lobby_config: LobbyConfig::default(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the lobby configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// How long a new connection may take to send its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long a ready connection may stay silent before it is dropped.
    /// Clients keep themselves alive with heartbeats.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and starts the lobby actor.
    ///
    /// # Errors
    /// Fails if the lobby config is invalid or the address cannot be bound.
    pub async fn build(self) -> Result<MatchroomServer<JsonCodec>, MatchroomError> {
        let service = LobbyService::new(self.lobby_config)?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let lobby = spawn_lobby(service, DEFAULT_CHANNEL_SIZE);

        let state = Arc::new(ServerState {
            lobby,
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(MatchroomServer { transport, state })
    }
}

impl Default for MatchroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Matchroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MatchroomServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl MatchroomServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> MatchroomServerBuilder {
        MatchroomServerBuilder::new()
    }
}

impl<C: Codec> MatchroomServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the lobby actor, for inspecting lobby state.
    pub fn lobby(&self) -> LobbyHandle {
        self.state.lobby.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), MatchroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then clears the
    /// lobby.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), MatchroomError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Matchroom server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("Matchroom server stopping");
        if let Err(e) = self.state.lobby.shutdown().await {
            tracing::warn!(error = %e, "lobby already stopped");
        }
        Ok(())
    }
}
