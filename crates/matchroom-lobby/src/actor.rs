//! Lobby actor: the one task that owns the [`LobbyService`].
//!
//! Connection handlers never touch the registries. They send commands
//! through a [`LobbyHandle`] and receive events on their own [`Outbox`].
//! Commands are applied one at a time in arrival order, so a disconnect
//! racing a request from the same connection always sees either none or
//! all of that request's effects.

use std::collections::HashMap;

use matchroom_protocol::{MatchEvent, MatchRequest, MatchSummary, PlayerInfo};
use matchroom_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::launch::Spawner;
use crate::service::{LobbyService, Outbound};
use crate::{LobbyError, PlayerState};

/// Channel the lobby pushes a connection's events into.
pub type Outbox = mpsc::UnboundedSender<MatchEvent>;

/// Commands sent to the lobby actor through its channel.
pub(crate) enum LobbyCommand {
    /// Register a connection and the outbox its events go to.
    Ready {
        conn: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<PlayerInfo, LobbyError>>,
    },

    /// Apply a lobby request. Results arrive on the outbox.
    Request {
        conn: ConnectionId,
        request: MatchRequest,
    },

    /// Forget a connection.
    Disconnect { conn: ConnectionId },

    ListMatches {
        reply: oneshot::Sender<Vec<MatchSummary>>,
    },

    State {
        conn: ConnectionId,
        reply: oneshot::Sender<Option<PlayerState>>,
    },

    /// Clear the registries and stop.
    Shutdown,
}

/// Handle to the running lobby actor.
///
/// Cheap to clone: every connection handler holds one.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    /// Registers `conn` as ready. Its events will be pushed into `outbox`.
    pub async fn ready(
        &self,
        conn: ConnectionId,
        outbox: Outbox,
    ) -> Result<PlayerInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Ready {
            conn,
            outbox,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)?
    }

    /// Queues a request from `conn` (fire-and-forget).
    pub async fn request(
        &self,
        conn: ConnectionId,
        request: MatchRequest,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Request { conn, request }).await
    }

    /// Tells the lobby `conn` is gone.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Disconnect { conn }).await
    }

    pub async fn list_matches(&self) -> Result<Vec<MatchSummary>, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::ListMatches { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    pub async fn state_of(&self, conn: ConnectionId) -> Result<Option<PlayerState>, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::State {
            conn,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Tells the lobby to clear its state and stop.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Shutdown).await
    }

    async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct LobbyActor<S: Spawner> {
    service: LobbyService<S>,
    outboxes: HashMap<ConnectionId, Outbox>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl<S: Spawner> LobbyActor<S> {
    async fn run(mut self) {
        tracing::info!("lobby actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LobbyCommand::Ready {
                    conn,
                    outbox,
                    reply,
                } => {
                    let result = match self.service.on_ready(conn) {
                        Ok((info, out)) => {
                            self.outboxes.insert(conn, outbox);
                            self.deliver(out);
                            Ok(info)
                        }
                        Err(err) => Err(err),
                    };
                    let _ = reply.send(result);
                }
                LobbyCommand::Request { conn, request } => {
                    let out = self.service.handle(conn, request);
                    self.deliver(out);
                }
                LobbyCommand::Disconnect { conn } => {
                    self.outboxes.remove(&conn);
                    let out = self.service.on_disconnect(conn);
                    self.deliver(out);
                }
                LobbyCommand::ListMatches { reply } => {
                    let _ = reply.send(self.service.matches().open_matches());
                }
                LobbyCommand::State { conn, reply } => {
                    let _ = reply.send(self.service.state_of(&conn));
                }
                LobbyCommand::Shutdown => {
                    tracing::info!("lobby shutting down");
                    self.service.reset();
                    self.outboxes.clear();
                    break;
                }
            }
        }

        tracing::info!("lobby actor stopped");
    }

    /// Pushes events to their connections. A closed outbox means the
    /// handler is already gone; its disconnect is on the way.
    fn deliver(&self, out: Vec<Outbound>) {
        for (conn, event) in out {
            if let Some(outbox) = self.outboxes.get(&conn) {
                let _ = outbox.send(event);
            }
        }
    }
}

/// Spawns the lobby actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub fn spawn_lobby<S: Spawner>(service: LobbyService<S>, channel_size: usize) -> LobbyHandle {
    let (sender, receiver) = mpsc::channel(channel_size);

    let actor = LobbyActor {
        service,
        outboxes: HashMap::new(),
        receiver,
    };
    tokio::spawn(actor.run());

    LobbyHandle { sender }
}
