//! Per-connection handler: handshake, ready, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Register with the lobby → get PlayerIndex and an outbox
//!   3. Send HandshakeAck → connection is ready
//!   4. Loop: forward requests to the lobby, push lobby events out

use std::sync::Arc;
use std::time::Instant;

use matchroom_lobby::LobbyHandle;
use matchroom_protocol::{Codec, Envelope, MatchEvent, Payload, ProtocolError, SystemMessage};
use matchroom_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::MatchroomError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that removes the connection from the lobby when the
/// handler exits, however it exits. `Drop` is synchronous, so the
/// disconnect is sent from a spawned task.
struct LobbyGuard {
    conn_id: ConnectionId,
    lobby: LobbyHandle,
}

impl Drop for LobbyGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let lobby = self.lobby.clone();
        tokio::spawn(async move {
            let _ = lobby.disconnect(conn_id).await;
        });
    }
}

/// Sequence numbers and timestamps for frames sent on one connection.
struct Outgoing {
    seq: u64,
    start: Instant,
}

impl Outgoing {
    fn new() -> Self {
        Self {
            seq: 0,
            start: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn envelope(&mut self, payload: Payload) -> Envelope {
        let envelope = Envelope::new(self.seq, self.elapsed_ms(), payload);
        self.seq += 1;
        envelope
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), MatchroomError> {
    let conn_id = conn.id();
    let mut out = Outgoing::new();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &state, &mut out).await?;

    // --- Step 2: Ready ---
    // The guard goes up right after the lobby accepts the connection so
    // every exit path below reports the disconnect.
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    let info = match state.lobby.ready(conn_id, outbox_tx).await {
        Ok(info) => info,
        Err(err) => {
            tracing::warn!(%conn_id, error = %err, "lobby refused connection");
            send_error(&conn, &state.codec, &mut out, err.code(), &err.to_string()).await?;
            return Err(err.into());
        }
    };
    let _guard = LobbyGuard {
        conn_id,
        lobby: state.lobby.clone(),
    };
    tracing::info!(%conn_id, player_index = %info.player_index, "player ready");

    let server_time = out.elapsed_ms();
    let ack = out.envelope(Payload::System(SystemMessage::HandshakeAck {
        player_index: info.player_index,
        server_time,
    }));
    send(&conn, &state.codec, &ack).await?;

    // --- Step 3: Message loop ---
    // Only inbound frames move the idle deadline; outbound events do not.
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + state.idle_timeout);

                let should_close = handle_frame(&conn, &state, &mut out, &data).await?;
                if should_close {
                    break;
                }
            }
            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
            event = outbox_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!(%conn_id, "lobby closed the outbox");
                    break;
                };
                push_event(&conn, &state.codec, &mut out, event).await?;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → lobby disconnect fires.
    Ok(())
}

/// Receives the first frame and checks it is a supported Handshake.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    out: &mut Outgoing,
) -> Result<(), MatchroomError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(MatchroomError::Transport(e)),
        Err(_) => {
            send_error(conn, &state.codec, out, 400, "handshake timed out").await?;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let version = match state.codec.decode::<Envelope>(&data) {
        Ok(Envelope {
            payload: Payload::System(SystemMessage::Handshake { version }),
            ..
        }) => version,
        _ => {
            send_error(conn, &state.codec, out, 400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            out,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    Ok(())
}

/// Handles one inbound frame. Returns `true` if the connection should close.
async fn handle_frame<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    out: &mut Outgoing,
    data: &[u8],
) -> Result<bool, MatchroomError> {
    let conn_id = conn.id();

    let envelope: Envelope = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
            send_error(conn, &state.codec, out, 400, &e.to_string()).await?;
            return Ok(false);
        }
    };

    match envelope.payload {
        Payload::Request(request) => {
            tracing::debug!(%conn_id, request = request.kind(), "forwarding request");
            state.lobby.request(conn_id, request).await?;
        }

        Payload::System(SystemMessage::Heartbeat { client_time }) => {
            let server_time = out.elapsed_ms();
            let ack = out.envelope(Payload::System(SystemMessage::HeartbeatAck {
                client_time,
                server_time,
            }));
            send(conn, &state.codec, &ack).await?;
        }

        Payload::System(SystemMessage::Disconnect { reason }) => {
            tracing::info!(%conn_id, %reason, "client disconnected");
            return Ok(true);
        }

        Payload::System(_) => {
            tracing::debug!(%conn_id, "ignoring unexpected system message");
        }

        Payload::Event(_) => {
            send_error(conn, &state.codec, out, 400, "events are server-to-client only").await?;
        }
    }

    Ok(false)
}

/// Wraps a lobby event in an envelope and sends it.
async fn push_event<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    out: &mut Outgoing,
    event: MatchEvent,
) -> Result<(), MatchroomError> {
    let envelope = out.envelope(Payload::Event(event));
    send(conn, codec, &envelope).await
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    out: &mut Outgoing,
    code: u16,
    message: &str,
) -> Result<(), MatchroomError> {
    let envelope = out.envelope(Payload::System(SystemMessage::Error {
        code,
        message: message.to_string(),
    }));
    send(conn, codec, &envelope).await
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    envelope: &Envelope,
) -> Result<(), MatchroomError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}
