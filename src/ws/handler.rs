//! WebSocket upgrade handler and per-connection session

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchCommand, MatchHandle, MatchOptions};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

const MAX_NICKNAME_CHARS: usize = 32;

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Default display name for a connection that never set one
fn default_nickname(player_id: Uuid) -> String {
    let id = player_id.simple().to_string();
    format!("Player{}", &id[..4])
}

/// Clean up a requested nickname, None if nothing usable remains
fn sanitize_nickname(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(MAX_NICKNAME_CHARS).collect();
    (!name.is_empty()).then_some(name)
}

/// Membership of one room: the match handle plus the task relaying its snapshots
struct RoomLink {
    handle: MatchHandle,
    forwarder: JoinHandle<()>,
}

/// State of one connected client
struct Session {
    player_id: Uuid,
    nickname: String,
    room: Option<RoomLink>,
    out_tx: mpsc::Sender<ServerMsg>,
    state: AppState,
}

impl Session {
    async fn send(&self, msg: ServerMsg) {
        if self.out_tx.send(msg).await.is_err() {
            debug!(player_id = %self.player_id, "Outbound channel closed");
        }
    }

    async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::SetNickname { nickname } => {
                self.nickname =
                    sanitize_nickname(&nickname).unwrap_or_else(|| default_nickname(self.player_id));
            }
            ClientMsg::CreateRoom { options } => {
                let options = MatchOptions::from(options);
                match self
                    .state
                    .match_registry
                    .create(options, self.state.config.tick_rate)
                {
                    Ok(handle) => self.enter(handle, true).await,
                    Err(e) => {
                        warn!(player_id = %self.player_id, error = %e, "Room creation refused");
                        self.send(ServerMsg::error("room_limit", e.to_string())).await;
                    }
                }
            }
            ClientMsg::JoinRoom { room_id } => match self.state.match_registry.get(&room_id) {
                Some(handle) => self.enter(handle, false).await,
                None => {
                    self.send(ServerMsg::error("room_not_found", "Room not found"))
                        .await
                }
            },
            ClientMsg::Input(command) => {
                let player_id = self.player_id;
                self.forward(MatchCommand::Input { player_id, command }).await;
            }
            ClientMsg::ResetGame => self.forward(MatchCommand::Reset).await,
            ClientMsg::LeaveRoom => self.leave().await,
            ClientMsg::Ping { t } => self.send(ServerMsg::Pong { t }).await,
        }
    }

    /// Join a room, leaving the current one first
    async fn enter(&mut self, handle: MatchHandle, is_host: bool) {
        self.leave().await;

        let join = MatchCommand::Join {
            player_id: self.player_id,
            display_name: self.nickname.clone(),
        };
        if let Err(e) = handle.send(join).await {
            warn!(player_id = %self.player_id, match_id = %handle.id, error = %e, "Join failed");
            self.send(ServerMsg::error("room_closed", e.to_string())).await;
            return;
        }

        let forwarder = spawn_forwarder(self.player_id, handle.subscribe(), self.out_tx.clone());
        self.send(ServerMsg::RoomJoined {
            room_id: handle.id,
            is_host,
        })
        .await;

        info!(player_id = %self.player_id, match_id = %handle.id, is_host, "Joined room");
        self.room = Some(RoomLink { handle, forwarder });
    }

    async fn leave(&mut self) {
        let Some(link) = self.room.take() else {
            return;
        };
        link.forwarder.abort();
        let leave = MatchCommand::Leave {
            player_id: self.player_id,
        };
        if let Err(e) = link.handle.send(leave).await {
            debug!(player_id = %self.player_id, match_id = %link.handle.id, error = %e, "Room closed before leave");
            return;
        }
        debug!(player_id = %self.player_id, match_id = %link.handle.id, "Left room");
    }

    /// Send a command to the current room, ignored outside a room
    async fn forward(&mut self, command: MatchCommand) {
        let Some(link) = &self.room else {
            return;
        };
        if link.handle.send(command).await.is_err() {
            debug!(player_id = %self.player_id, "Room closed under session");
            if let Some(link) = self.room.take() {
                link.forwarder.abort();
            }
        }
    }
}

/// Relay a room's broadcast snapshots into the connection's outbound queue
fn spawn_forwarder(
    player_id: Uuid,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    })
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer_handle = spawn_writer(player_id, ws_sink, out_rx);

    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);
    let mut session = Session {
        player_id,
        nickname: default_nickname(player_id),
        room: None,
        out_tx,
        state,
    };

    run_session(&mut session, ws_stream, &rate_limiter).await;

    // Cleanup on disconnect
    session.leave().await;
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Writer task: outbound queue -> WebSocket
fn spawn_writer(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    })
}

/// Reader loop: WebSocket -> session
async fn run_session(
    session: &mut Session,
    mut ws_stream: SplitStream<WebSocket>,
    rate_limiter: &PlayerRateLimiter,
) {
    let player_id = session.player_id;

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => session.handle(client_msg).await,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        session
                            .send(ServerMsg::error("bad_message", e.to_string()))
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_nickname_uses_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        assert_eq!(default_nickname(id), "Playera1b2");
    }

    #[test]
    fn nicknames_are_trimmed_and_capped() {
        assert_eq!(sanitize_nickname("  ace "), Some("ace".to_string()));
        assert_eq!(sanitize_nickname("   "), None);
        let long = "x".repeat(100);
        assert_eq!(
            sanitize_nickname(&long).map(|n| n.chars().count()),
            Some(MAX_NICKNAME_CHARS)
        );
    }
}
