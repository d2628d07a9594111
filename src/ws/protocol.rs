//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{GameMode, InputCommand, MatchOptions, MatchSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Name shown to other players, applies to the next join
    SetNickname { nickname: String },

    /// Create a new room and join it as host
    CreateRoom {
        #[serde(default)]
        options: MatchOptionsRequest,
    },

    JoinRoom { room_id: Uuid },

    /// Partial input update for the current room
    Input(InputCommand),

    /// Start a new round in the current room
    ResetGame,

    LeaveRoom,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of room join
    RoomJoined { room_id: Uuid, is_host: bool },

    /// Full match state, sent every tick
    GameState { snapshot: Arc<MatchSnapshot> },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Match options as sent by clients, validated into [`MatchOptions`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchOptionsRequest {
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(default)]
    pub friendly_fire: bool,
    pub kill_limit: Option<f64>,
    pub gold_win_limit: Option<f64>,
    /// Seconds
    pub time_limit: Option<f64>,
}

impl From<MatchOptionsRequest> for MatchOptions {
    fn from(req: MatchOptionsRequest) -> Self {
        MatchOptions::sanitized(
            req.game_mode,
            req.friendly_fire,
            req.kill_limit,
            req.gold_win_limit,
            req.time_limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::InputAction;

    #[test]
    fn parses_create_room_with_defaults() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"create_room"}"#).unwrap();
        let ClientMsg::CreateRoom { options } = msg else {
            panic!("wrong variant");
        };
        let options = MatchOptions::from(options);
        assert_eq!(options.mode, GameMode::Goldrush);
        assert_eq!(options.time_limit, None);
    }

    #[test]
    fn parses_create_room_options() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"create_room","options":{"game_mode":"deathmatch","friendly_fire":true,"kill_limit":5,"time_limit":0}}"#,
        )
        .unwrap();
        let ClientMsg::CreateRoom { options } = msg else {
            panic!("wrong variant");
        };
        let options = MatchOptions::from(options);
        assert_eq!(options.mode, GameMode::Deathmatch);
        assert!(options.friendly_fire);
        assert_eq!(options.kill_limit, Some(5));
        assert_eq!(options.time_limit, None);
    }

    #[test]
    fn parses_partial_input_with_action() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"input","left":true,"action":{"kind":"bazooka_fire","direction_x":1.0,"direction_y":0.0,"power":0.5}}"#,
        )
        .unwrap();
        let ClientMsg::Input(cmd) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(cmd.left, Some(true));
        assert_eq!(cmd.right, None);
        assert_eq!(
            cmd.action,
            Some(InputAction::BazookaFire {
                direction_x: 1.0,
                direction_y: 0.0,
                power: 0.5
            })
        );
    }

    #[test]
    fn rejects_unknown_message_type() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMsg::Pong { t: 7 }).unwrap();
        assert_eq!(json["type"], "pong");
        assert_eq!(json["t"], 7);

        let json = serde_json::to_value(ServerMsg::error("room_not_found", "No such room")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "room_not_found");
    }
}
