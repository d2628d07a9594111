//! Game simulation modules

pub mod combat;
pub mod constants;
pub mod entities;
pub mod geometry;
pub mod r#match;
pub mod mode;
pub mod physics;
pub mod runner;
pub mod snapshot;
pub mod terrain;

pub use mode::GameMode;
pub use r#match::MatchOptions;
pub use runner::{MatchCommand, MatchHandle, MatchRegistry, RegistryError};
pub use snapshot::MatchSnapshot;

use serde::Deserialize;

/// Input command received from a client.
///
/// Every field is optional; present fields overwrite the player's held input and
/// absent ones keep their previous value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputCommand {
    pub left: Option<bool>,
    pub right: Option<bool>,
    pub up: Option<bool>,
    pub down: Option<bool>,
    pub jump: Option<bool>,
    pub rope: Option<bool>,
    /// Held bazooka trigger, fires on press using `aim_x`/`aim_y`/`power`
    pub fire: Option<bool>,
    pub rope_x: Option<f32>,
    pub rope_y: Option<f32>,
    pub aim_x: Option<f32>,
    pub aim_y: Option<f32>,
    pub power: Option<f32>,
    pub action: Option<InputAction>,
    pub chat: Option<String>,
}

/// One-shot action carried by an input command
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputAction {
    /// Fire the bazooka once
    BazookaFire {
        direction_x: f32,
        direction_y: f32,
        /// 0..1
        power: f32,
    },
    SwitchTeam,
}
