//! Game modes and the rules that depend on them

use serde::{Deserialize, Serialize};

use super::entities::{PlayerId, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Collect coins, first to the gold limit wins
    #[default]
    Goldrush,
    /// Free-for-all, first to the kill limit wins
    Deathmatch,
    /// Two teams pooling kills
    TeamDeathmatch,
}

impl GameMode {
    pub fn spawns_coins(self) -> bool {
        matches!(self, GameMode::Goldrush)
    }

    pub fn scores_kills(self) -> bool {
        matches!(self, GameMode::Deathmatch | GameMode::TeamDeathmatch)
    }

    pub fn uses_teams(self) -> bool {
        matches!(self, GameMode::TeamDeathmatch)
    }

    pub fn allows_friendly_fire(self) -> bool {
        self.scores_kills()
    }

    /// Whether a blast from `shooter` counts as friendly against `target`
    pub fn same_side(
        self,
        shooter: PlayerId,
        shooter_team: Option<Team>,
        target: PlayerId,
        target_team: Option<Team>,
    ) -> bool {
        if shooter == target {
            return true;
        }
        match (self, shooter_team, target_team) {
            (GameMode::TeamDeathmatch, Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
