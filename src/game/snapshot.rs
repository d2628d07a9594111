//! Full-state snapshot materialization for network transmission

use serde::Serialize;
use uuid::Uuid;

use super::entities::{ChatMessage, Coin, Impact, Player, PlayerId, Projectile, Rope, Team};
use super::mode::GameMode;
use super::r#match::{MatchPhase, MatchState, TeamScores, Winner};

/// Complete match state as sent to clients every tick
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    pub room_id: Uuid,
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub coins: Vec<Coin>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub impacts: Vec<Impact>,
    pub chat_history: Vec<ChatMessage>,
    pub state: MatchPhase,
    pub winner: Option<Winner>,
    /// Seconds left, None when the match is untimed
    pub timer: Option<f32>,
    /// Configured match length in seconds
    pub duration: Option<f32>,
    pub terrain: TerrainSnapshot,
    pub game_mode: GameMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_scores: Option<TeamScores>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
    pub score: i32,
    pub team: Option<Team>,
    pub health: f32,
    pub dying: bool,
    pub death_progress: f32,
    pub rope: RopeSnapshot,
    pub chat: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RopeSnapshot {
    None,
    Firing { x: f32, y: f32, length: f32 },
    Attached { x: f32, y: f32, length: f32 },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProjectileSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
    pub owner_id: PlayerId,
}

/// Terrain sample arrays, index-aligned
#[derive(Debug, Clone, Serialize)]
pub struct TerrainSnapshot {
    pub x: Vec<f32>,
    pub y_floor: Vec<f32>,
    pub y_ceiling: Vec<f32>,
}

impl From<Rope> for RopeSnapshot {
    fn from(rope: Rope) -> Self {
        match rope {
            Rope::None => RopeSnapshot::None,
            Rope::Firing { x, y, length, .. } => RopeSnapshot::Firing { x, y, length },
            Rope::Attached { tx, ty, length } => RopeSnapshot::Attached {
                x: tx,
                y: ty,
                length,
            },
        }
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            x: p.x,
            y: p.y,
            vx: p.vx,
            vy: p.vy,
            rotation: p.rotation,
            score: p.score,
            team: p.team,
            health: p.health,
            dying: p.dying,
            death_progress: p.death_progress,
            rope: p.rope.into(),
            chat: p.chat.iter().cloned().collect(),
        }
    }
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            x: p.x,
            y: p.y,
            vx: p.vx,
            vy: p.vy,
            rotation: p.rotation,
            owner_id: p.owner_id,
        }
    }
}

impl MatchSnapshot {
    /// Capture the state at a tick boundary
    pub fn capture(state: &MatchState) -> Self {
        let mut players: Vec<PlayerSnapshot> = state.players.values().map(Into::into).collect();
        // Stable order for clients
        players.sort_by_key(|p| p.id);

        Self {
            room_id: state.id,
            tick: state.tick,
            players,
            coins: state.coins.clone(),
            projectiles: state.projectiles.iter().map(Into::into).collect(),
            impacts: state.impacts.clone(),
            chat_history: state.chat_history.iter().cloned().collect(),
            state: state.phase,
            winner: state.winner,
            timer: state.timer,
            duration: state.options.time_limit,
            terrain: TerrainSnapshot {
                x: state.terrain.xs().to_vec(),
                y_floor: state.terrain.floor_samples().to_vec(),
                y_ceiling: state.terrain.ceiling_samples().to_vec(),
            },
            game_mode: state.options.mode,
            team_scores: state.options.mode.uses_teams().then_some(state.team_scores),
        }
    }
}

impl MatchState {
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::capture(self)
    }
}
