//! Entity state owned by a match: players, ropes, coins, projectiles, impacts

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::{
    BLAST_DURATION, COIN_LIFETIME, MAX_HEALTH, PLAYER_CHAT_LEN,
};

pub type PlayerId = Uuid;

/// Team in team deathmatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn other(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Level-triggered input held between ticks.
///
/// Booleans stay set until the client clears them; edges are detected against the
/// `last_*` latches on [`Player`].
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    pub rope: bool,
    pub fire: bool,
    /// World point the rope is cast toward
    pub rope_x: f32,
    pub rope_y: f32,
    /// Bazooka aim direction, need not be normalized
    pub aim_x: f32,
    pub aim_y: f32,
    /// Bazooka power in [0, 1]
    pub power: f32,
}

/// A queued bazooka shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireCommand {
    pub direction_x: f32,
    pub direction_y: f32,
    pub power: f32,
}

/// Rope sub-state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Rope {
    #[default]
    None,
    /// Tip travelling outward from the player
    Firing {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        /// Distance travelled by the tip so far
        length: f32,
    },
    /// Hooked to terrain at (tx, ty)
    Attached {
        tx: f32,
        ty: f32,
        /// Slack length, excluding the player radius
        length: f32,
    },
}

impl Rope {
    pub fn is_attached(&self) -> bool {
        matches!(self, Rope::Attached { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    /// Unix millis
    pub timestamp: u64,
    pub sender: String,
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
    pub on_ground: bool,
    pub can_double_jump: bool,
    pub rope: Rope,

    // Combat and scoring
    pub score: i32,
    pub team: Option<Team>,
    pub health: f32,
    pub dying: bool,
    /// 0..1 while dying
    pub death_progress: f32,

    // Input tracking
    pub input: InputState,
    pub pending_fire: Option<FireCommand>,
    pub last_jump_input: bool,
    pub last_rope_input: bool,
    pub last_fire_input: bool,

    // Chat backlog, newest first
    pub chat: VecDeque<ChatMessage>,
    pub next_message_id: u64,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, x: f32, y: f32, team: Option<Team>) -> Self {
        Self {
            id,
            display_name,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            rotation: 0.0,
            on_ground: false,
            can_double_jump: false,
            rope: Rope::None,
            score: 0,
            team,
            health: MAX_HEALTH,
            dying: false,
            death_progress: 0.0,
            input: InputState::default(),
            pending_fire: None,
            last_jump_input: false,
            last_rope_input: false,
            last_fire_input: false,
            chat: VecDeque::new(),
            next_message_id: 0,
        }
    }

    /// Put the player back in play at (x, y), standing on the floor
    pub fn respawn_at(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.rope = Rope::None;
        self.on_ground = true;
        self.can_double_jump = false;
        self.dying = false;
        self.death_progress = 0.0;
        self.health = MAX_HEALTH;
    }

    /// Restore the freshly-joined state for a new round, keeping identity and team
    pub fn reset_for_round(&mut self, x: f32, y: f32) {
        let team = self.team;
        let input = std::mem::take(&mut self.input);
        *self = Player::new(self.id, std::mem::take(&mut self.display_name), x, y, team);
        self.input = input;
    }

    /// Begin the death animation
    pub fn start_dying(&mut self) {
        self.dying = true;
        self.death_progress = 0.0;
    }

    /// Assign a chat id and push the message onto the bounded backlog
    pub fn push_chat(&mut self, text: String, timestamp: u64) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_message_id,
            text,
            timestamp,
            sender: self.display_name.clone(),
        };
        self.next_message_id += 1;
        self.chat.push_front(message.clone());
        self.chat.truncate(PLAYER_CHAT_LEN);
        message
    }

    pub fn kinematics_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }
}

/// Gold-rush coin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coin {
    pub x: f32,
    pub y: f32,
    /// Seconds until despawn
    pub lifetime: f32,
}

impl Coin {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            lifetime: COIN_LIFETIME,
        }
    }
}

/// Bazooka projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
    pub owner_id: PlayerId,
    /// Owner's team at the moment of firing
    pub owner_team: Option<Team>,
    /// Latched once the projectile has cleared the owner's own hitbox
    pub exited_owner_hitbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactColor {
    Black,
}

/// Visual explosion marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impact {
    pub x: f32,
    pub y: f32,
    pub time: f32,
    pub max_time: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ImpactColor>,
}

impl Impact {
    pub fn blast(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            time: 0.0,
            max_time: BLAST_DURATION,
            color: None,
        }
    }

    pub fn death(x: f32, y: f32) -> Self {
        Self {
            color: Some(ImpactColor::Black),
            ..Self::blast(x, y)
        }
    }

    /// Age the effect, returns false once it has expired
    pub fn advance(&mut self, dt: f32) -> bool {
        self.time += dt;
        self.time <= self.max_time
    }
}
