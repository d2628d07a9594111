//! Gameplay tuning constants
//!
//! Distances are world units, times are seconds, speeds are units per second.

/// World width
pub const WIDTH: f32 = 800.0;
/// World height
pub const HEIGHT: f32 = 400.0;

/// Number of terrain segments between x = 0 and x = WIDTH
pub const TERRAIN_SEGMENTS: usize = 25;
/// Control points of the terrain noise are spaced this many samples apart
pub const TERRAIN_NOISE_PERIOD: usize = 5;
/// Minimum vertical gap between floor and ceiling at every terrain sample
pub const MIN_CAVE_HEIGHT: f32 = 120.0;

pub const PLAYER_RADIUS: f32 = 10.0;
pub const COIN_RADIUS: f32 = 14.0;
pub const MAX_HEALTH: f32 = 100.0;

pub const GRAVITY: f32 = 400.0;
pub const JUMP_VELOCITY: f32 = -275.0;
pub const GROUND_ACCELERATION: f32 = 1000.0;
pub const GROUND_FRICTION: f32 = 100.0;
pub const MAX_SPEED_ALONG_SLOPE: f32 = 150.0;
pub const AIR_ACCELERATION: f32 = 300.0;
pub const AIR_FRICTION: f32 = 50.0;
/// Fraction of speed kept when bouncing off a wall, floor or ceiling
pub const COLLISION_ENERGY_LOSS: f32 = 0.5;

// Rope
pub const ROPE_SPEED: f32 = 1350.0;
/// Cast distance after which a rope that hit nothing is retracted
pub const ROPE_MAX_CAST_LENGTH: f32 = 300.0;
pub const SWING_ACCELERATION: f32 = 500.0;
pub const ROPE_LENGTH_CHANGE_SPEED: f32 = 300.0;
pub const MIN_ROPE_LENGTH: f32 = 0.0;
pub const MAX_ROPE_LENGTH: f32 = 350.0;

// Bazooka
pub const BAZOOKA_MAX_VELOCITY: f32 = 750.0;
pub const PROJECTILE_WIDTH: f32 = 20.0;
pub const MAX_PROJECTILES: usize = 50;

// Blast
pub const BLAST_RADIUS: f32 = 75.0;
pub const BLAST_DURATION: f32 = 0.25;
pub const MAX_BLAST_FORCE: f32 = 750.0;
/// Fraction of max health dealt at the blast center
pub const BLAST_CENTER_DAMAGE_FRACTION: f32 = 0.55;
pub const MAX_IMPACTS: usize = 64;

// Death
pub const DEATH_ANIMATION_DURATION: f32 = 0.5;

// Coins
pub const COIN_LIFETIME: f32 = 5.0;
pub const COIN_SPAWN_INTERVAL: f32 = 2.0;
pub const MAX_COINS: usize = 16;
/// Horizontal margin kept free of coins at each world edge
pub const COIN_EDGE_MARGIN: f32 = 10.0;

// Chat
pub const CHAT_HISTORY_LEN: usize = 50;
pub const PLAYER_CHAT_LEN: usize = 10;
pub const MAX_CHAT_CHARS: usize = 200;
