//! Player movement, rope swinging and projectile ballistics

use std::collections::HashMap;

use tracing::debug;

use super::constants::{
    AIR_ACCELERATION, AIR_FRICTION, COLLISION_ENERGY_LOSS, GRAVITY, GROUND_ACCELERATION,
    GROUND_FRICTION, HEIGHT, JUMP_VELOCITY, MAX_ROPE_LENGTH, MAX_SPEED_ALONG_SLOPE,
    MIN_ROPE_LENGTH, PLAYER_RADIUS, PROJECTILE_WIDTH, ROPE_LENGTH_CHANGE_SPEED,
    ROPE_MAX_CAST_LENGTH, ROPE_SPEED, SWING_ACCELERATION, WIDTH,
};
use super::entities::{Player, PlayerId, Projectile, Rope};
use super::geometry::{distance, normalize, Segment};
use super::terrain::Terrain;

/// Physics system for player and projectile motion
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a live player by one tick.
    ///
    /// Order: rope trigger, rope cast, swing or free motion, world collision, input latch.
    pub fn step_player(player: &mut Player, terrain: &Terrain, dt: f32) {
        let was_on_ground = player.on_ground;
        let mut rope_edge = player.input.rope && !player.last_rope_input;
        let jump_edge = player.input.jump && !player.last_jump_input;

        // A press that starts a cast must not also count as a detach press
        if rope_edge && player.rope == Rope::None {
            Self::fire_rope(player);
            rope_edge = false;
        }

        if matches!(player.rope, Rope::Firing { .. }) {
            Self::advance_rope_cast(player, terrain, dt);
        }

        if player.rope.is_attached() {
            Self::swing(player, dt);
            if jump_edge || rope_edge {
                player.rope = Rope::None;
            }
        } else {
            Self::free_motion(player, terrain, was_on_ground, jump_edge, dt);
        }

        Self::resolve_world_collision(player, terrain);

        player.last_rope_input = player.input.rope;
        player.last_jump_input = player.input.jump;
    }

    /// Start a rope cast toward the input target. No-op if the target is the player itself.
    fn fire_rope(player: &mut Player) {
        let Some((dir_x, dir_y)) =
            normalize(player.input.rope_x - player.x, player.input.rope_y - player.y)
        else {
            return;
        };

        player.rope = Rope::Firing {
            x: player.x,
            y: player.y,
            vx: dir_x * ROPE_SPEED,
            vy: dir_y * ROPE_SPEED,
            length: 0.0,
        };
    }

    /// Move the rope tip and test the player-to-tip line against the terrain.
    ///
    /// The first terrain segment in insertion order that intersects wins.
    fn advance_rope_cast(player: &mut Player, terrain: &Terrain, dt: f32) {
        let Rope::Firing { x, y, vx, vy, length } = player.rope else {
            return;
        };

        let x = x + vx * dt;
        let y = y + vy * dt;
        let length = length + ROPE_SPEED * dt;

        let cast = Segment::new(player.x, player.y, x, y);
        let hit = terrain
            .segments()
            .iter()
            .find_map(|segment| cast.intersect(segment));

        player.rope = if let Some((tx, ty)) = hit {
            debug!(player_id = %player.id, tx, ty, "Rope attached");
            Rope::Attached {
                tx,
                ty,
                length: distance(player.x, player.y, tx, ty) - PLAYER_RADIUS,
            }
        } else if length >= ROPE_MAX_CAST_LENGTH {
            Rope::None
        } else {
            Rope::Firing { x, y, vx, vy, length }
        };
    }

    /// Swing on an attached rope as a positional constraint
    fn swing(player: &mut Player, dt: f32) {
        let Rope::Attached { tx, ty, mut length } = player.rope else {
            return;
        };

        // Directly on the anchor the radial direction is undefined; hang straight down
        let (radial_x, radial_y) = normalize(player.x - tx, player.y - ty).unwrap_or((0.0, 1.0));
        let tangent_x = -radial_y;
        let tangent_y = radial_x;

        let input = &player.input;
        if input.up {
            length = (length - ROPE_LENGTH_CHANGE_SPEED * dt).max(MIN_ROPE_LENGTH);
        } else if input.down {
            length = (length + ROPE_LENGTH_CHANGE_SPEED * dt).min(MAX_ROPE_LENGTH);
        }

        let gravity_tangent = GRAVITY * tangent_y;
        player.vx += gravity_tangent * tangent_x * dt;
        player.vy += gravity_tangent * tangent_y * dt;

        let input_accel = if input.left {
            -SWING_ACCELERATION
        } else if input.right {
            SWING_ACCELERATION
        } else {
            0.0
        };
        let input_tangent = input_accel * tangent_x;
        player.vx += input_tangent * tangent_x * dt;
        player.vy += input_tangent * tangent_y * dt;

        let tangent_speed = player.vx * tangent_x + player.vy * tangent_y;

        player.x += player.vx * dt;
        player.y += player.vy * dt;

        let effective_length = length + PLAYER_RADIUS;
        if let Some((nx, ny)) = normalize(player.x - tx, player.y - ty) {
            player.x = tx + nx * effective_length;
            player.y = ty + ny * effective_length;
        }

        player.vx = tangent_speed * tangent_x;
        player.vy = tangent_speed * tangent_y;
        player.rotation = (-tangent_x).atan2(-tangent_y);
        player.rope = Rope::Attached { tx, ty, length };
    }

    /// Ground sliding or air control when not on a rope
    fn free_motion(
        player: &mut Player,
        terrain: &Terrain,
        was_on_ground: bool,
        jump_edge: bool,
        dt: f32,
    ) {
        let input = &player.input;

        if was_on_ground {
            let theta = terrain.slope_angle_at(player.x);
            let gravity_along_slope = GRAVITY * theta.sin();
            let input_accel = if input.left {
                -GROUND_ACCELERATION
            } else if input.right {
                GROUND_ACCELERATION
            } else {
                0.0
            };

            player.vx += (input_accel + gravity_along_slope) * dt;

            if input_accel == 0.0 {
                let friction = GROUND_FRICTION * dt;
                if player.vx.abs() <= friction {
                    player.vx = 0.0;
                } else {
                    player.vx -= friction * player.vx.signum();
                }
            }

            let max_vx = MAX_SPEED_ALONG_SLOPE * theta.cos();
            player.vx = player.vx.clamp(-max_vx, max_vx);
            player.vy = player.vx * theta.tan();

            if jump_edge {
                player.vy = JUMP_VELOCITY;
                player.on_ground = false;
            }

            player.rotation += player.vx * dt / PLAYER_RADIUS;
        } else {
            if jump_edge && player.can_double_jump {
                player.vy = JUMP_VELOCITY;
                player.can_double_jump = false;
            }

            if input.left {
                player.vx -= AIR_ACCELERATION * dt;
            } else if input.right {
                player.vx += AIR_ACCELERATION * dt;
            }

            let friction = AIR_FRICTION * dt;
            if player.vx > 0.0 {
                player.vx = (player.vx - friction).max(0.0);
            } else if player.vx < 0.0 {
                player.vx = (player.vx + friction).min(0.0);
            }

            let speed = (player.vx * player.vx + player.vy * player.vy).sqrt();
            player.rotation += speed * dt / PLAYER_RADIUS;
        }

        // Grounded players get this removed again by the floor clamp
        player.vy += GRAVITY * dt;
        player.x += player.vx * dt;
        player.y += player.vy * dt;
    }

    /// Clamp to world walls, floor and ceiling
    fn resolve_world_collision(player: &mut Player, terrain: &Terrain) {
        if player.x < PLAYER_RADIUS {
            player.x = PLAYER_RADIUS;
            if player.vx < 0.0 {
                player.vx = -player.vx * COLLISION_ENERGY_LOSS;
            }
        } else if player.x > WIDTH - PLAYER_RADIUS {
            player.x = WIDTH - PLAYER_RADIUS;
            if player.vx > 0.0 {
                player.vx = -player.vx * COLLISION_ENERGY_LOSS;
            }
        }

        let floor_y = terrain.floor_at(player.x);
        if player.y > floor_y - PLAYER_RADIUS {
            player.y = floor_y - PLAYER_RADIUS;
            if player.rope.is_attached() {
                if player.vy > 0.0 {
                    player.vy = -player.vy * COLLISION_ENERGY_LOSS;
                }
            } else {
                player.vy = 0.0;
                player.on_ground = true;
                player.can_double_jump = true;
            }
        } else {
            player.on_ground = false;
        }

        let ceiling_y = terrain.ceiling_at(player.x);
        if player.y < ceiling_y + PLAYER_RADIUS {
            player.y = ceiling_y + PLAYER_RADIUS;
            if player.vy < 0.0 {
                player.vy = -player.vy * COLLISION_ENERGY_LOSS;
            }
            player.on_ground = false;
        }
    }

    /// Ballistic motion for one tick
    pub fn step_projectile(projectile: &mut Projectile, dt: f32) {
        projectile.x += projectile.vx * dt;
        projectile.y += projectile.vy * dt;
        projectile.vy += GRAVITY * dt;
        projectile.rotation = projectile.vy.atan2(projectile.vx);
    }

    /// True if the projectile should detonate this tick.
    ///
    /// Also latches `exited_owner_hitbox` once the projectile is clear of its owner.
    pub fn projectile_collides(
        projectile: &mut Projectile,
        terrain: &Terrain,
        players: &HashMap<PlayerId, Player>,
    ) -> bool {
        let hit_radius = PLAYER_RADIUS + PROJECTILE_WIDTH / 2.0;

        if !projectile.exited_owner_hitbox {
            match players.get(&projectile.owner_id) {
                Some(owner) => {
                    if distance(owner.x, owner.y, projectile.x, projectile.y) >= hit_radius {
                        projectile.exited_owner_hitbox = true;
                    }
                }
                None => projectile.exited_owner_hitbox = true,
            }
        }

        if projectile.x < 0.0
            || projectile.x > WIDTH
            || projectile.y < 0.0
            || projectile.y > HEIGHT
        {
            return true;
        }

        if projectile.y >= terrain.floor_at(projectile.x)
            || projectile.y <= terrain.ceiling_at(projectile.x)
        {
            return true;
        }

        players.values().any(|player| {
            if player.dying {
                return false;
            }
            if player.id == projectile.owner_id && !projectile.exited_owner_hitbox {
                return false;
            }
            distance(player.x, player.y, projectile.x, projectile.y) < hit_radius
        })
    }
}
