//! Combat system - bazooka shots, blast damage, knockback and kill credit

use std::collections::HashMap;

use tracing::debug;

use super::constants::{
    BAZOOKA_MAX_VELOCITY, BLAST_CENTER_DAMAGE_FRACTION, BLAST_RADIUS, MAX_BLAST_FORCE, MAX_HEALTH,
};
use super::entities::{FireCommand, Player, PlayerId, Projectile, Rope, Team};
use super::geometry::{distance, normalize};
use super::mode::GameMode;

/// Match rules that affect blast resolution
#[derive(Debug, Clone, Copy)]
pub struct BlastRules {
    pub mode: GameMode,
    pub friendly_fire: bool,
}

/// Origin of a blast
#[derive(Debug, Clone, Copy)]
pub struct Blast {
    pub x: f32,
    pub y: f32,
    pub shooter_id: PlayerId,
    pub shooter_team: Option<Team>,
}

/// Score change owed to a shooter for a kill
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KillCredit {
    pub shooter_id: PlayerId,
    pub shooter_team: Option<Team>,
    pub victim_id: PlayerId,
    /// +1 for an enemy kill, -1 for a self or teammate kill
    pub delta: i32,
}

/// Combat system for managing shots and blasts
pub struct CombatSystem;

impl CombatSystem {
    /// Spawn a projectile from the player's center.
    ///
    /// Returns None for a zero-length aim direction.
    pub fn fire(player: &Player, command: FireCommand) -> Option<Projectile> {
        let (dir_x, dir_y) = normalize(command.direction_x, command.direction_y)?;
        let power = if command.power.is_finite() {
            command.power.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let speed = BAZOOKA_MAX_VELOCITY * power;
        let vx = dir_x * speed;
        let vy = dir_y * speed;

        Some(Projectile {
            x: player.x,
            y: player.y,
            vx,
            vy,
            rotation: vy.atan2(vx),
            owner_id: player.id,
            owner_team: player.team,
            exited_owner_hitbox: false,
        })
    }

    /// Linear falloff: 1 at the center, 0 at and beyond the blast radius
    pub fn blast_falloff(dist: f32) -> f32 {
        if dist >= BLAST_RADIUS {
            0.0
        } else {
            (1.0 - dist / BLAST_RADIUS).clamp(0.0, 1.0)
        }
    }

    pub fn blast_damage(dist: f32) -> f32 {
        MAX_HEALTH * BLAST_CENTER_DAMAGE_FRACTION * Self::blast_falloff(dist)
    }

    /// Apply a blast once to every live player in range.
    ///
    /// Every caught player loses an attached rope, is knocked away from the center and
    /// leaves the ground. Damage is skipped for same-side targets unless friendly fire
    /// is on. Returns the kill credits to book.
    pub fn resolve_blast(
        blast: Blast,
        players: &mut HashMap<PlayerId, Player>,
        rules: BlastRules,
    ) -> Vec<KillCredit> {
        let mut credits = Vec::new();

        for player in players.values_mut() {
            if player.dying {
                continue;
            }

            let dx = player.x - blast.x;
            let dy = player.y - blast.y;
            let dist = distance(blast.x, blast.y, player.x, player.y);
            if dist >= BLAST_RADIUS {
                continue;
            }

            if player.rope.is_attached() {
                player.rope = Rope::None;
            }

            let falloff = Self::blast_falloff(dist);
            let same_side =
                rules
                    .mode
                    .same_side(blast.shooter_id, blast.shooter_team, player.id, player.team);

            if !same_side || rules.friendly_fire {
                player.health -= Self::blast_damage(dist);
                if player.health <= 0.0 {
                    player.start_dying();
                    debug!(
                        shooter_id = %blast.shooter_id,
                        victim_id = %player.id,
                        friendly = same_side,
                        "Player killed by blast"
                    );
                    if rules.mode.scores_kills() {
                        credits.push(KillCredit {
                            shooter_id: blast.shooter_id,
                            shooter_team: blast.shooter_team,
                            victim_id: player.id,
                            delta: if same_side { -1 } else { 1 },
                        });
                    }
                }
            }

            let force = MAX_BLAST_FORCE * falloff;
            let (dir_x, dir_y) = normalize(dx, dy).unwrap_or((0.0, 0.0));
            player.vx += dir_x * force;
            player.vy += dir_y * force;
            player.on_ground = false;
        }

        credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player_at(x: f32, y: f32, team: Option<Team>) -> Player {
        let mut p = Player::new(Uuid::new_v4(), "t".into(), x, y, team);
        p.on_ground = true;
        p
    }

    fn roster(players: Vec<Player>) -> HashMap<PlayerId, Player> {
        players.into_iter().map(|p| (p.id, p)).collect()
    }

    const DM: BlastRules = BlastRules {
        mode: GameMode::Deathmatch,
        friendly_fire: false,
    };

    #[test]
    fn damage_falls_off_linearly() {
        assert!((CombatSystem::blast_damage(0.0) - 55.0).abs() < 1e-4);
        assert_eq!(CombatSystem::blast_damage(BLAST_RADIUS), 0.0);
        assert_eq!(CombatSystem::blast_damage(BLAST_RADIUS * 3.0), 0.0);

        let mut previous = CombatSystem::blast_damage(0.0);
        for step in 1..=100 {
            let d = CombatSystem::blast_damage(step as f32);
            assert!(d <= previous);
            previous = d;
        }
    }

    #[test]
    fn enemy_in_range_takes_damage_and_knockback() {
        let shooter = player_at(100.0, 200.0, None);
        let target = player_at(130.0, 200.0, None);
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players = roster(vec![shooter, target]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 120.0, y: 200.0, shooter_id, shooter_team: None },
            &mut players,
            DM,
        );
        assert!(credits.is_empty());

        let t = &players[&target_id];
        let expected = MAX_HEALTH - CombatSystem::blast_damage(10.0);
        assert!((t.health - expected).abs() < 1e-3);
        assert!(t.vx > 0.0);
        assert!(!t.on_ground);

        // Shooter is 20 away: knocked back but unharmed
        let s = &players[&shooter_id];
        assert_eq!(s.health, MAX_HEALTH);
        assert!(s.vx < 0.0);
    }

    #[test]
    fn self_blast_without_friendly_fire_only_pushes() {
        let mut shooter = player_at(100.0, 200.0, None);
        shooter.rope = Rope::Attached { tx: 100.0, ty: 100.0, length: 90.0 };
        let id = shooter.id;
        let mut players = roster(vec![shooter]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 100.0, y: 210.0, shooter_id: id, shooter_team: None },
            &mut players,
            DM,
        );
        let s = &players[&id];
        assert!(credits.is_empty());
        assert_eq!(s.health, MAX_HEALTH);
        assert_eq!(s.score, 0);
        assert_eq!(s.rope, Rope::None);
        assert!(s.vy < 0.0);
    }

    #[test]
    fn kill_credits_shooter() {
        let shooter = player_at(0.0, 0.0, None);
        let mut target = player_at(300.0, 200.0, None);
        target.health = 10.0;
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players = roster(vec![shooter, target]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 300.0, y: 200.0, shooter_id, shooter_team: None },
            &mut players,
            DM,
        );
        assert_eq!(
            credits,
            vec![KillCredit { shooter_id, shooter_team: None, victim_id: target_id, delta: 1 }]
        );
        assert!(players[&target_id].dying);
        // Zero distance: no direction to push in
        assert_eq!(players[&target_id].vx, 0.0);
        assert_eq!(players[&target_id].vy, 0.0);
    }

    #[test]
    fn friendly_fire_self_kill_costs_a_point() {
        let mut shooter = player_at(300.0, 200.0, None);
        shooter.health = 1.0;
        let id = shooter.id;
        let mut players = roster(vec![shooter]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 300.0, y: 200.0, shooter_id: id, shooter_team: None },
            &mut players,
            BlastRules { mode: GameMode::Deathmatch, friendly_fire: true },
        );
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].delta, -1);
    }

    #[test]
    fn teammates_are_spared_without_friendly_fire() {
        let shooter = player_at(0.0, 0.0, Some(Team::Red));
        let mut mate = player_at(300.0, 200.0, Some(Team::Red));
        mate.health = 1.0;
        let mut enemy = player_at(305.0, 200.0, Some(Team::Blue));
        enemy.health = 1.0;
        let (shooter_id, mate_id, enemy_id) = (shooter.id, mate.id, enemy.id);
        let mut players = roster(vec![shooter, mate, enemy]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 300.0, y: 200.0, shooter_id, shooter_team: Some(Team::Red) },
            &mut players,
            BlastRules { mode: GameMode::TeamDeathmatch, friendly_fire: false },
        );
        assert_eq!(players[&mate_id].health, 1.0);
        assert!(!players[&mate_id].dying);
        assert!(players[&enemy_id].dying);
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].shooter_team, Some(Team::Red));
        assert_eq!(credits[0].delta, 1);
    }

    #[test]
    fn goldrush_kills_are_not_credited() {
        let shooter = player_at(0.0, 0.0, None);
        let mut target = player_at(300.0, 200.0, None);
        target.health = 1.0;
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players = roster(vec![shooter, target]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 300.0, y: 200.0, shooter_id, shooter_team: None },
            &mut players,
            BlastRules { mode: GameMode::Goldrush, friendly_fire: false },
        );
        assert!(credits.is_empty());
        assert!(players[&target_id].dying);
    }

    #[test]
    fn dying_players_are_ignored() {
        let shooter = player_at(0.0, 0.0, None);
        let mut target = player_at(300.0, 200.0, None);
        target.start_dying();
        target.health = -3.0;
        let (shooter_id, target_id) = (shooter.id, target.id);
        let mut players = roster(vec![shooter, target]);

        let credits = CombatSystem::resolve_blast(
            Blast { x: 301.0, y: 200.0, shooter_id, shooter_team: None },
            &mut players,
            DM,
        );
        assert!(credits.is_empty());
        assert_eq!(players[&target_id].health, -3.0);
        assert_eq!(players[&target_id].vx, 0.0);
    }

    #[test]
    fn fire_scales_speed_by_power() {
        let p = player_at(100.0, 100.0, Some(Team::Blue));
        let proj = CombatSystem::fire(
            &p,
            FireCommand { direction_x: 3.0, direction_y: 4.0, power: 0.5 },
        )
        .unwrap();
        assert!((proj.vx - 0.6 * 375.0).abs() < 1e-3);
        assert!((proj.vy - 0.8 * 375.0).abs() < 1e-3);
        assert_eq!(proj.owner_team, Some(Team::Blue));
        assert!(!proj.exited_owner_hitbox);

        let over = CombatSystem::fire(
            &p,
            FireCommand { direction_x: 1.0, direction_y: 0.0, power: 4.0 },
        )
        .unwrap();
        assert!((over.vx - BAZOOKA_MAX_VELOCITY).abs() < 1e-3);
    }

    #[test]
    fn fire_without_direction_is_ignored() {
        let p = player_at(100.0, 100.0, None);
        let shot = CombatSystem::fire(
            &p,
            FireCommand { direction_x: 0.0, direction_y: 0.0, power: 1.0 },
        );
        assert!(shot.is_none());
    }
}
