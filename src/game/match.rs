//! Match state and the authoritative simulation step

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::unix_millis;

use super::combat::{Blast, BlastRules, CombatSystem, KillCredit};
use super::constants::{
    CHAT_HISTORY_LEN, COIN_EDGE_MARGIN, COIN_RADIUS, COIN_SPAWN_INTERVAL,
    DEATH_ANIMATION_DURATION, MAX_CHAT_CHARS, MAX_COINS, MAX_IMPACTS, MAX_PROJECTILES,
    PLAYER_RADIUS, WIDTH,
};
use super::entities::{
    ChatMessage, Coin, FireCommand, Impact, Player, PlayerId, Projectile, Team,
};
use super::mode::GameMode;
use super::physics::PhysicsSystem;
use super::terrain::Terrain;
use super::{InputAction, InputCommand};

/// Attempts at finding an x with room for a coin before giving up on a spawn
const COIN_PLACEMENT_ATTEMPTS: usize = 8;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Playing,
    GameOver,
}

/// Outcome of a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Winner {
    Player { id: PlayerId },
    Team { team: Team },
    Tie,
}

/// Match configuration, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub mode: GameMode,
    pub friendly_fire: bool,
    /// Kills needed to win in (team) deathmatch, None for unbounded
    pub kill_limit: Option<i32>,
    /// Coins needed to win in gold rush, None for unbounded
    pub gold_win_limit: Option<i32>,
    /// Match length in seconds, None for unbounded
    pub time_limit: Option<f32>,
}

impl MatchOptions {
    #[cfg(test)]
    pub fn new(mode: GameMode) -> Self {
        Self {
            mode,
            friendly_fire: false,
            kill_limit: None,
            gold_win_limit: None,
            time_limit: None,
        }
    }

    /// Build options from raw client values.
    ///
    /// Non-positive or non-finite limits become unbounded and oversized ones saturate
    /// at the largest score. Limits that do not apply to the mode are dropped and
    /// friendly fire is forced off in gold rush.
    pub fn sanitized(
        mode: GameMode,
        friendly_fire: bool,
        kill_limit: Option<f64>,
        gold_win_limit: Option<f64>,
        time_limit: Option<f64>,
    ) -> Self {
        fn positive(v: Option<f64>) -> Option<f64> {
            v.filter(|v| v.is_finite() && *v > 0.0)
        }
        let count = |v: Option<f64>| positive(v).map(|v| v.ceil().min(i32::MAX as f64) as i32);

        Self {
            mode,
            friendly_fire: friendly_fire && mode.allows_friendly_fire(),
            kill_limit: if mode.scores_kills() { count(kill_limit) } else { None },
            gold_win_limit: if mode.spawns_coins() { count(gold_win_limit) } else { None },
            time_limit: positive(time_limit).map(|v| v as f32),
        }
    }
}

/// Aggregate team scores in team deathmatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamScores {
    pub red: i32,
    pub blue: i32,
}

impl TeamScores {
    pub fn add(&mut self, team: Team, delta: i32) {
        match team {
            Team::Red => self.red += delta,
            Team::Blue => self.blue += delta,
        }
    }

    /// Higher-scoring team, Tie when level
    pub fn leader(&self) -> Winner {
        match self.red.cmp(&self.blue) {
            std::cmp::Ordering::Greater => Winner::Team { team: Team::Red },
            std::cmp::Ordering::Less => Winner::Team { team: Team::Blue },
            std::cmp::Ordering::Equal => Winner::Tie,
        }
    }
}

/// Match state (owned by match task)
pub struct MatchState {
    pub id: Uuid,
    pub options: MatchOptions,
    pub phase: MatchPhase,
    pub winner: Option<Winner>,
    pub tick: u64,
    /// Seconds left, None when unbounded
    pub timer: Option<f32>,
    pub coin_spawn_timer: f32,
    pub terrain: Terrain,
    pub players: HashMap<PlayerId, Player>,
    pub coins: Vec<Coin>,
    pub projectiles: Vec<Projectile>,
    pub impacts: Vec<Impact>,
    /// Newest first
    pub chat_history: VecDeque<ChatMessage>,
    pub team_scores: TeamScores,
    rng: ChaCha8Rng,
}

impl MatchState {
    pub fn new(id: Uuid, options: MatchOptions, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let terrain = Terrain::generate(&mut rng);

        let mut state = Self {
            id,
            options,
            phase: MatchPhase::Playing,
            winner: None,
            tick: 0,
            timer: options.time_limit,
            coin_spawn_timer: COIN_SPAWN_INTERVAL,
            terrain,
            players: HashMap::new(),
            coins: Vec::new(),
            projectiles: Vec::new(),
            impacts: Vec::new(),
            chat_history: VecDeque::new(),
            team_scores: TeamScores::default(),
            rng,
        };

        if options.mode.spawns_coins() {
            state.spawn_coin();
        }
        state
    }

    pub fn mode(&self) -> GameMode {
        self.options.mode
    }

    /// Spawn point for joins and resets
    fn start_position(&self) -> (f32, f32) {
        let x = WIDTH / 4.0;
        (x, self.terrain.floor_at(x) - PLAYER_RADIUS)
    }

    /// Team with fewer members, red on a tie
    fn smaller_team(&self) -> Team {
        let red = self
            .players
            .values()
            .filter(|p| p.team == Some(Team::Red))
            .count();
        let blue = self
            .players
            .values()
            .filter(|p| p.team == Some(Team::Blue))
            .count();
        if blue < red {
            Team::Blue
        } else {
            Team::Red
        }
    }

    /// Add a player at the start position. Returns false if the id is already present.
    pub fn add_player(&mut self, id: PlayerId, display_name: String) -> bool {
        if self.players.contains_key(&id) {
            warn!(match_id = %self.id, player_id = %id, "Player already in match");
            return false;
        }

        let team = self.mode().uses_teams().then(|| self.smaller_team());
        let (x, y) = self.start_position();
        self.players
            .insert(id, Player::new(id, display_name, x, y, team));

        info!(
            match_id = %self.id,
            player_id = %id,
            player_count = self.players.len(),
            "Player joined match"
        );
        true
    }

    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!(match_id = %self.id, player_id = %id, "Player left match");
        }
        removed
    }

    /// Merge a client command into the player's held input. Unknown ids are ignored.
    pub fn submit_input(&mut self, id: PlayerId, command: InputCommand) {
        let uses_teams = self.mode().uses_teams();
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        let input = &mut player.input;
        let flags = [
            (&mut input.left, command.left),
            (&mut input.right, command.right),
            (&mut input.up, command.up),
            (&mut input.down, command.down),
            (&mut input.jump, command.jump),
            (&mut input.rope, command.rope),
            (&mut input.fire, command.fire),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                *field = value;
            }
        }

        let axes = [
            (&mut input.rope_x, command.rope_x),
            (&mut input.rope_y, command.rope_y),
            (&mut input.aim_x, command.aim_x),
            (&mut input.aim_y, command.aim_y),
            (&mut input.power, command.power),
        ];
        for (field, value) in axes {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                *field = value;
            }
        }

        match command.action {
            Some(InputAction::BazookaFire {
                direction_x,
                direction_y,
                power,
            }) => {
                player.pending_fire = Some(FireCommand {
                    direction_x,
                    direction_y,
                    power,
                });
            }
            Some(InputAction::SwitchTeam) if uses_teams => {
                player.team = player.team.map(Team::other);
            }
            Some(InputAction::SwitchTeam) | None => {}
        }

        if let Some(text) = command.chat {
            let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
            if !text.is_empty() {
                let message = player.push_chat(text, unix_millis());
                self.chat_history.push_front(message);
                self.chat_history.truncate(CHAT_HISTORY_LEN);
            }
        }
    }

    /// Start a new round: fresh terrain, cleared entities and scores, everyone at the start
    pub fn reset(&mut self) {
        self.terrain = Terrain::generate(&mut self.rng);
        self.phase = MatchPhase::Playing;
        self.winner = None;
        self.timer = self.options.time_limit;
        self.coin_spawn_timer = COIN_SPAWN_INTERVAL;
        self.coins.clear();
        self.projectiles.clear();
        self.impacts.clear();
        self.team_scores = TeamScores::default();

        let (x, y) = self.start_position();
        for player in self.players.values_mut() {
            player.reset_for_round(x, y);
        }

        if self.mode().spawns_coins() {
            self.spawn_coin();
        }

        info!(match_id = %self.id, "Match reset");
    }

    /// Advance the match by `dt` seconds. Does nothing once the match is over.
    pub fn step(&mut self, dt: f32) {
        if self.phase != MatchPhase::Playing {
            return;
        }
        self.tick += 1;

        if let Some(timer) = self.timer.as_mut() {
            *timer -= dt;
            if *timer <= 0.0 {
                *timer = 0.0;
                let winner = self.time_up_winner();
                self.end_match(winner);
                return;
            }
        }

        if self.mode().spawns_coins() {
            self.coin_spawn_timer -= dt;
            if self.coin_spawn_timer <= 0.0 {
                self.spawn_coin();
                self.coin_spawn_timer = COIN_SPAWN_INTERVAL;
            }
        }
        self.spawn_projectiles();

        self.step_projectiles(dt);
        self.impacts.retain_mut(|impact| impact.advance(dt));
        for coin in &mut self.coins {
            coin.lifetime -= dt;
        }

        self.step_players(dt);
        self.collect_coins();
        self.repair_non_finite();
        self.check_win_condition();
    }

    /// Consume queued shots and fresh trigger presses
    fn spawn_projectiles(&mut self) {
        for player in self.players.values_mut() {
            let queued = player.pending_fire.take();
            let trigger = player.input.fire && !player.last_fire_input;
            player.last_fire_input = player.input.fire;

            if player.dying {
                continue;
            }

            let held = trigger.then(|| FireCommand {
                direction_x: player.input.aim_x,
                direction_y: player.input.aim_y,
                power: player.input.power,
            });

            for command in queued.into_iter().chain(held) {
                if self.projectiles.len() >= MAX_PROJECTILES {
                    debug!(match_id = %self.id, "Projectile cap reached, dropping shot");
                    break;
                }
                if let Some(projectile) = CombatSystem::fire(player, command) {
                    self.projectiles.push(projectile);
                }
            }
        }
    }

    fn step_projectiles(&mut self, dt: f32) {
        let mut projectiles = std::mem::take(&mut self.projectiles);
        projectiles.retain_mut(|projectile| {
            PhysicsSystem::step_projectile(projectile, dt);
            if PhysicsSystem::projectile_collides(projectile, &self.terrain, &self.players) {
                self.detonate(projectile);
                false
            } else {
                true
            }
        });
        self.projectiles = projectiles;
    }

    /// Spawn the blast effect and resolve damage, knockback and kill credit
    fn detonate(&mut self, projectile: &Projectile) {
        self.push_impact(Impact::blast(projectile.x, projectile.y));

        let shooter_team = self
            .players
            .get(&projectile.owner_id)
            .map(|p| p.team)
            .unwrap_or(projectile.owner_team);

        let rules = BlastRules {
            mode: self.mode(),
            friendly_fire: self.options.friendly_fire,
        };
        let credits = CombatSystem::resolve_blast(
            Blast {
                x: projectile.x,
                y: projectile.y,
                shooter_id: projectile.owner_id,
                shooter_team,
            },
            &mut self.players,
            rules,
        );

        for credit in credits {
            self.book_kill(credit);
        }
    }

    fn book_kill(&mut self, credit: KillCredit) {
        if let Some(shooter) = self.players.get_mut(&credit.shooter_id) {
            shooter.score += credit.delta;
        }
        if self.mode().uses_teams() {
            if let Some(team) = credit.shooter_team {
                self.team_scores.add(team, credit.delta);
            }
        }
        debug!(
            match_id = %self.id,
            shooter_id = %credit.shooter_id,
            victim_id = %credit.victim_id,
            delta = credit.delta,
            "Kill booked"
        );
    }

    fn push_impact(&mut self, impact: Impact) {
        if self.impacts.len() < MAX_IMPACTS {
            self.impacts.push(impact);
        }
    }

    fn step_players(&mut self, dt: f32) {
        let mut finished = Vec::new();

        for player in self.players.values_mut() {
            if player.dying {
                player.death_progress += dt / DEATH_ANIMATION_DURATION;
                if player.death_progress >= 1.0 {
                    finished.push((player.id, player.x, player.y));
                }
                continue;
            }
            PhysicsSystem::step_player(player, &self.terrain, dt);
        }

        for (id, x, y) in finished {
            self.push_impact(Impact::death(x, y));
            self.respawn_player(id);
        }
    }

    /// Respawn at a random point on the floor
    pub fn respawn_player(&mut self, id: PlayerId) {
        if !self.players.contains_key(&id) {
            return;
        }
        let x = self
            .rng
            .gen_range(PLAYER_RADIUS..(WIDTH - PLAYER_RADIUS));
        let y = self.terrain.floor_at(x) - PLAYER_RADIUS;
        if let Some(player) = self.players.get_mut(&id) {
            player.respawn_at(x, y);
        }
    }

    /// Place a coin at a random x with enough floor-to-ceiling room
    fn spawn_coin(&mut self) {
        if self.coins.len() >= MAX_COINS {
            return;
        }

        let margin = PLAYER_RADIUS + COIN_RADIUS;
        for _ in 0..COIN_PLACEMENT_ATTEMPTS {
            let x = self
                .rng
                .gen_range(COIN_EDGE_MARGIN..(WIDTH - COIN_EDGE_MARGIN));
            let ceiling = self.terrain.ceiling_at(x);
            let room = self.terrain.floor_at(x) - ceiling - 2.0 * margin;
            if room <= 0.0 {
                continue;
            }
            let y = ceiling + margin + self.rng.gen::<f32>() * room;
            self.coins.push(Coin::new(x, y));
            return;
        }

        debug!(match_id = %self.id, "No room found for coin");
    }

    /// Hand coins to the first live player touching them and drop expired ones
    fn collect_coins(&mut self) {
        if !self.mode().spawns_coins() {
            return;
        }

        let reach = PLAYER_RADIUS + COIN_RADIUS;
        let players = &mut self.players;
        self.coins.retain(|coin| {
            for player in players.values_mut() {
                if player.dying {
                    continue;
                }
                let dx = player.x - coin.x;
                let dy = player.y - coin.y;
                if dx * dx + dy * dy < reach * reach {
                    player.score += 1;
                    return false;
                }
            }
            coin.lifetime > 0.0
        });
    }

    /// Respawn players and drop projectiles whose state went non-finite
    fn repair_non_finite(&mut self) {
        let broken: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| !p.kinematics_finite())
            .map(|p| p.id)
            .collect();

        for id in broken {
            warn!(match_id = %self.id, player_id = %id, "Non-finite player state, respawning");
            self.respawn_player(id);
        }

        let before = self.projectiles.len();
        self.projectiles
            .retain(|p| p.x.is_finite() && p.y.is_finite() && p.vx.is_finite() && p.vy.is_finite());
        if self.projectiles.len() != before {
            warn!(match_id = %self.id, "Dropped non-finite projectiles");
        }
    }

    fn check_win_condition(&mut self) {
        let winner = match self.mode() {
            GameMode::Deathmatch => self.player_at_limit(self.options.kill_limit),
            GameMode::Goldrush => self.player_at_limit(self.options.gold_win_limit),
            GameMode::TeamDeathmatch => self.options.kill_limit.and_then(|limit| {
                (self.team_scores.red >= limit || self.team_scores.blue >= limit)
                    .then(|| self.team_scores.leader())
            }),
        };

        if let Some(winner) = winner {
            self.end_match(Some(winner));
        }
    }

    fn player_at_limit(&self, limit: Option<i32>) -> Option<Winner> {
        let limit = limit?;
        self.players
            .values()
            .find(|p| p.score >= limit)
            .map(|p| Winner::Player { id: p.id })
    }

    /// Winner when the clock runs out: team comparison in team modes, top scorer otherwise
    fn time_up_winner(&self) -> Option<Winner> {
        if self.mode().uses_teams() {
            return Some(self.team_scores.leader());
        }

        let best = self.players.values().map(|p| p.score).max()?;
        let mut leaders = self.players.values().filter(|p| p.score == best);
        match (leaders.next(), leaders.next()) {
            (Some(p), None) => Some(Winner::Player { id: p.id }),
            _ => Some(Winner::Tie),
        }
    }

    fn end_match(&mut self, winner: Option<Winner>) {
        self.phase = MatchPhase::GameOver;
        self.winner = winner;
        info!(match_id = %self.id, winner = ?winner, tick = self.tick, "Match over");
    }
}
