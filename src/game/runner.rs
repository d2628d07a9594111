//! Match tasks: the fixed-rate tick loop and the registry of running matches

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, tick_duration};
use crate::ws::protocol::ServerMsg;

use super::r#match::{MatchOptions, MatchState};
use super::snapshot::MatchSnapshot;
use super::InputCommand;

/// How long a match may sit without anyone ever joining
const EMPTY_MATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Requests delivered to a match task between ticks
#[derive(Debug, Clone)]
pub enum MatchCommand {
    Join {
        player_id: Uuid,
        display_name: String,
    },
    Leave {
        player_id: Uuid,
    },
    Input {
        player_id: Uuid,
        command: InputCommand,
    },
    Reset,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Too many active matches")]
    TooManyMatches,

    #[error("Match has closed")]
    MatchClosed,
}

/// Handle to a running match
#[derive(Debug, Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub options: MatchOptions,
    command_tx: mpsc::Sender<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    latest: watch::Receiver<Arc<MatchSnapshot>>,
    player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Queue a command for the next tick
    pub async fn send(&self, command: MatchCommand) -> Result<(), RegistryError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RegistryError::MatchClosed)
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    /// Most recently published snapshot
    pub fn latest_snapshot(&self) -> Arc<MatchSnapshot> {
        self.latest.borrow().clone()
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: Arc<DashMap<Uuid, MatchHandle>>,
    /// Reserved slots, held from `create` until the match task is reaped
    slots: Arc<AtomicUsize>,
    max_matches: usize,
}

impl MatchRegistry {
    pub fn new(max_matches: usize) -> Self {
        Self {
            matches: Arc::new(DashMap::new()),
            slots: Arc::new(AtomicUsize::new(0)),
            max_matches,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    /// Start a new match task and register it.
    ///
    /// The match is removed from the registry when its task finishes or panics.
    pub fn create(
        &self,
        options: MatchOptions,
        tick_rate: u32,
    ) -> Result<MatchHandle, RegistryError> {
        let reserved = self
            .slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_matches).then_some(n + 1)
            });
        if reserved.is_err() {
            warn!(max_matches = self.max_matches, "Refusing to create match");
            return Err(RegistryError::TooManyMatches);
        }

        let id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (game_match, handle) = GameMatch::new(id, options, seed, tick_rate);
        self.matches.insert(id, handle.clone());

        let matches = Arc::clone(&self.matches);
        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            let task = tokio::spawn(game_match.run());
            match task.await {
                Ok(()) => debug!(match_id = %id, "Match task finished"),
                Err(e) if e.is_panic() => {
                    error!(match_id = %id, "Match task panicked, dropping match")
                }
                Err(e) => warn!(match_id = %id, error = %e, "Match task cancelled"),
            }
            matches.remove(&id);
            slots.fetch_sub(1, Ordering::AcqRel);
        });

        info!(match_id = %id, mode = ?options.mode, seed, "Match created");
        Ok(handle)
    }
}

/// The authoritative game match
pub struct GameMatch {
    state: MatchState,
    tick_rate: u32,
    command_rx: mpsc::Receiver<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    latest_tx: watch::Sender<Arc<MatchSnapshot>>,
    player_count: Arc<AtomicUsize>,
    had_players: bool,
}

impl GameMatch {
    pub fn new(
        id: Uuid,
        options: MatchOptions,
        seed: u64,
        tick_rate: u32,
    ) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let state = MatchState::new(id, options, seed);
        let (latest_tx, latest) = watch::channel(Arc::new(state.snapshot()));

        let handle = MatchHandle {
            id,
            options,
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            latest,
            player_count: Arc::clone(&player_count),
        };

        let game_match = Self {
            state,
            tick_rate,
            command_rx,
            snapshot_tx,
            latest_tx,
            player_count,
            had_players: false,
        };
        (game_match, handle)
    }

    /// Run the tick loop until the last player leaves, or nobody joins in time
    pub async fn run(mut self) {
        let started = Instant::now();
        info!(match_id = %self.state.id, tick_rate = self.tick_rate, "Match started");

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = tick_delta(self.tick_rate);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }
            if self.had_players && self.state.players.is_empty() {
                break;
            }
            if !self.had_players && started.elapsed() >= EMPTY_MATCH_TIMEOUT {
                info!(match_id = %self.state.id, "Nobody joined, closing match");
                break;
            }

            self.state.step(dt);
            self.publish();
        }

        info!(match_id = %self.state.id, ticks = self.state.tick, "Match closed");
    }

    /// Apply queued commands. Returns false once every handle is gone.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Join {
                player_id,
                display_name,
            } => {
                if self.state.add_player(player_id, display_name) {
                    self.had_players = true;
                }
            }
            MatchCommand::Leave { player_id } => {
                self.state.remove_player(player_id);
            }
            MatchCommand::Input { player_id, command } => {
                self.state.submit_input(player_id, command);
            }
            MatchCommand::Reset => self.state.reset(),
        }
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);
    }

    fn publish(&self) {
        let snapshot = Arc::new(self.state.snapshot());
        self.latest_tx.send_replace(Arc::clone(&snapshot));
        // No receivers is fine
        let _ = self.snapshot_tx.send(ServerMsg::GameState { snapshot });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameMode;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_test::{assert_err, assert_ok};

    async fn next_populated(rx: &mut broadcast::Receiver<ServerMsg>) -> Arc<MatchSnapshot> {
        loop {
            match rx.recv().await {
                Ok(ServerMsg::GameState { snapshot }) if !snapshot.players.is_empty() => {
                    return snapshot
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("match closed early"),
            }
        }
    }

    #[tokio::test]
    async fn match_publishes_snapshots_and_closes_when_empty() {
        let registry = MatchRegistry::new(4);
        let handle = assert_ok!(registry.create(MatchOptions::new(GameMode::Deathmatch), 120));
        let mut rx = handle.subscribe();

        let player_id = Uuid::new_v4();
        assert_ok!(
            handle
                .send(MatchCommand::Join {
                    player_id,
                    display_name: "runner".into(),
                })
                .await
        );

        let snapshot = assert_ok!(timeout(Duration::from_secs(2), next_populated(&mut rx)).await);
        assert_eq!(snapshot.players[0].id, player_id);
        assert_eq!(handle.player_count(), 1);
        assert_eq!(registry.total_players(), 1);
        assert!(handle.latest_snapshot().tick >= 1);

        assert_ok!(handle.send(MatchCommand::Leave { player_id }).await);
        let closed = timeout(Duration::from_secs(2), async {
            while registry.get(&handle.id).is_some() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert_ok!(closed);
        assert_eq!(registry.active_matches(), 0);
    }

    #[tokio::test]
    async fn registry_enforces_match_cap() {
        let registry = MatchRegistry::new(1);
        assert_ok!(registry.create(MatchOptions::new(GameMode::Goldrush), 60));
        let refused = registry.create(MatchOptions::new(GameMode::Goldrush), 60);
        assert!(matches!(assert_err!(refused), RegistryError::TooManyMatches));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_exceed_cap() {
        let registry = Arc::new(MatchRegistry::new(3));
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .create(MatchOptions::new(GameMode::Deathmatch), 60)
                        .is_ok()
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            if assert_ok!(attempt.await) {
                created += 1;
            }
        }
        assert_eq!(created, 3);
        assert_eq!(registry.active_matches(), 3);
    }
}
