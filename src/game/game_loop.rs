//! Round state machine and per-tick orchestration
//!
//! `SimulationLoop` owns the whole simulation context: game state, finish
//! order, AI bookkeeping, the optional worker channel and the human input
//! buffer. Each tick runs, in order: index refresh, modifier expiry, input
//! drain, worker result merge, turn resolution, movement, powerups,
//! collisions and the round-end check.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::{DifficultySettings, SimConfig};
use crate::game::ai_worker::{AiOffloadChannel, ArenaSnapshot, DispatchOutcome, OffloadError, PlanRequest};
use crate::game::constants::round::MIN_PLAYERS;
use crate::game::input_buffer::{steer, InputBuffer, InputSender, KeyboardState};
use crate::game::match_result::{check_round_end, FinishOrder, RoundEndReason, RoundResult};
use crate::game::render::{RenderFrame, Renderer};
use crate::game::state::{
    corner_spawn, ControlMapping, ControlSource, GameState, KeyCode, Player, PlayerId, SpawnPoint,
};
use crate::game::systems::ai::{decision_seed, AiDirector, AiTuning};
use crate::game::systems::collision::{check_player, CollisionKind};
use crate::game::trail::{GapTimer, TrailStore};
use crate::util::vec2::{Vec2, HEADING_EPSILON};

#[cfg(feature = "powerups")]
use crate::game::constants::powerup;
#[cfg(feature = "powerups")]
use crate::game::render::PowerupView;
#[cfg(feature = "powerups")]
use crate::game::systems::powerups::{PowerupKind, PowerupManager};

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    Idle,
    Running,
    RoundOver,
}

/// One participant of a round
#[derive(Debug, Clone)]
pub struct PlayerSetup {
    pub name: String,
    pub control: ControlSource,
    /// Explicit spawn; corner layout when `None`
    pub spawn: Option<SpawnPoint>,
}

impl PlayerSetup {
    pub fn ai(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control: ControlSource::Ai,
            spawn: None,
        }
    }

    pub fn human(name: impl Into<String>, mapping: Option<ControlMapping>) -> Self {
        Self {
            name: name.into(),
            control: ControlSource::Human(mapping),
            spawn: None,
        }
    }

    pub fn at(mut self, position: Vec2, heading: Vec2) -> Self {
        self.spawn = Some(SpawnPoint { position, heading });
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("A round needs at least {min} players, got {count}")]
    TooFewPlayers { count: usize, min: usize },
    #[error("Human player '{0}' has no control mapping")]
    MissingControlMapping(String),
    #[error("Key {0} is bound more than once")]
    ConflictingControlMapping(KeyCode),
    #[error("A round is already running")]
    RoundAlreadyRunning,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Offload(#[from] OffloadError),
}

/// Events produced by a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    PlayerEliminated {
        player: PlayerId,
        tick: u64,
        cause: CollisionKind,
    },
    #[cfg(feature = "powerups")]
    PowerupCollected { player: PlayerId, kind: PowerupKind },
    RoundOver(RoundResult),
}

fn check_mappings(setups: &[PlayerSetup]) -> Result<(), SetupError> {
    let mut bound: Vec<KeyCode> = Vec::new();
    for setup in setups {
        if let ControlSource::Human(mapping) = setup.control {
            let mapping = mapping.ok_or_else(|| SetupError::MissingControlMapping(setup.name.clone()))?;
            for key in [mapping.left, mapping.right] {
                if bound.contains(&key) {
                    return Err(SetupError::ConflictingControlMapping(key));
                }
                bound.push(key);
            }
        }
    }
    Ok(())
}

/// The simulation context for consecutive rounds
pub struct SimulationLoop {
    config: SimConfig,
    settings: DifficultySettings,
    tuning: AiTuning,
    phase: SimPhase,
    state: GameState,
    finish_order: FinishOrder,
    director: AiDirector,
    offload: Option<AiOffloadChannel>,
    input: InputBuffer,
    keyboard: KeyboardState,
    rng: StdRng,
    round: u64,
    #[cfg(feature = "powerups")]
    powerups: PowerupManager,
}

impl SimulationLoop {
    pub fn new(config: SimConfig) -> Result<Self, SetupError> {
        config.validate().map_err(SetupError::InvalidConfig)?;
        let settings = config.settings();
        let tuning = AiTuning::from_config(&config);
        let state = GameState::new(
            Vec2::new(config.arena_width, config.arena_height),
            config.line_width,
            config.cell_size(),
        );

        Ok(Self {
            settings,
            tuning,
            phase: SimPhase::Idle,
            state,
            finish_order: FinishOrder::new(),
            director: AiDirector::new(),
            offload: None,
            input: InputBuffer::default(),
            keyboard: KeyboardState::new(),
            rng: StdRng::seed_from_u64(config.seed),
            round: 0,
            #[cfg(feature = "powerups")]
            powerups: PowerupManager::new(),
            config,
        })
    }

    /// Reset the arena and enter `Running` with the given roster
    pub fn start_round(&mut self, setups: &[PlayerSetup]) -> Result<(), SetupError> {
        if self.phase == SimPhase::Running {
            return Err(SetupError::RoundAlreadyRunning);
        }
        if setups.len() < MIN_PLAYERS {
            return Err(SetupError::TooFewPlayers {
                count: setups.len(),
                min: MIN_PLAYERS,
            });
        }
        check_mappings(setups)?;

        self.round += 1;
        self.rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(self.round));
        self.state = GameState::new(
            Vec2::new(self.config.arena_width, self.config.arena_height),
            self.config.line_width,
            self.config.cell_size(),
        );
        self.director = AiDirector::new();
        self.finish_order.clear();
        self.keyboard.release_all();
        let stale = self.input.drain().count();
        if stale > 0 {
            debug!(stale, "Dropped input events from the previous round");
        }
        #[cfg(feature = "powerups")]
        self.powerups.clear();

        let bounds = self.state.bounds;
        for (slot, setup) in setups.iter().enumerate() {
            let fallback = corner_spawn(slot, bounds);
            let spawn = setup.spawn.unwrap_or(fallback);
            let heading = spawn
                .heading
                .try_normalize(HEADING_EPSILON)
                .unwrap_or(fallback.heading);
            let speed = if setup.control.is_ai() {
                self.settings.ai_tick_speed()
            } else {
                self.settings.player_speed
            };
            let gap_timer = GapTimer::new(self.settings.gap_frequency, &mut self.rng);
            let player = Player::new(slot, setup.name.clone(), setup.control, speed, heading, gap_timer);
            let trail = TrailStore::seeded(spawn.position, spawn.position + heading * speed);
            let id = self.state.add_player(player, trail);
            if setup.control.is_ai() {
                self.director.register(id);
            }
        }
        self.state.refresh_index();

        self.offload = None;
        if self.config.ai_offload {
            let mut channel = AiOffloadChannel::new();
            for player in self.state.players.iter().filter(|p| p.is_ai()) {
                channel.spawn_worker(player.id)?;
            }
            self.offload = Some(channel);
        }

        self.phase = SimPhase::Running;
        info!(
            round = self.round,
            players = setups.len(),
            ai = self.director.len(),
            offload = self.config.ai_offload,
            "Round started"
        );
        Ok(())
    }

    /// Advance the simulation by one tick. A no-op outside `Running`.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.phase != SimPhase::Running {
            return events;
        }

        self.state.tick += 1;
        let tick = self.state.tick;

        if tick % self.config.spatial_refresh_interval == 0 {
            let inserted = self.state.index.refresh(&self.state.trails);
            debug!(tick, inserted, "Spatial index refreshed");
        }

        for player in self.state.players.iter_mut() {
            player.expire_modifiers(tick);
        }

        self.keyboard.drain_from(&self.input);
        self.merge_worker_results();

        let turns = self.resolve_turns(tick);
        self.advance_players(&turns);

        #[cfg(feature = "powerups")]
        if self.config.powerups {
            for collected in self.powerups.update(&mut self.state, &mut self.rng) {
                events.push(SimEvent::PowerupCollected {
                    player: collected.player,
                    kind: collected.kind,
                });
            }
        }

        self.resolve_collisions(tick, &mut events);

        if let Some(reason) = check_round_end(self.state.alive_count(), tick, self.config.max_round_ticks) {
            let result = self.finish_round(reason);
            events.push(SimEvent::RoundOver(result));
        }

        events
    }

    /// Install finished worker plans; results for eliminated players are dropped
    fn merge_worker_results(&mut self) {
        let Some(offload) = self.offload.as_mut() else {
            return;
        };
        for response in offload.poll() {
            let player = response.player;
            let alive = self.state.player(player).map_or(false, |p| p.alive);
            if !alive {
                debug!(player, "Discarding AI plan for eliminated player");
                continue;
            }
            match response.result {
                Ok(plan) => {
                    debug!(player, computed_at = response.tick, turn = plan.first_turn(), "AI plan arrived");
                    self.director.install(player, plan);
                }
                Err(e) => {
                    warn!(player, "AI worker failed: {}", e);
                    self.director.fail(player);
                }
            }
        }
    }

    /// Turn command (degrees) per player for this tick; 0 for eliminated players
    fn resolve_turns(&mut self, tick: u64) -> Vec<f32> {
        let players = &self.state.players;
        let due = self
            .director
            .due_players(self.tuning.reaction_interval, |id| players.get(id).map_or(false, |p| p.alive));

        if !due.is_empty() {
            match self.offload.as_mut() {
                Some(offload) => {
                    let snapshot = Arc::new(ArenaSnapshot::capture(&self.state));
                    for &player in &due {
                        let request = PlanRequest {
                            player,
                            seed: decision_seed(self.config.seed, tick, player),
                            snapshot: Arc::clone(&snapshot),
                            tuning: self.tuning,
                            config: self.config.ai.clone(),
                        };
                        match offload.dispatch(request) {
                            Ok(DispatchOutcome::Dispatched) => self.director.mark_pending(player),
                            Ok(DispatchOutcome::AlreadyPending) => {}
                            Ok(DispatchOutcome::NoWorker) => {
                                warn!(player, "No AI worker registered");
                                self.director.fail(player);
                            }
                            Err(e) => {
                                warn!(player, "AI dispatch failed: {}", e);
                                self.director.fail(player);
                            }
                        }
                    }
                }
                None => {
                    self.director.plan_sync(
                        &self.state.view(),
                        &due,
                        &self.tuning,
                        &self.config.ai,
                        self.config.seed,
                        tick,
                    );
                }
            }
        }

        let max_turn = self.settings.angle_delta;
        let mut turns = vec![0.0; self.state.players.len()];
        for (id, player) in self.state.players.iter().enumerate() {
            if !player.alive {
                continue;
            }
            turns[id] = match player.control {
                ControlSource::Human(Some(mapping)) => steer(&self.keyboard, mapping, max_turn),
                ControlSource::Human(None) => 0.0,
                ControlSource::Ai => self.director.next_turn(id),
            };
        }
        turns
    }

    /// Append one new head per live player
    fn advance_players(&mut self, turns: &[f32]) {
        for (id, player) in self.state.players.iter_mut().enumerate() {
            if !player.alive {
                continue;
            }
            let Some(trail) = self.state.trails.get_mut(id) else {
                continue;
            };
            let Some(head) = trail.head() else {
                continue;
            };

            let heading = trail.heading().unwrap_or(player.heading);
            let turn = turns.get(id).copied().unwrap_or(0.0);
            let heading = heading
                .rotate_degrees(turn)
                .try_normalize(HEADING_EPSILON)
                .unwrap_or(heading);
            player.heading = heading;

            let gap = player.gap_timer.advance(&mut self.rng) || player.is_invulnerable();
            if let Err(e) = trail.push(head + heading * player.speed, gap) {
                warn!(player = id, "Failed to extend trail: {}", e);
            }
        }
    }

    fn resolve_collisions(&mut self, tick: u64, events: &mut Vec<SimEvent>) {
        let hits: Vec<(PlayerId, CollisionKind)> = (0..self.state.players.len())
            .filter_map(|id| check_player(&self.state, id).map(|kind| (id, kind)))
            .collect();

        for (id, cause) in hits {
            if let Some(player) = self.state.player_mut(id) {
                player.alive = false;
                player.eliminated_at = Some(tick);
            }
            if let Some(trail) = self.state.trails.get_mut(id) {
                trail.freeze();
            }
            self.finish_order.record(id);
            info!(player = id, tick, ?cause, "Player eliminated");
            events.push(SimEvent::PlayerEliminated {
                player: id,
                tick,
                cause,
            });
        }
    }

    /// Rank the survivors, report the round and release the workers
    fn finish_round(&mut self, reason: RoundEndReason) -> RoundResult {
        let survivors: Vec<PlayerId> = self
            .state
            .players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
        for &id in &survivors {
            self.finish_order.record(id);
        }

        let winner = match reason {
            RoundEndReason::LastSurvivor => survivors.first().copied(),
            _ => None,
        };
        let result = RoundResult {
            finish_order: self.finish_order.as_slice().to_vec(),
            ticks: self.state.tick,
            winner,
            reason,
        };

        if let Some(mut offload) = self.offload.take() {
            offload.shutdown();
        }
        self.phase = SimPhase::RoundOver;
        info!(
            round = self.round,
            ticks = result.ticks,
            winner = ?result.winner,
            ?reason,
            "Round over: {:?}",
            result.finish_order
        );
        result
    }

    /// Tick until the round ends or `tick_limit` ticks have run
    pub fn run_until_round_over(&mut self, tick_limit: u64) -> Option<RoundResult> {
        for _ in 0..tick_limit {
            for event in self.tick() {
                if let SimEvent::RoundOver(result) = event {
                    return Some(result);
                }
            }
        }
        None
    }

    /// Hand the current frame to `renderer`
    pub fn render(&self, renderer: &mut dyn Renderer) {
        #[allow(unused_mut)]
        let mut frame = RenderFrame::from_state(&self.state);
        #[cfg(feature = "powerups")]
        {
            frame.powerups = self
                .powerups
                .active()
                .iter()
                .map(|p| PowerupView {
                    position: p.position,
                    radius: powerup::RADIUS,
                    kind: p.kind.name(),
                })
                .collect();
        }
        renderer.render(&frame);
    }

    /// Producer handle for human control events
    pub fn input_sender(&self) -> InputSender {
        self.input.sender()
    }

    #[inline]
    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    #[inline]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    #[inline]
    pub fn finish_order(&self) -> &FinishOrder {
        &self.finish_order
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[inline]
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn director(&self) -> &AiDirector {
        &self.director
    }

    /// Requests currently in flight on workers
    pub fn pending_ai_requests(&self) -> usize {
        self.offload.as_ref().map_or(0, |o| o.pending_count())
    }
}
