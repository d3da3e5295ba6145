//! Background AI planning workers
//!
//! One named thread per AI player. Requests carry an immutable snapshot of
//! every trail (plus the spatial index built over them) behind an `Arc`;
//! workers share no mutable state with the simulation. Each player has at
//! most one request in flight, and results are collected by polling so the
//! simulation tick never blocks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxBuildHasher;

use crate::config::AiConfig;
use crate::game::spatial::SpatialIndex;
use crate::game::state::{GameState, PlayerId};
use crate::game::systems::ai::{compute_plan, AiPathPlan, AiTuning, PlanError};
use crate::game::systems::collision::ArenaView;
use crate::game::trail::TrailStore;
use crate::util::vec2::Vec2;

/// Frozen copy of the arena handed to workers
#[derive(Debug, Clone)]
pub struct ArenaSnapshot {
    pub tick: u64,
    pub bounds: Vec2,
    pub line_width: f32,
    pub trails: Vec<TrailStore>,
    pub index: SpatialIndex,
}

impl ArenaSnapshot {
    pub fn capture(state: &GameState) -> Self {
        Self {
            tick: state.tick,
            bounds: state.bounds,
            line_width: state.line_width,
            trails: state.trails.clone(),
            index: state.index.clone(),
        }
    }

    pub fn view(&self) -> ArenaView<'_> {
        ArenaView {
            bounds: self.bounds,
            line_width: self.line_width,
            trails: &self.trails,
            index: Some(&self.index),
        }
    }
}

/// One planning job
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub player: PlayerId,
    pub seed: u64,
    pub snapshot: Arc<ArenaSnapshot>,
    pub tuning: AiTuning,
    pub config: AiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerFailure {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlanError),
    #[error("Worker panicked: {0}")]
    Panicked(String),
}

/// Result of one planning job
#[derive(Debug, Clone)]
pub struct PlanResponse {
    pub player: PlayerId,
    /// Tick of the snapshot the plan was computed on
    pub tick: u64,
    pub result: Result<AiPathPlan, WorkerFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum OffloadError {
    #[error("Failed to spawn AI worker for player {player}: {source}")]
    Spawn {
        player: PlayerId,
        #[source]
        source: std::io::Error,
    },
    #[error("AI worker for player {0} disconnected")]
    Disconnected(PlayerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    /// A request for this player is still in flight; nothing was sent
    AlreadyPending,
    /// No worker is registered for this player
    NoWorker,
}

enum WorkerCommand {
    Plan(PlanRequest),
    Shutdown,
}

struct Worker {
    requests: Sender<WorkerCommand>,
    handle: Option<JoinHandle<()>>,
}

fn run_request(request: &PlanRequest) -> Result<AiPathPlan, WorkerFailure> {
    let mut rng = StdRng::seed_from_u64(request.seed);
    let view = request.snapshot.view();
    Ok(compute_plan(&view, request.player, &request.tuning, &request.config, &mut rng)?)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn worker_loop(requests: Receiver<WorkerCommand>, results: Sender<PlanResponse>) {
    while let Ok(command) = requests.recv() {
        match command {
            WorkerCommand::Plan(request) => {
                let result = catch_unwind(AssertUnwindSafe(|| run_request(&request)))
                    .unwrap_or_else(|payload| Err(WorkerFailure::Panicked(panic_message(payload.as_ref()))));
                let response = PlanResponse {
                    player: request.player,
                    tick: request.snapshot.tick,
                    result,
                };
                if results.send(response).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
}

/// Per-player planning workers with at-most-one-in-flight bookkeeping
pub struct AiOffloadChannel {
    workers: HashMap<PlayerId, Worker, FxBuildHasher>,
    pending: HashSet<PlayerId, FxBuildHasher>,
    results_tx: Sender<PlanResponse>,
    results: Receiver<PlanResponse>,
}

impl AiOffloadChannel {
    pub fn new() -> Self {
        let (results_tx, results) = unbounded();
        Self {
            workers: HashMap::default(),
            pending: HashSet::default(),
            results_tx,
            results,
        }
    }

    /// Start the worker thread for `player` (no-op if it already has one)
    pub fn spawn_worker(&mut self, player: PlayerId) -> Result<(), OffloadError> {
        if self.workers.contains_key(&player) {
            return Ok(());
        }
        let (requests_tx, requests_rx) = bounded(1);
        let results_tx = self.results_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("ai-worker-{}", player))
            .spawn(move || worker_loop(requests_rx, results_tx))
            .map_err(|source| OffloadError::Spawn { player, source })?;

        self.workers.insert(
            player,
            Worker {
                requests: requests_tx,
                handle: Some(handle),
            },
        );
        tracing::debug!(player, "AI worker started");
        Ok(())
    }

    /// Send a planning request unless one is already in flight for the player
    pub fn dispatch(&mut self, request: PlanRequest) -> Result<DispatchOutcome, OffloadError> {
        let player = request.player;
        if self.pending.contains(&player) {
            return Ok(DispatchOutcome::AlreadyPending);
        }
        let Some(worker) = self.workers.get(&player) else {
            return Ok(DispatchOutcome::NoWorker);
        };

        match worker.requests.try_send(WorkerCommand::Plan(request)) {
            Ok(()) => {
                self.pending.insert(player);
                Ok(DispatchOutcome::Dispatched)
            }
            Err(TrySendError::Full(_)) => Ok(DispatchOutcome::AlreadyPending),
            Err(TrySendError::Disconnected(_)) => {
                self.workers.remove(&player);
                Err(OffloadError::Disconnected(player))
            }
        }
    }

    /// Collect every finished response without blocking
    pub fn poll(&mut self) -> Vec<PlanResponse> {
        let responses: Vec<PlanResponse> = self.results.try_iter().collect();
        for response in &responses {
            self.pending.remove(&response.player);
        }
        responses
    }

    /// Wait up to `timeout` for one response
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<PlanResponse> {
        match self.results.recv_timeout(timeout) {
            Ok(response) => {
                self.pending.remove(&response.player);
                Some(response)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    #[inline]
    pub fn is_pending(&self, player: PlayerId) -> bool {
        self.pending.contains(&player)
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop and join every worker; in-flight results are dropped
    pub fn shutdown(&mut self) {
        for worker in self.workers.values() {
            let _ = worker.requests.send(WorkerCommand::Shutdown);
        }
        for (player, mut worker) in self.workers.drain() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    tracing::warn!(player, "AI worker thread panicked");
                }
            }
        }
        let dropped = self.results.try_iter().count();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded AI results at shutdown");
        }
        self.pending.clear();
    }
}

impl Default for AiOffloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AiOffloadChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
