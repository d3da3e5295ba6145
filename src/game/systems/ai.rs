use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

use crate::config::{AiConfig, AiPolicy, SimConfig};
use crate::game::constants::ai::*;
use crate::game::constants::sensor::SELF_SKIP;
use crate::game::state::PlayerId;
use crate::game::systems::collision::{trail_contact, wall_contact, ArenaView};
use crate::game::systems::planner::plan_long_horizon;
use crate::game::systems::sensor::{cast_fan, cast_ray, default_fan, reading_at, SensorSpec};
use crate::util::vec2::Vec2;

/// A run of identical turn commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSegment {
    /// Degrees per tick (positive = right)
    pub turn: f32,
    pub ticks: u32,
}

/// Committed short-term plan: fixed-length constant-turn segments plus a cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiPathPlan {
    segments: SmallVec<[PlanSegment; 8]>,
    /// Current segment
    cursor: usize,
    /// Ticks consumed from the current segment
    used: u32,
}

impl AiPathPlan {
    pub fn from_segments(segments: impl IntoIterator<Item = PlanSegment>) -> Self {
        Self {
            segments: segments.into_iter().filter(|s| s.ticks > 0).collect(),
            cursor: 0,
            used: 0,
        }
    }

    /// One segment holding `turn` for `ticks` ticks
    pub fn hold(turn: f32, ticks: u32) -> Self {
        Self::from_segments([PlanSegment { turn, ticks }])
    }

    pub fn straight(ticks: u32) -> Self {
        Self::hold(0.0, ticks)
    }

    /// Consume one tick of the plan
    pub fn next_turn(&mut self) -> Option<f32> {
        let segment = *self.segments.get(self.cursor)?;
        self.used += 1;
        if self.used >= segment.ticks {
            self.cursor += 1;
            self.used = 0;
        }
        Some(segment.turn)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.segments.len()
    }

    #[inline]
    pub fn segments(&self) -> &[PlanSegment] {
        &self.segments
    }

    /// Unconsumed ticks across all segments
    pub fn remaining_ticks(&self) -> u32 {
        self.segments
            .iter()
            .skip(self.cursor)
            .map(|s| s.ticks)
            .sum::<u32>()
            .saturating_sub(self.used)
    }

    /// Turn of the first segment (0 for an empty plan)
    pub fn first_turn(&self) -> f32 {
        self.segments.first().map(|s| s.turn).unwrap_or(0.0)
    }
}

/// Difficulty-derived numbers the decision logic needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiTuning {
    /// Maximum turn per tick (degrees)
    pub max_turn: f32,
    /// Probability of a random hard turn per decision
    pub randomness: f32,
    /// Planner forward-simulation depth (ticks)
    pub look_ahead: u32,
    /// Ticks between re-decisions
    pub reaction_interval: u64,
    /// AI movement per tick (px)
    pub speed: f32,
}

impl AiTuning {
    pub fn from_config(config: &SimConfig) -> Self {
        let settings = config.settings();
        Self {
            max_turn: settings.angle_delta,
            randomness: config.ai_randomness(),
            look_ahead: settings.look_ahead,
            reaction_interval: settings.reaction_interval(),
            speed: settings.ai_tick_speed(),
        }
    }

    /// Ticks a fan or pairwise decision is held for
    pub fn hold_ticks(&self, config: &AiConfig) -> u32 {
        let interval = u32::try_from(self.reaction_interval).unwrap_or(u32::MAX);
        config.plan_steps.max(interval).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("Trail of player {player} has {len} points, planning needs 2")]
    TrailTooShort { player: PlayerId, len: usize },
}

#[inline]
fn random_hard_turn<R: Rng + ?Sized>(max_turn: f32, rng: &mut R) -> f32 {
    if rng.gen_bool(0.5) {
        max_turn
    } else {
        -max_turn
    }
}

/// Hard turn away from a wall the head is approaching within `distance`.
///
/// Top and bottom approaches break the tie with the horizontal heading
/// component so the turn always swings away from the wall.
pub fn wall_emergency(head: Vec2, heading: Vec2, bounds: Vec2, distance: f32, max_turn: f32) -> Option<f32> {
    if head.x < distance && heading.x < 0.0 {
        return Some(max_turn);
    }
    if bounds.x - head.x < distance && heading.x > 0.0 {
        return Some(-max_turn);
    }
    if head.y < distance && heading.y < 0.0 {
        return Some(if heading.x > 0.0 { max_turn } else { -max_turn });
    }
    if bounds.y - head.y < distance && heading.y > 0.0 {
        return Some(if heading.x > 0.0 { -max_turn } else { max_turn });
    }
    None
}

/// Prefer the left side only when it is clearer by more than `margin`
#[inline]
fn open_side(left: f32, right: f32, margin: f32, magnitude: f32) -> f32 {
    if left > right + margin {
        -magnitude
    } else {
        magnitude
    }
}

/// Graduated sensor-fan decision for one tick.
///
/// Returns a turn in degrees per tick, one of `±max_turn`, `±max_turn / 2`
/// or 0.
pub fn decide_turn<R: Rng + ?Sized>(
    view: &ArenaView<'_>,
    player: PlayerId,
    head: Vec2,
    heading: Vec2,
    tuning: &AiTuning,
    config: &AiConfig,
    rng: &mut R,
) -> f32 {
    let max_turn = tuning.max_turn;

    if rng.gen::<f32>() < tuning.randomness {
        return random_hard_turn(max_turn, rng);
    }

    if let Some(turn) = wall_emergency(head, heading, view.bounds, config.wall_emergency_distance, max_turn) {
        return turn;
    }

    let fan = cast_fan(view, head, heading, &default_fan(), player);
    let Some(closest) = fan.first().copied() else {
        return 0.0;
    };
    let side = |angle: f32| reading_at(&fan, angle).map(|r| r.distance).unwrap_or(0.0);
    let away_from_closest = if closest.is_left() { max_turn } else { -max_turn };

    // Immediate and danger bands share one hard-turn response
    if closest.distance < config.immediate_distance.max(config.danger_distance) {
        if closest.angle == 0.0 {
            return open_side(side(-30.0), side(30.0), config.danger_side_margin, max_turn);
        }
        return away_from_closest;
    }

    if closest.distance < config.caution_distance {
        if closest.angle.abs() <= 5.0 {
            return open_side(side(-45.0), side(45.0), config.caution_side_margin, max_turn);
        }
        return away_from_closest;
    }

    let forward_hit = fan
        .iter()
        .any(|r| r.angle.abs() <= 15.0 && r.hit());
    if forward_hit {
        return open_side(side(-60.0), side(60.0), config.long_range_side_margin, max_turn * 0.5);
    }

    if rng.gen_bool(config.exploration_probability) {
        return random_hard_turn(max_turn * 0.5, rng);
    }
    0.0
}

/// Pairwise policy: two 30° side sensors, hard turn away from the nearer side
pub fn decide_pairwise<R: Rng + ?Sized>(
    view: &ArenaView<'_>,
    player: PlayerId,
    head: Vec2,
    heading: Vec2,
    tuning: &AiTuning,
    rng: &mut R,
) -> f32 {
    if rng.gen::<f32>() < tuning.randomness {
        return random_hard_turn(tuning.max_turn, rng);
    }

    let left = SensorSpec::new(-PAIRWISE_SENSOR_ANGLE, PAIRWISE_SENSOR_LENGTH);
    let right = SensorSpec::new(PAIRWISE_SENSOR_ANGLE, PAIRWISE_SENSOR_LENGTH);
    let left_distance = cast_ray(view, head, heading.rotate_degrees(left.angle), left.max_length, player);
    let right_distance = cast_ray(view, head, heading.rotate_degrees(right.angle), right.max_length, player);

    if left_distance < right_distance {
        tuning.max_turn
    } else if right_distance < left_distance {
        -tuning.max_turn
    } else {
        0.0
    }
}

/// Clear distance along `direction` before a wall or trail blocks the path
fn escape_space(view: &ArenaView<'_>, player: PlayerId, head: Vec2, direction: Vec2) -> f32 {
    let mut clear = 0.0;
    let mut distance = ESCAPE_SAMPLE_STEP;
    while distance <= ESCAPE_SAMPLE_MAX {
        let sample = head + direction * distance;
        if wall_contact(sample, view.line_width, view.bounds)
            || trail_contact(view, sample, view.line_width, player, SELF_SKIP).is_some()
        {
            break;
        }
        clear = distance;
        distance += ESCAPE_SAMPLE_STEP;
    }
    clear
}

/// Cheap fatal-distance check run before any planning.
///
/// Fires on a wall within the reflex distance while heading toward it, or on
/// any solid trail point near the spot just ahead of the head. In the
/// trail case the turn goes toward the side with more room.
pub fn emergency_reflex(
    view: &ArenaView<'_>,
    player: PlayerId,
    head: Vec2,
    heading: Vec2,
    max_turn: f32,
    config: &AiConfig,
) -> Option<f32> {
    if let Some(turn) = wall_emergency(head, heading, view.bounds, config.reflex_wall_distance, max_turn) {
        return Some(turn);
    }

    let ahead = head + heading * config.reflex_look_ahead;
    let radius = view.line_width * REFLEX_RADIUS_FACTOR;
    let threatened = trail_contact(view, ahead, radius, player, SELF_SKIP).is_some();
    if !threatened {
        return None;
    }

    let left = escape_space(view, player, head, heading.rotate_degrees(-90.0));
    let right = escape_space(view, player, head, heading.rotate_degrees(90.0));
    tracing::debug!(player, left, right, "Emergency reflex");
    Some(if left > right { -max_turn } else { max_turn })
}

/// Compute a fresh plan for `player` under the configured policy.
///
/// The randomness override applies to every policy. The planner policy runs
/// the emergency reflex before any forward simulation.
pub fn compute_plan<R: Rng + ?Sized>(
    view: &ArenaView<'_>,
    player: PlayerId,
    tuning: &AiTuning,
    config: &AiConfig,
    rng: &mut R,
) -> Result<AiPathPlan, PlanError> {
    let trail = view.trails.trail(player).ok_or(PlanError::UnknownPlayer(player))?;
    if trail.len() < 2 {
        return Err(PlanError::TrailTooShort {
            player,
            len: trail.len(),
        });
    }
    let hold = tuning.hold_ticks(config);
    let (Some(head), Some(heading)) = (trail.head(), trail.heading()) else {
        tracing::debug!(player, "Degenerate heading, holding straight");
        return Ok(AiPathPlan::straight(hold));
    };

    let plan = match config.policy {
        AiPolicy::SensorFan => {
            AiPathPlan::hold(decide_turn(view, player, head, heading, tuning, config, rng), hold)
        }
        AiPolicy::Pairwise => AiPathPlan::hold(decide_pairwise(view, player, head, heading, tuning, rng), hold),
        AiPolicy::Planner => {
            if rng.gen::<f32>() < tuning.randomness {
                AiPathPlan::hold(random_hard_turn(tuning.max_turn, rng), hold)
            } else if let Some(turn) = emergency_reflex(view, player, head, heading, tuning.max_turn, config) {
                AiPathPlan::hold(turn, 1)
            } else {
                plan_long_horizon(view, player, head, heading, tuning, config)
            }
        }
    };
    Ok(plan)
}

/// Seed for one player's decision on one tick
#[inline]
pub fn decision_seed(base: u64, tick: u64, player: PlayerId) -> u64 {
    base ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (player as u64).wrapping_mul(0xD1B5_4A32_D192_ED03)
}

/// Per-AI bookkeeping
#[derive(Debug, Clone, Default)]
pub struct AiState {
    pub plan: Option<AiPathPlan>,
    pub ticks_since_request: u64,
    /// A request is in flight on a worker
    pub pending: bool,
    pub failures: u32,
}

impl AiState {
    /// Due once the interval has elapsed or the plan ran out, never while pending
    pub fn is_due(&self, interval: u64) -> bool {
        if self.pending {
            return false;
        }
        let exhausted = self.plan.as_ref().map_or(true, |p| p.is_exhausted());
        exhausted || self.ticks_since_request >= interval
    }
}

/// Plan cadence and plan consumption for every AI player
#[derive(Debug, Default)]
pub struct AiDirector {
    states: HashMap<PlayerId, AiState, FxBuildHasher>,
}

impl AiDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, player: PlayerId) {
        self.states.insert(player, AiState::default());
    }

    pub fn unregister(&mut self, player: PlayerId) -> Option<AiState> {
        self.states.remove(&player)
    }

    pub fn get(&self, player: PlayerId) -> Option<&AiState> {
        self.states.get(&player)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Advance every cadence counter by one tick and return the players that
    /// need a new plan, in ascending id order. Their counters restart.
    pub fn due_players(&mut self, interval: u64, is_alive: impl Fn(PlayerId) -> bool) -> Vec<PlayerId> {
        let mut due: Vec<PlayerId> = self
            .states
            .iter_mut()
            .filter(|(id, _)| is_alive(**id))
            .filter_map(|(&id, state)| {
                state.ticks_since_request += 1;
                if state.is_due(interval) {
                    state.ticks_since_request = 0;
                    Some(id)
                } else {
                    None
                }
            })
            .collect();
        due.sort_unstable();
        due
    }

    pub fn mark_pending(&mut self, player: PlayerId) {
        if let Some(state) = self.states.get_mut(&player) {
            state.pending = true;
        }
    }

    /// Install a new plan, replacing any previous one; returns false for unknown players
    pub fn install(&mut self, player: PlayerId, plan: AiPathPlan) -> bool {
        match self.states.get_mut(&player) {
            Some(state) => {
                state.plan = Some(plan);
                state.pending = false;
                true
            }
            None => false,
        }
    }

    /// Record a failed planning cycle: the player goes straight for one tick
    pub fn fail(&mut self, player: PlayerId) {
        if let Some(state) = self.states.get_mut(&player) {
            state.failures += 1;
            state.plan = Some(AiPathPlan::straight(1));
            state.pending = false;
        }
    }

    /// Plan every due player on the calling thread pool against the live view.
    ///
    /// Decisions are computed in parallel on a read-only view, then installed
    /// sequentially. Returns how many plans were installed.
    pub fn plan_sync(
        &mut self,
        view: &ArenaView<'_>,
        due: &[PlayerId],
        tuning: &AiTuning,
        config: &AiConfig,
        seed: u64,
        tick: u64,
    ) -> usize {
        let results: Vec<(PlayerId, Result<AiPathPlan, PlanError>)> = due
            .par_iter()
            .map(|&player| {
                let mut rng = StdRng::seed_from_u64(decision_seed(seed, tick, player));
                (player, compute_plan(view, player, tuning, config, &mut rng))
            })
            .collect();

        let mut installed = 0;
        for (player, result) in results {
            match result {
                Ok(plan) => {
                    tracing::debug!(player, tick, turn = plan.first_turn(), "AI plan");
                    if self.install(player, plan) {
                        installed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(player, tick, "AI planning failed: {}", e);
                    self.fail(player);
                }
            }
        }
        installed
    }

    /// Next turn command for `player`; straight when no plan step is ready
    pub fn next_turn(&mut self, player: PlayerId) -> f32 {
        self.states
            .get_mut(&player)
            .and_then(|state| state.plan.as_mut())
            .and_then(|plan| plan.next_turn())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::spatial::SpatialIndex;
    use crate::game::trail::TrailStore;

    const BOUNDS: Vec2 = Vec2 { x: 1000.0, y: 1000.0 };

    fn view<'a>(trails: &'a Vec<TrailStore>, index: Option<&'a SpatialIndex>) -> ArenaView<'a> {
        ArenaView {
            bounds: BOUNDS,
            line_width: 10.0,
            trails,
            index,
        }
    }

    fn tuning() -> AiTuning {
        AiTuning {
            max_turn: 4.0,
            randomness: 0.0,
            look_ahead: 50,
            reaction_interval: 24,
            speed: 1.9,
        }
    }

    fn quiet_config() -> AiConfig {
        AiConfig {
            exploration_probability: 0.0,
            ..AiConfig::default()
        }
    }

    fn segment(x: f32, y_from: f32, y_to: f32) -> TrailStore {
        let mut trail = TrailStore::seeded(Vec2::new(x, y_from), Vec2::new(x, y_from + 2.0));
        let mut y = y_from + 4.0;
        while y <= y_to {
            trail.push(Vec2::new(x, y), false).unwrap();
            y += 2.0;
        }
        trail
    }

    fn heading_trail(head: Vec2, heading: Vec2) -> TrailStore {
        TrailStore::seeded(head - heading * 2.0, head)
    }

    #[test]
    fn test_plan_cursor_consumes_segments() {
        let mut plan = AiPathPlan::from_segments([
            PlanSegment { turn: 4.0, ticks: 2 },
            PlanSegment { turn: 0.0, ticks: 0 },
            PlanSegment { turn: -2.0, ticks: 1 },
        ]);
        assert_eq!(plan.segments().len(), 2, "Zero-length segments are dropped");
        assert_eq!(plan.remaining_ticks(), 3);
        assert_eq!(plan.next_turn(), Some(4.0));
        assert_eq!(plan.remaining_ticks(), 2);
        assert_eq!(plan.next_turn(), Some(4.0));
        assert_eq!(plan.next_turn(), Some(-2.0));
        assert!(plan.is_exhausted());
        assert_eq!(plan.next_turn(), None);
        assert_eq!(plan.remaining_ticks(), 0);
    }

    #[test]
    fn test_wall_emergency_turns_away() {
        let b = Vec2::new(1000.0, 800.0);
        let left = Vec2::new(-1.0, 0.1).normalize();
        assert_eq!(wall_emergency(Vec2::new(50.0, 400.0), left, b, 80.0, 4.0), Some(4.0));
        let right = Vec2::new(1.0, 0.1).normalize();
        assert_eq!(wall_emergency(Vec2::new(950.0, 400.0), right, b, 80.0, 4.0), Some(-4.0));
        let up_right = Vec2::new(0.1, -1.0).normalize();
        assert_eq!(wall_emergency(Vec2::new(500.0, 50.0), up_right, b, 80.0, 4.0), Some(4.0));
        let up_left = Vec2::new(-0.1, -1.0).normalize();
        assert_eq!(wall_emergency(Vec2::new(500.0, 50.0), up_left, b, 80.0, 4.0), Some(-4.0));
        let down_right = Vec2::new(0.1, 1.0).normalize();
        assert_eq!(wall_emergency(Vec2::new(500.0, 750.0), down_right, b, 80.0, 4.0), Some(-4.0));
        let down_left = Vec2::new(-0.1, 1.0).normalize();
        assert_eq!(wall_emergency(Vec2::new(500.0, 750.0), down_left, b, 80.0, 4.0), Some(4.0));

        // Near a wall but moving away from it
        assert_eq!(wall_emergency(Vec2::new(50.0, 400.0), right, b, 80.0, 4.0), None);
    }

    #[test]
    fn test_wall_emergency_turn_moves_away_from_wall() {
        let b = Vec2::new(1000.0, 800.0);
        let cases = [
            (Vec2::new(50.0, 400.0), Vec2::new(-1.0, 0.2).normalize()),
            (Vec2::new(950.0, 400.0), Vec2::new(1.0, -0.2).normalize()),
            (Vec2::new(500.0, 50.0), Vec2::new(0.3, -1.0).normalize()),
            (Vec2::new(500.0, 750.0), Vec2::new(-0.3, 1.0).normalize()),
        ];
        for (head, heading) in cases {
            let before = ArenaView {
                bounds: b,
                line_width: 10.0,
                trails: &Vec::<TrailStore>::new(),
                index: None,
            }
            .wall_distance(head + heading * 20.0);
            let turn = wall_emergency(head, heading, b, 80.0, 30.0).unwrap();
            let turned = heading.rotate_degrees(turn);
            let after = ArenaView {
                bounds: b,
                line_width: 10.0,
                trails: &Vec::<TrailStore>::new(),
                index: None,
            }
            .wall_distance(head + turned * 20.0);
            assert!(after > before, "Turn {} at {:?} should gain wall clearance", turn, head);
        }
    }

    #[test]
    fn test_clear_arena_goes_straight() {
        let trails = vec![heading_trail(Vec2::new(500.0, 500.0), Vec2::RIGHT)];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let turn = decide_turn(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &tuning(), &quiet_config(), &mut rng);
        assert_eq!(turn, 0.0);
    }

    #[test]
    fn test_close_obstacle_on_left_turns_right() {
        // Obstacle up and ahead (negative y is left when heading +x)
        let trails = vec![
            heading_trail(Vec2::new(500.0, 500.0), Vec2::RIGHT),
            segment(560.0, 380.0, 470.0),
        ];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let turn = decide_turn(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &tuning(), &quiet_config(), &mut rng);
        assert_eq!(turn, 4.0);
    }

    #[test]
    fn test_close_obstacle_on_right_turns_left() {
        let trails = vec![
            heading_trail(Vec2::new(500.0, 500.0), Vec2::RIGHT),
            segment(560.0, 530.0, 620.0),
        ];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let turn = decide_turn(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &tuning(), &quiet_config(), &mut rng);
        assert_eq!(turn, -4.0);
    }

    #[test]
    fn test_caution_band_dead_ahead_wall() {
        // Forward ray meets the wall buffer at 280; wide sensors are symmetric
        let head = Vec2::new(700.0, 500.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT)];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let turn = decide_turn(&v, 0, head, Vec2::RIGHT, &tuning(), &quiet_config(), &mut rng);
        assert_eq!(turn, 4.0, "Symmetric clearance breaks toward the right");
    }

    #[test]
    fn test_long_range_correction_is_gentle() {
        // Forward ray meets the wall buffer at 330, beyond the caution band
        let head = Vec2::new(650.0, 500.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT)];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let turn = decide_turn(&v, 0, head, Vec2::RIGHT, &tuning(), &quiet_config(), &mut rng);
        assert_eq!(turn, 2.0);
    }

    #[test]
    fn test_randomness_forces_hard_turn() {
        let trails = vec![heading_trail(Vec2::new(500.0, 500.0), Vec2::RIGHT)];
        let v = view(&trails, None);
        let t = AiTuning {
            randomness: 1.0,
            ..tuning()
        };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let turn = decide_turn(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &t, &quiet_config(), &mut rng);
            assert_eq!(turn.abs(), 4.0);
            let turn = decide_pairwise(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &t, &mut rng);
            assert_eq!(turn.abs(), 4.0);
        }
    }

    #[test]
    fn test_exploration_half_turn_when_clear() {
        let trails = vec![heading_trail(Vec2::new(500.0, 500.0), Vec2::RIGHT)];
        let v = view(&trails, None);
        let config = AiConfig {
            exploration_probability: 1.0,
            ..AiConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let turn = decide_turn(&v, 0, Vec2::new(500.0, 500.0), Vec2::RIGHT, &tuning(), &config, &mut rng);
        assert_eq!(turn.abs(), 2.0);
    }

    #[test]
    fn test_pairwise_turns_away_from_nearer_side() {
        let head = Vec2::new(500.0, 500.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT), segment(620.0, 300.0, 460.0)];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(decide_pairwise(&v, 0, head, Vec2::RIGHT, &tuning(), &mut rng), 4.0);

        let open = vec![heading_trail(head, Vec2::RIGHT)];
        let v = view(&open, None);
        assert_eq!(decide_pairwise(&v, 0, head, Vec2::RIGHT, &tuning(), &mut rng), 0.0);
    }

    #[test]
    fn test_reflex_near_wall() {
        let head = Vec2::new(30.0, 500.0);
        let heading = Vec2::new(-1.0, 0.0);
        let trails = vec![heading_trail(head, heading)];
        let v = view(&trails, None);
        assert_eq!(emergency_reflex(&v, 0, head, heading, 4.0, &AiConfig::default()), Some(4.0));
    }

    #[test]
    fn test_reflex_escapes_toward_open_side() {
        // Trail just ahead; the bottom wall crowds the right-hand side
        let head = Vec2::new(500.0, 940.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT), segment(525.0, 850.0, 990.0)];
        let v = view(&trails, None);
        let turn = emergency_reflex(&v, 0, head, Vec2::RIGHT, 4.0, &AiConfig::default());
        assert_eq!(turn, Some(-4.0), "Left has more room, turn left");
    }

    #[test]
    fn test_reflex_sees_old_trail_points() {
        // 400-point trail whose oldest point sits right on the look-ahead spot
        let mut old = TrailStore::seeded(Vec2::new(530.0, 500.0), Vec2::new(530.0, 502.0));
        for i in 2..400 {
            old.push(Vec2::new(530.0 + (i / 100) as f32 * 40.0, 502.0 + (i % 100) as f32 * 2.0), false)
                .unwrap();
        }
        let head = Vec2::new(500.0, 500.0);
        let trails = vec![old, heading_trail(head, Vec2::RIGHT)];

        let v = view(&trails, None);
        assert!(
            emergency_reflex(&v, 1, head, Vec2::RIGHT, 4.0, &AiConfig::default()).is_some(),
            "A solid point dead ahead triggers the reflex however old it is"
        );

        let mut index = SpatialIndex::new(30.0);
        index.refresh(&trails);
        let v = view(&trails, Some(&index));
        assert!(emergency_reflex(&v, 1, head, Vec2::RIGHT, 4.0, &AiConfig::default()).is_some());
    }

    #[test]
    fn test_reflex_quiet_in_open_space() {
        let head = Vec2::new(500.0, 500.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT)];
        let v = view(&trails, None);
        assert_eq!(emergency_reflex(&v, 0, head, Vec2::RIGHT, 4.0, &AiConfig::default()), None);
    }

    #[test]
    fn test_compute_plan_errors() {
        let trails = vec![TrailStore::new()];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            compute_plan(&v, 0, &tuning(), &quiet_config(), &mut rng),
            Err(PlanError::TrailTooShort { player: 0, len: 0 })
        );
        assert_eq!(
            compute_plan(&v, 5, &tuning(), &quiet_config(), &mut rng),
            Err(PlanError::UnknownPlayer(5))
        );
    }

    #[test]
    fn test_degenerate_heading_holds_straight() {
        let trails = vec![TrailStore::seeded(Vec2::new(300.0, 300.0), Vec2::new(300.0, 300.0))];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = compute_plan(&v, 0, &tuning(), &quiet_config(), &mut rng).unwrap();
        assert!(plan.segments().iter().all(|s| s.turn == 0.0));
        assert!(!plan.is_exhausted());
    }

    #[test]
    fn test_fan_plan_holds_for_reaction_interval() {
        let head = Vec2::new(700.0, 500.0);
        let trails = vec![heading_trail(head, Vec2::RIGHT)];
        let v = view(&trails, None);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = compute_plan(&v, 0, &tuning(), &quiet_config(), &mut rng).unwrap();
        assert_eq!(plan.segments(), &[PlanSegment { turn: 4.0, ticks: 24 }]);
    }

    #[test]
    fn test_planner_reflex_is_single_step() {
        let head = Vec2::new(30.0, 500.0);
        let heading = Vec2::new(-1.0, 0.0);
        let trails = vec![heading_trail(head, heading)];
        let v = view(&trails, None);
        let config = AiConfig {
            policy: AiPolicy::Planner,
            ..quiet_config()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let plan = compute_plan(&v, 0, &tuning(), &config, &mut rng).unwrap();
        assert_eq!(plan.segments(), &[PlanSegment { turn: 4.0, ticks: 1 }]);
    }

    #[test]
    fn test_director_cadence() {
        let mut director = AiDirector::new();
        director.register(1);
        director.register(3);

        assert_eq!(director.due_players(4, |_| true), vec![1, 3], "No plan yet: due at once");
        director.install(1, AiPathPlan::straight(100));
        director.install(3, AiPathPlan::straight(100));
        for _ in 0..3 {
            assert!(director.due_players(4, |_| true).is_empty());
        }
        assert_eq!(director.due_players(4, |id| id != 3), vec![1]);
    }

    #[test]
    fn test_director_pending_blocks_requests() {
        let mut director = AiDirector::new();
        director.register(0);
        assert_eq!(director.due_players(1, |_| true), vec![0]);
        director.mark_pending(0);
        for _ in 0..10 {
            assert!(director.due_players(1, |_| true).is_empty(), "Pending player is never due");
        }
        director.fail(0);
        assert_eq!(director.get(0).map(|s| s.failures), Some(1));
        assert_eq!(director.next_turn(0), 0.0);
        assert_eq!(director.due_players(1, |_| true), vec![0]);
    }

    #[test]
    fn test_plan_sync_installs_plans() {
        let mut trails = vec![
            heading_trail(Vec2::new(700.0, 500.0), Vec2::RIGHT),
            heading_trail(Vec2::new(300.0, 300.0), Vec2::DOWN),
        ];
        trails.push(TrailStore::new());
        let mut index = SpatialIndex::new(30.0);
        index.refresh(&trails);
        let v = view(&trails, Some(&index));

        let mut director = AiDirector::new();
        for id in 0..3 {
            director.register(id);
        }
        let due = director.due_players(24, |_| true);
        let installed = director.plan_sync(&v, &due, &tuning(), &quiet_config(), 7, 1);
        assert_eq!(installed, 2);
        assert_eq!(director.get(2).map(|s| s.failures), Some(1), "Empty trail fails planning");
        assert_eq!(director.next_turn(0), 4.0);
        assert_eq!(director.next_turn(1), 0.0);
    }
}
