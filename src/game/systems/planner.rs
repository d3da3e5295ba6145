//! Long-horizon planning by forward simulation
//!
//! The planning player's trail is copied into a scratch overlay. Candidate
//! turns are simulated onto the copy and rolled back with a checkpoint; the
//! authoritative trails are only ever borrowed immutably.

use smallvec::SmallVec;

use crate::config::AiConfig;
use crate::game::constants::planner::*;
use crate::game::state::PlayerId;
use crate::game::systems::ai::{AiPathPlan, AiTuning, PlanSegment};
use crate::game::systems::collision::{check_collision, trail_contact, wall_contact, ArenaView};
use crate::game::trail::{TrailCheckpoint, TrailError, TrailSet, TrailStore};
use crate::util::vec2::Vec2;

/// Trail set that substitutes a private copy of one player's trail
pub struct ScratchTrails<'a> {
    base: &'a dyn TrailSet,
    player: PlayerId,
    scratch: TrailStore,
}

impl<'a> ScratchTrails<'a> {
    /// `None` when `player` has no trail in `base`
    pub fn new(base: &'a dyn TrailSet, player: PlayerId) -> Option<Self> {
        let scratch = base.trail(player)?.clone();
        Some(Self {
            base,
            player,
            scratch,
        })
    }

    pub fn push(&mut self, point: Vec2) -> Result<(), TrailError> {
        self.scratch.push(point, false)
    }

    pub fn checkpoint(&self) -> TrailCheckpoint {
        self.scratch.checkpoint()
    }

    pub fn restore(&mut self, checkpoint: TrailCheckpoint) {
        self.scratch.restore(checkpoint);
    }

    pub fn scratch(&self) -> &TrailStore {
        &self.scratch
    }
}

impl TrailSet for ScratchTrails<'_> {
    fn trail_count(&self) -> usize {
        self.base.trail_count()
    }

    fn trail(&self, player: PlayerId) -> Option<&TrailStore> {
        if player == self.player {
            Some(&self.scratch)
        } else {
            self.base.trail(player)
        }
    }
}

/// Where a simulated run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedRun {
    pub score: f32,
    pub position: Vec2,
    pub heading: Vec2,
    pub collided: bool,
}

/// Clearance sampled in 4 directions around `position`, divided by `SPACE_DIVISOR`
fn open_space(view: &ArenaView<'_>, player: PlayerId, position: Vec2, heading: Vec2) -> f32 {
    let radius = (view.line_width * view.line_width * SPACE_SAMPLE_RADIUS_SQ_FACTOR).sqrt();
    let mut total = 0.0;

    for quarter in 0..4 {
        let direction = heading.rotate_degrees(90.0 * quarter as f32);
        let mut reach = SPACE_SAMPLE_MAX;
        let mut distance = SPACE_SAMPLE_START;
        while distance <= SPACE_SAMPLE_MAX {
            let sample = position + direction * distance;
            if wall_contact(sample, view.line_width, view.bounds)
                || trail_contact(view, sample, radius, player, 0).is_some()
            {
                reach = distance;
                break;
            }
            distance += SPACE_SAMPLE_STEP;
        }
        total += reach;
    }

    total / SPACE_DIVISOR
}

/// Score an endpoint: open space plus wall and centre bonuses
pub fn score_position(view: &ArenaView<'_>, player: PlayerId, position: Vec2, heading: Vec2) -> f32 {
    let space = open_space(view, player, position, heading);
    let wall_bonus = (view.wall_distance(position) / WALL_BONUS_DIVISOR).min(WALL_BONUS_MAX);
    let corner = view.centre().length().max(f32::EPSILON);
    let centre_bonus = CENTER_BONUS * (1.0 - position.distance_to(view.centre()) / corner);
    space + wall_bonus + centre_bonus
}

/// Append `ticks` points turning `turn` degrees per tick onto the scratch trail
pub fn simulate_candidate(
    view: &ArenaView<'_>,
    trails: &mut ScratchTrails<'_>,
    start: Vec2,
    heading: Vec2,
    turn: f32,
    ticks: u32,
    speed: f32,
) -> SimulatedRun {
    let player = trails.player;
    let half_width = view.line_width * 0.5;
    let mut position = start;
    let mut heading = heading;

    for _ in 0..ticks {
        heading = heading.rotate_degrees(turn);
        position += heading * speed;
        if trails.push(position).is_err() {
            break;
        }
        let scratch_view = view.with_trails(&*trails);
        if check_collision(&scratch_view, player, position, half_width).is_some() {
            return SimulatedRun {
                score: COLLISION_SCORE,
                position,
                heading,
                collided: true,
            };
        }
    }

    let scratch_view = view.with_trails(&*trails);
    SimulatedRun {
        score: score_position(&scratch_view, player, position, heading),
        position,
        heading,
        collided: false,
    }
}

/// Build a multi-segment plan by greedy forward simulation.
///
/// Each segment tries every candidate turn from the end of the previously
/// chosen trajectory and keeps the best scorer. When every candidate
/// collides the segment goes straight.
pub fn plan_long_horizon(
    view: &ArenaView<'_>,
    player: PlayerId,
    head: Vec2,
    heading: Vec2,
    tuning: &AiTuning,
    config: &AiConfig,
) -> AiPathPlan {
    let segment_count = config.planner_segments.max(1);
    let segment_ticks = (tuning.look_ahead / segment_count).max(1);
    let max_turn = tuning.max_turn;

    let Some(mut trails) = ScratchTrails::new(view.trails, player) else {
        return AiPathPlan::straight(segment_ticks);
    };

    let mut position = head;
    let mut direction = heading;
    let mut segments: SmallVec<[PlanSegment; 8]> = SmallVec::new();

    for segment in 0..segment_count {
        let candidates: SmallVec<[f32; 5]> = if segment == 0 {
            SmallVec::from_slice(&[-max_turn, -max_turn * 0.5, 0.0, max_turn * 0.5, max_turn])
        } else {
            SmallVec::from_slice(&[0.0, -max_turn * 0.5, max_turn * 0.5])
        };

        let mut best_turn = 0.0;
        let mut best_score = NO_CANDIDATE_SCORE;
        for &turn in &candidates {
            let checkpoint = trails.checkpoint();
            let run = simulate_candidate(view, &mut trails, position, direction, turn, segment_ticks, tuning.speed);
            trails.restore(checkpoint);
            if run.score > best_score {
                best_score = run.score;
                best_turn = turn;
            }
        }

        // Commit the chosen segment so the next one starts from its end
        let run = simulate_candidate(view, &mut trails, position, direction, best_turn, segment_ticks, tuning.speed);
        position = run.position;
        direction = run.heading;
        segments.push(PlanSegment {
            turn: best_turn,
            ticks: segment_ticks,
        });
    }

    tracing::debug!(
        player,
        first_turn = segments.first().map(|s| s.turn).unwrap_or(0.0),
        "Long-horizon plan"
    );
    AiPathPlan::from_segments(segments)
}
