//! Head-vs-wall and head-vs-trail collision detection
//!
//! Three tiers, short-circuiting on the first hit:
//! 1. indexed candidates around the query point,
//! 2. a direct scan of points appended since the last index refresh,
//! 3. a sampled scan of trails the index has never covered.

use crate::game::constants::collision::{FALLBACK_SAMPLE_TARGET, SELF_SAFETY_BUFFER};
use crate::game::spatial::SpatialIndex;
use crate::game::state::{GameState, PlayerId};
use crate::game::trail::{TrailSet, TrailStore};
use crate::util::vec2::Vec2;

/// Read-only view of the arena shared by collision, sensing and planning
#[derive(Clone, Copy)]
pub struct ArenaView<'a> {
    /// Arena width/height
    pub bounds: Vec2,
    /// Base stroke width
    pub line_width: f32,
    pub trails: &'a dyn TrailSet,
    /// `None` forces sampled scans of every trail
    pub index: Option<&'a SpatialIndex>,
}

impl<'a> ArenaView<'a> {
    /// Same view over a different trail set (used by scratch overlays)
    pub fn with_trails(&self, trails: &'a dyn TrailSet) -> ArenaView<'a> {
        ArenaView { trails, ..*self }
    }

    #[inline]
    pub fn centre(&self) -> Vec2 {
        self.bounds * 0.5
    }

    /// Distance from `point` to the nearest wall
    #[inline]
    pub fn wall_distance(&self, point: Vec2) -> f32 {
        point
            .x
            .min(self.bounds.x - point.x)
            .min(point.y)
            .min(self.bounds.y - point.y)
    }
}

/// What a head ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Wall,
    Trail { owner: PlayerId },
}

/// True when `point` is within `margin` of any boundary (inclusive)
#[inline]
pub fn wall_contact(point: Vec2, margin: f32, bounds: Vec2) -> bool {
    point.x <= margin || point.x >= bounds.x - margin || point.y <= margin || point.y >= bounds.y - margin
}

#[inline]
fn fallback_stride(len: usize) -> usize {
    (len / FALLBACK_SAMPLE_TARGET).max(1)
}

/// Scan `trail[start..end]` every `stride` points for a solid point within `radius_sq`
#[inline]
fn scan_range(trail: &TrailStore, point: Vec2, radius_sq: f32, start: usize, end: usize, stride: usize) -> bool {
    let points = trail.points();
    (start..end.min(points.len()))
        .step_by(stride)
        .any(|i| !trail.is_gap(i) && points[i].distance_sq_to(point) <= radius_sq)
}

/// Find a solid trail point within `radius` of `point` (inclusive).
///
/// The newest `self_buffer` points of `querying`'s own trail are exempt.
/// Returns the owner of the first point hit.
pub fn trail_contact(
    view: &ArenaView<'_>,
    point: Vec2,
    radius: f32,
    querying: PlayerId,
    self_buffer: usize,
) -> Option<PlayerId> {
    let radius_sq = radius * radius;
    let trails = view.trails;

    // Tier 1: indexed neighbourhood
    if let Some(index) = view.index {
        for r in index.query_ring(point, index.ring_for(radius)) {
            let Some(trail) = trails.trail(r.player) else {
                continue;
            };
            let len = trail.len();
            if r.point >= len {
                continue;
            }
            if r.player == querying && r.point + self_buffer >= len {
                continue;
            }
            if trail.is_gap(r.point) {
                continue;
            }
            if let Some(p) = trail.point(r.point) {
                if p.distance_sq_to(point) <= radius_sq {
                    return Some(r.player);
                }
            }
        }
    }

    for player in 0..trails.trail_count() {
        let Some(trail) = trails.trail(player) else {
            continue;
        };
        let len = trail.len();
        let end = if player == querying {
            len.saturating_sub(self_buffer)
        } else {
            len
        };
        let indexed = view.index.map(|i| i.indexed_len(player)).unwrap_or(0);

        let hit = if indexed > 0 && indexed <= len {
            // Tier 2: points the index has not seen yet
            scan_range(trail, point, radius_sq, indexed, end, 1)
        } else {
            // Tier 3: never indexed (cold start) or stale
            scan_range(trail, point, radius_sq, 0, end, fallback_stride(len))
        };
        if hit {
            return Some(player);
        }
    }

    None
}

/// Full collision check for a head position with the given half stroke width
pub fn check_collision(
    view: &ArenaView<'_>,
    player: PlayerId,
    head: Vec2,
    half_width: f32,
) -> Option<CollisionKind> {
    if wall_contact(head, half_width, view.bounds) {
        return Some(CollisionKind::Wall);
    }
    trail_contact(view, head, half_width, player, SELF_SAFETY_BUFFER)
        .map(|owner| CollisionKind::Trail { owner })
}

/// Collision check for a live player against the authoritative state.
/// Eliminated and invulnerable players never collide.
pub fn check_player(state: &GameState, player: PlayerId) -> Option<CollisionKind> {
    let p = state.player(player)?;
    if !p.alive || p.is_invulnerable() {
        return None;
    }
    let head = state.trails.get(player)?.head()?;
    let half_width = p.effective_line_width(state.line_width) * 0.5;
    check_collision(&state.view(), player, head, half_width)
}
