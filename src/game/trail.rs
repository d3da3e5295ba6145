//! Per-player trail storage
//!
//! A trail is the ordered position history of one player plus a parallel
//! bitset of gap flags. Trails grow by one point per tick while the owner is
//! alive and freeze once the owner is eliminated.

use bitvec::vec::BitVec;
use rand::Rng;

use crate::game::constants::trail::{GAP_SIZE_MAX, GAP_SIZE_MIN};
use crate::game::state::PlayerId;
use crate::util::vec2::{Vec2, HEADING_EPSILON};

/// Trail mutation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrailError {
    #[error("Trail is frozen")]
    Frozen,
    #[error("Trail needs at least {needed} points, has {len}")]
    TooShort { needed: usize, len: usize },
}

/// Restore point for speculative appends (see `TrailStore::checkpoint`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailCheckpoint {
    len: usize,
}

/// Ordered trail positions with gap flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailStore {
    points: Vec<Vec2>,
    gaps: BitVec,
    frozen: bool,
}

impl TrailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trail seeded with two solid points establishing the initial heading
    pub fn seeded(first: Vec2, second: Vec2) -> Self {
        let mut trail = Self {
            points: Vec::with_capacity(1024),
            gaps: BitVec::with_capacity(1024),
            frozen: false,
        };
        trail.points.push(first);
        trail.points.push(second);
        trail.gaps.push(false);
        trail.gaps.push(false);
        trail
    }

    /// Append a new head position
    pub fn push(&mut self, point: Vec2, gap: bool) -> Result<(), TrailError> {
        if self.frozen {
            return Err(TrailError::Frozen);
        }
        self.points.push(point);
        self.gaps.push(gap);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    #[inline]
    pub fn point(&self, index: usize) -> Option<Vec2> {
        self.points.get(index).copied()
    }

    #[inline]
    pub fn head(&self) -> Option<Vec2> {
        self.points.last().copied()
    }

    #[inline]
    pub fn is_gap(&self, index: usize) -> bool {
        self.gaps.get(index).map(|bit| *bit).unwrap_or(false)
    }

    pub fn gap_count(&self) -> usize {
        self.gaps.count_ones()
    }

    /// Indices of gap-flagged points (for renderers)
    pub fn gap_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.gaps.iter_ones()
    }

    /// Raw displacement of the last step
    pub fn last_delta(&self) -> Option<Vec2> {
        match self.points.as_slice() {
            [.., prev, head] => Some(*head - *prev),
            _ => None,
        }
    }

    /// Unit heading implied by the last two points.
    /// `None` for short trails and for degenerate (zero-length) last steps.
    pub fn heading(&self) -> Option<Vec2> {
        self.last_delta()?.try_normalize(HEADING_EPSILON)
    }

    /// Mark the trail read-only (owner eliminated)
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn checkpoint(&self) -> TrailCheckpoint {
        TrailCheckpoint {
            len: self.points.len(),
        }
    }

    /// Drop every point appended after `checkpoint`
    pub fn restore(&mut self, checkpoint: TrailCheckpoint) {
        if checkpoint.len < self.points.len() {
            self.points.truncate(checkpoint.len);
            self.gaps.truncate(checkpoint.len);
        }
    }

    /// Keep only the newest `keep` points and clear every gap flag.
    /// Applies to frozen trails as well; the eraser wipes the whole board.
    pub fn erase_to_last(&mut self, keep: usize) {
        let len = self.points.len();
        if len > keep {
            self.points.drain(..len - keep);
        }
        self.gaps.clear();
        self.gaps.resize(self.points.len(), false);
    }
}

/// Read access to every player's trail, indexed by `PlayerId`.
///
/// Implemented by the authoritative trail list and by scratch overlays used
/// for forward simulation, so collision and sensing code never needs to know
/// which one it is looking at.
pub trait TrailSet: Sync {
    fn trail_count(&self) -> usize;
    fn trail(&self, player: PlayerId) -> Option<&TrailStore>;
}

impl TrailSet for Vec<TrailStore> {
    #[inline]
    fn trail_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn trail(&self, player: PlayerId) -> Option<&TrailStore> {
        self.get(player)
    }
}

/// Periodic gap generator. The point that opens a gap is itself a gap point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapTimer {
    interval: (u32, u32),
    next_gap_in: u32,
    gap_remaining: u32,
    in_gap: bool,
}

impl GapTimer {
    /// `interval` is the inclusive range of ticks between gaps
    pub fn new<R: Rng + ?Sized>(interval: (u32, u32), rng: &mut R) -> Self {
        let interval = (interval.0.max(1), interval.1.max(interval.0.max(1)));
        Self {
            interval,
            next_gap_in: rng.gen_range(interval.0..=interval.1),
            gap_remaining: 0,
            in_gap: false,
        }
    }

    /// Advance one tick; returns whether the point laid this tick is a gap
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.in_gap {
            self.gap_remaining = self.gap_remaining.saturating_sub(1);
            if self.gap_remaining == 0 {
                self.in_gap = false;
                self.next_gap_in = rng.gen_range(self.interval.0..=self.interval.1);
            }
            return true;
        }

        self.next_gap_in = self.next_gap_in.saturating_sub(1);
        if self.next_gap_in == 0 {
            self.in_gap = true;
            self.gap_remaining = rng.gen_range(GAP_SIZE_MIN..=GAP_SIZE_MAX);
            return true;
        }
        false
    }

    #[inline]
    pub fn in_gap(&self) -> bool {
        self.in_gap
    }
}
