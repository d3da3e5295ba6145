//! Spatial hash grid over trail points
//!
//! Divides the arena into square cells and files every solid trail point
//! under its cell as a `(player, point index)` pair. Proximity queries only
//! return candidates from the query cell's neighbourhood; callers post-filter
//! by true squared distance. The index lags the trails by up to one refresh
//! interval, so points appended since the last refresh must be scanned
//! directly (see `indexed_len`).

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::game::constants::spatial::{CELL_INITIAL_CAPACITY, GRID_INITIAL_CAPACITY};
use crate::game::state::PlayerId;
use crate::game::trail::TrailSet;
use crate::util::vec2::Vec2;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Reference to one point of one player's trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrailRef {
    pub player: PlayerId,
    pub point: usize,
}

/// Uniform grid of trail point references
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// Cell size in px
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Map from cell key to trail points in that cell
    cells: HashMap<CellKey, Vec<TrailRef>, FxBuildHasher>,
    /// Per player: number of leading trail points already filed
    indexed_len: Vec<usize>,
    /// Completed refreshes (incremental or full)
    refreshes: u64,
}

impl SpatialIndex {
    /// Create an index with the given cell size.
    ///
    /// The cell size should be at least the largest collision radius so a
    /// single 3x3 neighbourhood covers every true contact.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity_and_hasher(GRID_INITIAL_CAPACITY, FxBuildHasher),
            indexed_len: Vec::new(),
            refreshes: 0,
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Empty every cell and forget per-player coverage
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.indexed_len.clear();
    }

    /// Convert a position to its cell key. Floor division keeps points that
    /// sit exactly on a boundary in a single, deterministic cell.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// File a point under its cell
    #[inline]
    pub fn insert(&mut self, position: Vec2, owner: TrailRef) {
        let key = self.cell_of(position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(owner);
    }

    /// Candidates from the 3x3 block of cells around `position`
    pub fn query_neighbors(&self, position: Vec2) -> impl Iterator<Item = &TrailRef> + '_ {
        self.query_ring(position, 1)
    }

    /// Candidates from every cell within `ring` cells of `position`'s cell
    pub fn query_ring(&self, position: Vec2, ring: i32) -> impl Iterator<Item = &TrailRef> + '_ {
        let (cx, cy) = self.cell_of(position);
        let ring = ring.max(0);

        (-ring..=ring).flat_map(move |dx| {
            (-ring..=ring).flat_map(move |dy| {
                self.cells
                    .get(&(cx + dx, cy + dy))
                    .into_iter()
                    .flat_map(|cell| cell.iter())
            })
        })
    }

    /// Neighbourhood ring that covers a query radius (at least 1)
    #[inline]
    pub fn ring_for(&self, radius: f32) -> i32 {
        ((radius * self.inv_cell_size).ceil() as i32).max(1)
    }

    /// Number of leading points of `player`'s trail covered by the index
    #[inline]
    pub fn indexed_len(&self, player: PlayerId) -> usize {
        self.indexed_len.get(player).copied().unwrap_or(0)
    }

    /// Bring the index up to date.
    ///
    /// Only points appended since the previous refresh are inserted. A trail
    /// that got shorter than its indexed prefix forces a full rebuild.
    /// Returns the number of points inserted.
    pub fn refresh(&mut self, trails: &dyn TrailSet) -> usize {
        let count = trails.trail_count();
        let shrunk = (0..count).any(|p| {
            trails
                .trail(p)
                .map(|t| t.len() < self.indexed_len(p))
                .unwrap_or(false)
        });
        if shrunk || self.indexed_len.len() > count {
            tracing::debug!("Trail shrank below indexed prefix, rebuilding spatial index");
            self.clear();
        }
        self.indexed_len.resize(count, 0);

        let mut inserted = 0;
        for player in 0..count {
            let Some(trail) = trails.trail(player) else {
                continue;
            };
            let start = self.indexed_len[player];
            for point in start..trail.len() {
                if trail.is_gap(point) {
                    continue;
                }
                if let Some(position) = trail.point(point) {
                    self.insert(position, TrailRef { player, point });
                    inserted += 1;
                }
            }
            self.indexed_len[player] = trail.len();
        }

        self.refreshes += 1;
        inserted
    }

    /// Clear and re-file every trail
    pub fn rebuild(&mut self, trails: &dyn TrailSet) -> usize {
        self.clear();
        self.refresh(trails)
    }

    #[inline]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialIndexStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let total_points: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialIndexStats {
            non_empty_cells,
            total_points,
            max_per_cell,
        }
    }
}

/// Statistics about the spatial index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialIndexStats {
    pub non_empty_cells: usize,
    pub total_points: usize,
    pub max_per_cell: usize,
}
