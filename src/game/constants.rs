/// Trail construction constants
pub mod trail {
    /// Points laid down at spawn to establish the initial heading
    pub const SEED_POINTS: usize = 2;
    /// Smallest gap (in points) opened by the gap timer
    pub const GAP_SIZE_MIN: u32 = 10;
    /// Largest gap (in points) opened by the gap timer
    pub const GAP_SIZE_MAX: u32 = 30;
}

/// Head-vs-trail collision constants
pub mod collision {
    /// Most recent own-trail points that never count as a self-collision
    pub const SELF_SAFETY_BUFFER: usize = 15;
    /// Fallback scans visit roughly this many points per trail
    /// (stride = max(1, len / FALLBACK_SAMPLE_TARGET))
    pub const FALLBACK_SAMPLE_TARGET: usize = 200;
}

/// Spatial index constants
pub mod spatial {
    /// Cell size as a multiple of the base line width
    pub const CELL_SIZE_FACTOR: f32 = 3.0;
    /// Ticks between index refreshes
    pub const DEFAULT_REFRESH_INTERVAL: u64 = 5;
    /// Initial capacity for the cell map (expected non-empty cells)
    pub const GRID_INITIAL_CAPACITY: usize = 1024;
    /// Initial capacity for each cell's point list
    pub const CELL_INITIAL_CAPACITY: usize = 8;
}

/// Ray casting constants
pub mod sensor {
    /// Fixed number of samples along every ray
    pub const RAY_STEPS: u32 = 200;
    /// Wall proximity buffer as a multiple of line width
    pub const WALL_BUFFER_FACTOR: f32 = 2.0;
    /// Trail proximity radius as a multiple of line width
    pub const DETECTION_RADIUS_FACTOR: f32 = 3.0;
    /// Most recent own-trail points ignored by the caster
    pub const SELF_SKIP: usize = 25;

    /// Default fan: (angle in degrees, max length in px). Negative = left.
    /// Narrow forward rays reach further than the wide escape rays.
    pub const DEFAULT_FAN: [(f32, f32); 13] = [
        (0.0, 400.0),
        (-5.0, 390.0),
        (5.0, 390.0),
        (-15.0, 380.0),
        (15.0, 380.0),
        (-30.0, 350.0),
        (30.0, 350.0),
        (-45.0, 300.0),
        (45.0, 300.0),
        (-60.0, 250.0),
        (60.0, 250.0),
        (-90.0, 200.0),
        (90.0, 200.0),
    ];
}

/// AI decision thresholds (defaults for `AiConfig`)
pub mod ai {
    /// Heading toward a wall closer than this forces a hard turn
    pub const WALL_EMERGENCY_DISTANCE: f32 = 80.0;
    /// Closest obstacle inside this band: hard turn away from its side
    pub const IMMEDIATE_DISTANCE: f32 = 120.0;
    /// Near-term danger band
    pub const DANGER_DISTANCE: f32 = 200.0;
    /// Caution band (wide sensors pick the open side)
    pub const CAUTION_DISTANCE: f32 = 300.0;
    /// Clearance margin needed to prefer left in the danger band
    pub const DANGER_SIDE_MARGIN: f32 = 30.0;
    /// Clearance margin needed to prefer left in the caution band
    pub const CAUTION_SIDE_MARGIN: f32 = 50.0;
    /// Clearance margin for gentle long-range corrections
    pub const LONG_RANGE_SIDE_MARGIN: f32 = 70.0;
    /// Per-decision chance of an exploratory half turn when clear
    pub const EXPLORATION_PROBABILITY: f64 = 0.05;
    /// Minimum ticks a sensor-fan decision is held for
    pub const PLAN_STEPS: u32 = 8;
    /// Side sensors used by the pairwise policy (degrees)
    pub const PAIRWISE_SENSOR_ANGLE: f32 = 30.0;
    /// Ray length of the pairwise side sensors
    pub const PAIRWISE_SENSOR_LENGTH: f32 = 350.0;

    /// Reflex: wall distance that bypasses planning
    pub const REFLEX_WALL_DISTANCE: f32 = 50.0;
    /// Reflex: look-ahead distance straight ahead of the head
    pub const REFLEX_LOOK_AHEAD: f32 = 30.0;
    /// Reflex: trail radius around the look-ahead point as a multiple of line width
    pub const REFLEX_RADIUS_FACTOR: f32 = 2.0;
    /// Reflex escape samples run from ESCAPE_SAMPLE_STEP to ESCAPE_SAMPLE_MAX
    pub const ESCAPE_SAMPLE_STEP: f32 = 10.0;
    pub const ESCAPE_SAMPLE_MAX: f32 = 100.0;

    /// Re-decision interval in ticks per unit of difficulty reaction time
    pub const REACTION_TICKS_PER_UNIT: u64 = 8;
    /// AI players move slightly slower than their configured speed
    pub const AI_SPEED_FACTOR: f32 = 0.95;
}

/// Long-horizon planner scoring
pub mod planner {
    /// Default number of committed segments per plan
    pub const SEGMENTS: u32 = 8;
    /// Score for a candidate whose simulated path collides
    pub const COLLISION_SCORE: f32 = -1000.0;
    /// Floor a candidate must beat to be chosen (colliding ones never do)
    pub const NO_CANDIDATE_SCORE: f32 = -1.0;
    /// Open-space samples: START, START + STEP, ... MAX along 4 directions
    pub const SPACE_SAMPLE_START: f32 = 20.0;
    pub const SPACE_SAMPLE_STEP: f32 = 20.0;
    pub const SPACE_SAMPLE_MAX: f32 = 120.0;
    /// Sum of the 4 sample distances is divided by this
    pub const SPACE_DIVISOR: f32 = 3.0;
    /// Squared sample radius as a multiple of line width squared
    pub const SPACE_SAMPLE_RADIUS_SQ_FACTOR: f32 = 1.5;
    /// Wall bonus = min(WALL_BONUS_MAX, wall distance / WALL_BONUS_DIVISOR)
    pub const WALL_BONUS_MAX: f32 = 30.0;
    pub const WALL_BONUS_DIVISOR: f32 = 5.0;
    /// Bonus at the exact arena centre, falling to 0 at the corners
    pub const CENTER_BONUS: f32 = 25.0;
}

/// Spawn layout
pub mod spawn {
    /// Corner spawn inset from both walls
    pub const CORNER_INSET: f32 = 50.0;
}

/// Powerup state-mutation constants
pub mod powerup {
    /// Ticks between spawn attempts (5 s at 60 FPS)
    pub const SPAWN_INTERVAL_TICKS: u64 = 300;
    /// Maximum simultaneously live powerups
    pub const MAX_ACTIVE: usize = 3;
    /// Pickup radius
    pub const RADIUS: f32 = 15.0;
    /// Placement attempts before giving up for this interval
    pub const SPAWN_ATTEMPTS: u32 = 50;
    /// Minimum wall distance as a multiple of the radius
    pub const WALL_MARGIN_FACTOR: f32 = 3.0;
    /// Minimum spacing between powerups as a multiple of the radius
    pub const SPACING_FACTOR: f32 = 4.0;
    /// Placement checks every Nth trail point
    pub const TRAIL_SAMPLE_STRIDE: usize = 10;
    /// Wings invulnerability (5 s)
    pub const WINGS_DURATION_TICKS: u64 = 300;
    /// Shrink/Grow duration (8 s)
    pub const RESIZE_DURATION_TICKS: u64 = 480;
    /// Eraser only trims trails at least this long
    pub const ERASER_MIN_TRAIL: usize = 10;
    /// Points kept per trail by the eraser
    pub const ERASER_KEEP: usize = 5;
    pub const SHRINK_FACTOR: f32 = 0.5;
    pub const GROW_FACTOR: f32 = 2.0;
    pub const MIN_LINE_WIDTH: f32 = 3.0;
    pub const MAX_LINE_WIDTH: f32 = 20.0;
}

/// Round lifecycle
pub mod round {
    /// Players needed to start a round
    pub const MIN_PLAYERS: usize = 2;
    /// Rolling window for frame statistics
    pub const FRAME_STATS_SAMPLES: usize = 30;
    /// Human input events buffered between ticks
    pub const INPUT_BUFFER_CAPACITY: usize = 256;
}

/// Points awarded for finishing at `position` (0 = winner) among `player_count` players
#[inline]
pub fn round_points(player_count: usize, position: usize) -> u32 {
    player_count.saturating_sub(position + 1) as u32
}
