//! Game state definitions
//!
//! Players and trails live in flat vectors indexed by `PlayerId`; nothing
//! holds a reference to a player, only its index.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::constants::{powerup, spawn};
use crate::game::spatial::SpatialIndex;
use crate::game::systems::collision::ArenaView;
use crate::game::trail::{GapTimer, TrailStore};
use crate::util::vec2::Vec2;

/// Player index into `GameState::players` / `GameState::trails`
pub type PlayerId = usize;

/// Opaque key identifier delivered by the input source
pub type KeyCode = u32;

/// Left/right keys for a human player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMapping {
    pub left: KeyCode,
    pub right: KeyCode,
}

/// Who steers a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSource {
    /// Keyboard-driven; `None` means the mapping was never configured
    Human(Option<ControlMapping>),
    Ai,
}

impl ControlSource {
    #[inline]
    pub fn is_ai(&self) -> bool {
        matches!(self, ControlSource::Ai)
    }
}

/// Timed effect on one player, interpreted explicitly by collision and rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Collisions are ignored and new points are gaps
    Invulnerable,
    /// Multiplies the stroke width
    LineWidthScale(f32),
    /// Marks that this player cleared the board
    TrailCleared,
}

impl ModifierKind {
    fn same_kind(&self, other: &ModifierKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveModifier {
    pub kind: ModifierKind,
    /// First tick on which the modifier no longer applies
    pub expires_at: u64,
}

/// Player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub control: ControlSource,
    /// Distance covered per tick (px)
    pub speed: f32,
    /// Last valid unit heading; used when the trail's last step is degenerate
    pub heading: Vec2,
    pub alive: bool,
    pub color_index: u8,
    pub modifiers: SmallVec<[ActiveModifier; 4]>,
    pub gap_timer: GapTimer,
    /// Tick of elimination, if eliminated
    pub eliminated_at: Option<u64>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        control: ControlSource,
        speed: f32,
        heading: Vec2,
        gap_timer: GapTimer,
    ) -> Self {
        Self {
            id,
            name,
            control,
            speed,
            heading,
            alive: true,
            color_index: (id % 8) as u8,
            modifiers: SmallVec::new(),
            gap_timer,
            eliminated_at: None,
        }
    }

    #[inline]
    pub fn is_ai(&self) -> bool {
        self.control.is_ai()
    }

    pub fn is_invulnerable(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m.kind, ModifierKind::Invulnerable))
    }

    /// Product of every active width scale
    pub fn width_scale(&self) -> f32 {
        self.modifiers
            .iter()
            .filter_map(|m| match m.kind {
                ModifierKind::LineWidthScale(factor) => Some(factor),
                _ => None,
            })
            .product()
    }

    /// Stroke width after modifiers. Shrinking never goes below the minimum
    /// width and growing never exceeds the maximum.
    pub fn effective_line_width(&self, base: f32) -> f32 {
        let scale = self.width_scale();
        let scaled = base * scale;
        if scale < 1.0 {
            scaled.max(powerup::MIN_LINE_WIDTH)
        } else if scale > 1.0 {
            scaled.min(powerup::MAX_LINE_WIDTH)
        } else {
            scaled
        }
    }

    /// Install a modifier, replacing any active one of the same kind
    pub fn apply_modifier(&mut self, kind: ModifierKind, expires_at: u64) {
        self.modifiers.retain(|m| !m.kind.same_kind(&kind));
        self.modifiers.push(ActiveModifier { kind, expires_at });
    }

    /// Drop modifiers whose expiry tick has been reached; returns how many expired
    pub fn expire_modifiers(&mut self, tick: u64) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.expires_at > tick);
        before - self.modifiers.len()
    }
}

/// Spawn position and heading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub position: Vec2,
    pub heading: Vec2,
}

/// Default spawn for slot `slot`: the four corners inset by `CORNER_INSET`
/// (top-left, top-right, bottom-left, bottom-right, then cycling), each
/// heading toward the arena centre.
pub fn corner_spawn(slot: usize, bounds: Vec2) -> SpawnPoint {
    let inset = spawn::CORNER_INSET;
    let position = match slot % 4 {
        0 => Vec2::new(inset, inset),
        1 => Vec2::new(bounds.x - inset, inset),
        2 => Vec2::new(inset, bounds.y - inset),
        _ => Vec2::new(bounds.x - inset, bounds.y - inset),
    };
    let centre = bounds * 0.5;
    let heading = (centre - position).try_normalize(f32::EPSILON).unwrap_or(Vec2::RIGHT);
    SpawnPoint { position, heading }
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    /// Arena width/height
    pub bounds: Vec2,
    /// Base stroke width
    pub line_width: f32,
    pub players: Vec<Player>,
    pub trails: Vec<TrailStore>,
    /// Acceleration structure over `trails`; never authoritative
    pub index: SpatialIndex,
}

impl GameState {
    pub fn new(bounds: Vec2, line_width: f32, cell_size: f32) -> Self {
        Self {
            tick: 0,
            bounds,
            line_width,
            players: Vec::new(),
            trails: Vec::new(),
            index: SpatialIndex::new(cell_size),
        }
    }

    /// Add a player with its trail; returns the new id
    pub fn add_player(&mut self, mut player: Player, trail: TrailStore) -> PlayerId {
        let id = self.players.len();
        player.id = id;
        self.players.push(player);
        self.trails.push(trail);
        id
    }

    #[inline]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    #[inline]
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Effective stroke width of a player (base width for unknown ids)
    pub fn line_width_of(&self, id: PlayerId) -> f32 {
        self.player(id)
            .map(|p| p.effective_line_width(self.line_width))
            .unwrap_or(self.line_width)
    }

    /// Read-only view over the live trails and index
    pub fn view(&self) -> ArenaView<'_> {
        ArenaView {
            bounds: self.bounds,
            line_width: self.line_width,
            trails: &self.trails,
            index: Some(&self.index),
        }
    }

    /// Bring the spatial index up to date with the trails
    pub fn refresh_index(&mut self) {
        self.index.refresh(&self.trails);
    }
}
