//! Renderer contract
//!
//! The simulation hands a read-only frame to the renderer once per tick and
//! never issues drawing calls itself.

use crate::game::state::{GameState, PlayerId};
use crate::game::trail::TrailStore;
use crate::util::vec2::Vec2;

/// Everything a renderer needs about one player
#[derive(Debug, Clone, Copy)]
pub struct PlayerView<'a> {
    pub id: PlayerId,
    pub color_index: u8,
    /// Stroke width after modifiers
    pub line_width: f32,
    /// Positions and gap flags; gap points are not drawn
    pub trail: &'a TrailStore,
    pub alive: bool,
    pub invulnerable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerupView {
    pub position: Vec2,
    pub radius: f32,
    pub kind: &'static str,
}

/// One tick's worth of render data
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    pub tick: u64,
    pub bounds: Vec2,
    pub players: Vec<PlayerView<'a>>,
    pub powerups: Vec<PowerupView>,
}

impl<'a> RenderFrame<'a> {
    /// Frame over `state` in player order, without powerups
    pub fn from_state(state: &'a GameState) -> Self {
        let players = state
            .players
            .iter()
            .zip(state.trails.iter())
            .map(|(player, trail)| PlayerView {
                id: player.id,
                color_index: player.color_index,
                line_width: player.effective_line_width(state.line_width),
                trail,
                alive: player.alive,
                invulnerable: player.is_invulnerable(),
            })
            .collect();

        Self {
            tick: state.tick,
            bounds: state.bounds,
            players,
            powerups: Vec::new(),
        }
    }
}

/// Pixel output lives behind this trait
pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame<'_>);
}

/// Headless renderer that only counts frames
#[derive(Debug, Default)]
pub struct NullRenderer {
    frames: u64,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &RenderFrame<'_>) {
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{ControlSource, ModifierKind, Player};
    use crate::game::trail::GapTimer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_frame_reflects_modifiers() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = GameState::new(Vec2::new(400.0, 300.0), 10.0, 30.0);
        for i in 0..2 {
            let player = Player::new(
                i,
                format!("P{}", i),
                ControlSource::Ai,
                2.0,
                Vec2::RIGHT,
                GapTimer::new((50, 80), &mut rng),
            );
            let start = Vec2::new(50.0, 50.0 + 100.0 * i as f32);
            state.add_player(player, TrailStore::seeded(start, start + Vec2::RIGHT * 2.0));
        }
        state.players[1].apply_modifier(ModifierKind::LineWidthScale(2.0), 100);
        state.players[1].apply_modifier(ModifierKind::Invulnerable, 100);

        let frame = RenderFrame::from_state(&state);
        assert_eq!(frame.players.len(), 2);
        assert_eq!(frame.players[0].line_width, 10.0);
        assert_eq!(frame.players[1].line_width, 20.0);
        assert!(frame.players[1].invulnerable);
        assert_eq!(frame.players[1].trail.len(), 2);

        let mut renderer = NullRenderer::new();
        renderer.render(&frame);
        renderer.render(&frame);
        assert_eq!(renderer.frames(), 2);
    }
}
