//! Powerup spawning and effects
//! Powerups only mutate player modifiers and trails; drawing them is the renderer's job

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::constants::powerup::*;
use crate::game::state::{GameState, ModifierKind, PlayerId};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    /// Trims every trail on the board
    Eraser,
    /// Temporary invulnerability; the trail is laid as gap points
    Wings,
    /// Halves the collector's stroke width
    Shrink,
    /// Doubles the collector's stroke width
    Grow,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 4] = [
        PowerupKind::Eraser,
        PowerupKind::Wings,
        PowerupKind::Shrink,
        PowerupKind::Grow,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerupKind::Eraser => "eraser",
            PowerupKind::Wings => "wings",
            PowerupKind::Shrink => "shrink",
            PowerupKind::Grow => "grow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Powerup {
    pub id: u64,
    pub kind: PowerupKind,
    pub position: Vec2,
}

/// A player picked up a powerup this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collected {
    pub player: PlayerId,
    pub kind: PowerupKind,
}

/// Live powerups plus spawn bookkeeping
#[derive(Debug, Clone, Default)]
pub struct PowerupManager {
    active: Vec<Powerup>,
    next_id: u64,
}

impl PowerupManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active(&self) -> &[Powerup] {
        &self.active
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Spawn on the interval, then resolve pickups. Returns this tick's pickups.
    pub fn update<R: Rng + ?Sized>(&mut self, state: &mut GameState, rng: &mut R) -> SmallVec<[Collected; 4]> {
        if state.tick > 0 && state.tick % SPAWN_INTERVAL_TICKS == 0 {
            self.try_spawn(state, rng);
        }
        self.collect(state)
    }

    /// Place one powerup of a random kind, if there is room.
    ///
    /// Candidates must clear the walls by `WALL_MARGIN_FACTOR` radii, sampled
    /// solid trail points by a radius plus the line width, and other powerups
    /// by `SPACING_FACTOR` radii. Gives up after `SPAWN_ATTEMPTS` tries.
    pub fn try_spawn<R: Rng + ?Sized>(&mut self, state: &GameState, rng: &mut R) -> Option<Powerup> {
        if self.active.len() >= MAX_ACTIVE {
            return None;
        }

        let margin = RADIUS * WALL_MARGIN_FACTOR;
        if state.bounds.x <= margin * 2.0 || state.bounds.y <= margin * 2.0 {
            return None;
        }
        let trail_clearance = RADIUS + state.line_width;
        let trail_clearance_sq = trail_clearance * trail_clearance;
        let spacing_sq = (RADIUS * SPACING_FACTOR) * (RADIUS * SPACING_FACTOR);

        for _ in 0..SPAWN_ATTEMPTS {
            let position = Vec2::new(
                rng.gen_range(margin..state.bounds.x - margin),
                rng.gen_range(margin..state.bounds.y - margin),
            );

            let near_trail = state.trails.iter().any(|trail| {
                trail
                    .points()
                    .iter()
                    .enumerate()
                    .step_by(TRAIL_SAMPLE_STRIDE)
                    .any(|(i, p)| !trail.is_gap(i) && p.distance_sq_to(position) < trail_clearance_sq)
            });
            if near_trail {
                continue;
            }
            if self
                .active
                .iter()
                .any(|other| other.position.distance_sq_to(position) < spacing_sq)
            {
                continue;
            }

            let powerup = Powerup {
                id: self.next_id,
                kind: PowerupKind::random(rng),
                position,
            };
            self.next_id += 1;
            self.active.push(powerup);
            tracing::debug!(id = powerup.id, kind = powerup.kind.name(), "Powerup spawned");
            return Some(powerup);
        }

        None
    }

    /// Hand each powerup to the first live player whose head touches it
    pub fn collect(&mut self, state: &mut GameState) -> SmallVec<[Collected; 4]> {
        let mut collected = SmallVec::new();
        if self.active.is_empty() {
            return collected;
        }

        for player in 0..state.players.len() {
            if !state.players[player].alive {
                continue;
            }
            let Some(head) = state.trails.get(player).and_then(|t| t.head()) else {
                continue;
            };
            let reach = state.line_width_of(player) * 0.5 + RADIUS;
            let reach_sq = reach * reach;

            let Some(slot) = self
                .active
                .iter()
                .position(|p| p.position.distance_sq_to(head) <= reach_sq)
            else {
                continue;
            };
            let powerup = self.active.swap_remove(slot);
            apply(state, player, powerup.kind);
            collected.push(Collected {
                player,
                kind: powerup.kind,
            });
        }

        collected
    }
}

/// Apply a powerup's effect on behalf of `player`
pub fn apply(state: &mut GameState, player: PlayerId, kind: PowerupKind) {
    let tick = state.tick;
    match kind {
        PowerupKind::Eraser => {
            for trail in state.trails.iter_mut() {
                if trail.len() >= ERASER_MIN_TRAIL {
                    trail.erase_to_last(ERASER_KEEP);
                }
            }
            state.index.clear();
            if let Some(p) = state.player_mut(player) {
                p.apply_modifier(ModifierKind::TrailCleared, tick + 1);
            }
        }
        PowerupKind::Wings => {
            if let Some(p) = state.player_mut(player) {
                p.apply_modifier(ModifierKind::Invulnerable, tick + WINGS_DURATION_TICKS);
            }
        }
        PowerupKind::Shrink => {
            if let Some(p) = state.player_mut(player) {
                p.apply_modifier(ModifierKind::LineWidthScale(SHRINK_FACTOR), tick + RESIZE_DURATION_TICKS);
            }
        }
        PowerupKind::Grow => {
            if let Some(p) = state.player_mut(player) {
                p.apply_modifier(ModifierKind::LineWidthScale(GROW_FACTOR), tick + RESIZE_DURATION_TICKS);
            }
        }
    }
    tracing::info!(player, kind = kind.name(), tick, "Powerup collected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{ControlSource, Player};
    use crate::game::systems::collision::check_player;
    use crate::game::trail::{GapTimer, TrailStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line(from: Vec2, step: Vec2, n: usize) -> TrailStore {
        let mut trail = TrailStore::seeded(from, from + step);
        for i in 2..n {
            trail.push(from + step * i as f32, false).unwrap();
        }
        trail
    }

    fn state_with(trails: Vec<TrailStore>) -> GameState {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = GameState::new(Vec2::new(800.0, 600.0), 10.0, 30.0);
        for (i, trail) in trails.into_iter().enumerate() {
            let player = Player::new(
                i,
                format!("P{}", i),
                ControlSource::Ai,
                2.0,
                Vec2::RIGHT,
                GapTimer::new((50, 80), &mut rng),
            );
            state.add_player(player, trail);
        }
        state
    }

    #[test]
    fn test_spawn_respects_margins_and_limit() {
        let mut state = state_with(vec![line(Vec2::new(100.0, 300.0), Vec2::new(2.0, 0.0), 300)]);
        state.refresh_index();
        let mut manager = PowerupManager::new();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..20 {
            manager.try_spawn(&state, &mut rng);
        }
        assert!(manager.active().len() <= MAX_ACTIVE);
        assert!(!manager.active().is_empty(), "An open arena must fit a powerup");

        let margin = RADIUS * WALL_MARGIN_FACTOR;
        for p in manager.active() {
            assert!(p.position.x >= margin && p.position.x <= 800.0 - margin);
            assert!(p.position.y >= margin && p.position.y <= 600.0 - margin);
            for q in manager.active() {
                if p.id != q.id {
                    assert!(p.position.distance_to(q.position) >= RADIUS * SPACING_FACTOR);
                }
            }
        }
    }

    #[test]
    fn test_spawn_only_on_interval() {
        let mut state = state_with(vec![]);
        let mut manager = PowerupManager::new();
        let mut rng = StdRng::seed_from_u64(3);

        state.tick = SPAWN_INTERVAL_TICKS - 1;
        manager.update(&mut state, &mut rng);
        assert!(manager.active().is_empty());

        state.tick = SPAWN_INTERVAL_TICKS;
        manager.update(&mut state, &mut rng);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn test_wings_grant_invulnerability() {
        let mut state = state_with(vec![
            line(Vec2::new(100.0, 300.0), Vec2::new(2.0, 0.0), 20),
            line(Vec2::new(100.0, 100.0), Vec2::new(2.0, 0.0), 20),
        ]);
        state.tick = 40;
        let mut manager = PowerupManager::new();
        manager.active.push(Powerup {
            id: 0,
            kind: PowerupKind::Wings,
            position: Vec2::new(150.0, 305.0),
        });

        let collected = manager.collect(&mut state);
        assert_eq!(collected.as_slice(), &[Collected { player: 0, kind: PowerupKind::Wings }]);
        assert!(manager.active().is_empty());
        assert!(state.players[0].is_invulnerable());

        // Head parked on the other trail: no collision while invulnerable
        state.trails[0].push(Vec2::new(120.0, 100.0), true).unwrap();
        assert_eq!(check_player(&state, 0), None);

        state.players[0].expire_modifiers(40 + WINGS_DURATION_TICKS);
        assert!(check_player(&state, 0).is_some());
    }

    #[test]
    fn test_eraser_trims_every_long_trail() {
        let mut state = state_with(vec![
            line(Vec2::new(100.0, 300.0), Vec2::new(2.0, 0.0), 50),
            line(Vec2::new(100.0, 100.0), Vec2::new(2.0, 0.0), 8),
        ]);
        state.trails[0].push(Vec2::new(200.0, 300.0), true).unwrap();
        state.trails[0].freeze();
        state.refresh_index();

        apply(&mut state, 1, PowerupKind::Eraser);

        assert_eq!(state.trails[0].len(), ERASER_KEEP);
        assert_eq!(state.trails[0].gap_count(), 0);
        assert_eq!(state.trails[1].len(), 8, "Short trails are left alone");
        assert_eq!(state.index.stats().total_points, 0, "Index is cleared");
        assert_eq!(state.index.indexed_len(0), 0);
        assert!(state.players[1]
            .modifiers
            .iter()
            .any(|m| m.kind == ModifierKind::TrailCleared));
    }

    #[test]
    fn test_shrink_and_grow_replace_each_other() {
        let mut state = state_with(vec![line(Vec2::new(100.0, 300.0), Vec2::new(2.0, 0.0), 20)]);
        apply(&mut state, 0, PowerupKind::Shrink);
        assert_eq!(state.line_width_of(0), 5.0);
        apply(&mut state, 0, PowerupKind::Grow);
        assert_eq!(state.line_width_of(0), 20.0);
        assert_eq!(state.players[0].modifiers.len(), 1);
    }

    #[test]
    fn test_dead_players_do_not_collect() {
        let mut state = state_with(vec![line(Vec2::new(100.0, 300.0), Vec2::new(2.0, 0.0), 20)]);
        state.players[0].alive = false;
        let mut manager = PowerupManager::new();
        manager.active.push(Powerup {
            id: 0,
            kind: PowerupKind::Grow,
            position: Vec2::new(138.0, 300.0),
        });
        assert!(manager.collect(&mut state).is_empty());
        assert_eq!(manager.active().len(), 1);
    }
}
