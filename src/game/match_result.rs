//! Round results, finish order and session scores

use serde::{Deserialize, Serialize};

use crate::game::constants::round_points;
use crate::game::state::PlayerId;

/// Ranking built by prepending each eliminated player, so it ends winner-first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishOrder(Vec<PlayerId>);

impl FinishOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `player`; a player already ranked is ignored
    pub fn record(&mut self, player: PlayerId) {
        if !self.0.contains(&player) {
            self.0.insert(0, player);
        }
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.0.contains(&player)
    }

    #[inline]
    pub fn as_slice(&self) -> &[PlayerId] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn into_vec(self) -> Vec<PlayerId> {
        self.0
    }
}

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEndReason {
    /// Exactly one player left
    LastSurvivor,
    /// The final players went out on the same tick
    AllEliminated,
    /// `max_round_ticks` reached with several players still active
    TickCap,
}

/// Check if the round should end
pub fn check_round_end(active: usize, tick: u64, max_ticks: u64) -> Option<RoundEndReason> {
    match active {
        0 => Some(RoundEndReason::AllEliminated),
        1 => Some(RoundEndReason::LastSurvivor),
        _ if max_ticks > 0 && tick >= max_ticks => Some(RoundEndReason::TickCap),
        _ => None,
    }
}

/// Final report of one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Winner first
    pub finish_order: Vec<PlayerId>,
    /// Ticks simulated
    pub ticks: u64,
    /// Sole survivor, if the round produced one
    pub winner: Option<PlayerId>,
    pub reason: RoundEndReason,
}

/// Receives the final finish order of every round
pub trait RoundResultSink {
    fn record_round(&mut self, result: &RoundResult);
}

/// In-memory score tally for the current session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    totals: Vec<u32>,
    rounds: u32,
}

impl ScoreBoard {
    pub fn new(player_count: usize) -> Self {
        Self {
            totals: vec![0; player_count],
            rounds: 0,
        }
    }

    /// Award `player_count - position - 1` points (at least 0) to each player
    /// in `finish_order` and add them to the running totals
    pub fn record_round_scores(&mut self, finish_order: &[PlayerId]) {
        let player_count = finish_order.len();
        for (position, &player) in finish_order.iter().enumerate() {
            if player >= self.totals.len() {
                self.totals.resize(player + 1, 0);
            }
            self.totals[player] += round_points(player_count, position);
        }
        self.rounds += 1;
    }

    pub fn total(&self, player: PlayerId) -> u32 {
        self.totals.get(player).copied().unwrap_or(0)
    }

    /// `(player, total)` sorted by total descending, then id
    pub fn standings(&self) -> Vec<(PlayerId, u32)> {
        let mut standings: Vec<(PlayerId, u32)> = self.totals.iter().copied().enumerate().collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        standings
    }

    #[inline]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn reset(&mut self) {
        self.totals.iter_mut().for_each(|t| *t = 0);
        self.rounds = 0;
    }
}

impl RoundResultSink for ScoreBoard {
    fn record_round(&mut self, result: &RoundResult) {
        self.record_round_scores(&result.finish_order);
        tracing::info!(
            round = self.rounds,
            winner = ?result.winner,
            "Round recorded: {:?}",
            result.finish_order
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_order_prepends() {
        let mut order = FinishOrder::new();
        for eliminated in [2, 0, 3] {
            order.record(eliminated);
        }
        // Survivor goes in last, ending up first
        order.record(1);
        assert_eq!(order.as_slice(), &[1, 3, 0, 2]);
    }

    #[test]
    fn test_finish_order_ignores_duplicates() {
        let mut order = FinishOrder::new();
        order.record(4);
        order.record(4);
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_round_end_conditions() {
        assert_eq!(check_round_end(3, 100, 0), None);
        assert_eq!(check_round_end(1, 100, 0), Some(RoundEndReason::LastSurvivor));
        assert_eq!(check_round_end(0, 100, 0), Some(RoundEndReason::AllEliminated));
        assert_eq!(check_round_end(2, 499, 500), None);
        assert_eq!(check_round_end(2, 500, 500), Some(RoundEndReason::TickCap));
    }

    #[test]
    fn test_record_round_scores() {
        let mut board = ScoreBoard::new(3);
        board.record_round_scores(&[2, 0, 1]);
        assert_eq!(board.total(2), 2);
        assert_eq!(board.total(0), 1);
        assert_eq!(board.total(1), 0);

        board.record_round_scores(&[0, 2, 1]);
        assert_eq!(board.standings(), vec![(0, 3), (2, 3), (1, 0)]);
        assert_eq!(board.rounds(), 2);
    }

    #[test]
    fn test_sink_and_reset() {
        let mut board = ScoreBoard::new(2);
        let result = RoundResult {
            finish_order: vec![1, 0],
            ticks: 300,
            winner: Some(1),
            reason: RoundEndReason::LastSurvivor,
        };
        board.record_round(&result);
        assert_eq!(board.total(1), 1);

        board.reset();
        assert_eq!(board.total(1), 0);
        assert_eq!(board.rounds(), 0);
        assert_eq!(board.standings().len(), 2, "Reset keeps the roster");
    }

    #[test]
    fn test_result_serializes() {
        let result = RoundResult {
            finish_order: vec![1, 0],
            ticks: 42,
            winner: Some(1),
            reason: RoundEndReason::LastSurvivor,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"finish_order\":[1,0]"));
    }
}
