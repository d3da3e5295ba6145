use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::game::constants::{ai, planner, spatial};

/// Difficulty tier selecting a `DifficultySettings` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn settings(&self) -> DifficultySettings {
        match self {
            Difficulty::Easy => DifficultySettings {
                look_ahead: 30,
                randomness: 0.1,
                reaction_time: 5,
                player_speed: 2.0,
                ai_speed: 1.8,
                angle_delta: 3.0,
                gap_frequency: (75, 100),
            },
            Difficulty::Medium => DifficultySettings {
                look_ahead: 50,
                randomness: 0.05,
                reaction_time: 3,
                player_speed: 2.0,
                ai_speed: 2.0,
                angle_delta: 4.0,
                gap_frequency: (50, 80),
            },
            Difficulty::Hard => DifficultySettings {
                look_ahead: 70,
                randomness: 0.02,
                reaction_time: 1,
                player_speed: 2.0,
                ai_speed: 2.2,
                angle_delta: 5.0,
                gap_frequency: (35, 60),
            },
        }
    }

    /// Parse a difficulty name, falling back to Medium with a warning
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid DIFFICULTY '{}', using default", value);
            Self::default()
        })
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Difficulty-scaled numbers consumed by the simulation.
/// The core treats these as opaque inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultySettings {
    /// Forward-simulation depth of the planner (ticks)
    pub look_ahead: u32,
    /// Probability that an AI decision is a random hard turn
    pub randomness: f32,
    /// Reaction time units; multiplied into the re-decision interval
    pub reaction_time: u32,
    /// Human movement per tick (px)
    pub player_speed: f32,
    /// Base AI movement per tick (px), before the AI speed factor
    pub ai_speed: f32,
    /// Maximum turn per tick (degrees)
    pub angle_delta: f32,
    /// Inclusive range of ticks between gaps
    pub gap_frequency: (u32, u32),
}

impl DifficultySettings {
    /// Ticks between AI re-decisions
    pub fn reaction_interval(&self) -> u64 {
        (self.reaction_time as u64 * ai::REACTION_TICKS_PER_UNIT).max(1)
    }

    /// Effective AI movement per tick
    pub fn ai_tick_speed(&self) -> f32 {
        self.ai_speed * ai::AI_SPEED_FACTOR
    }
}

/// Which decision policy AI players use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiPolicy {
    /// Graduated response over a fan of sensors
    #[default]
    SensorFan,
    /// Left/right 30° sensors only, always a hard turn
    Pairwise,
    /// Multi-segment forward simulation with an emergency reflex
    Planner,
}

impl FromStr for AiPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fan" | "sensor_fan" | "sensorfan" => Ok(AiPolicy::SensorFan),
            "pairwise" => Ok(AiPolicy::Pairwise),
            "planner" => Ok(AiPolicy::Planner),
            other => Err(format!("unknown AI policy '{}'", other)),
        }
    }
}

/// AI thresholds. Every numeric knob is configuration, not an invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub policy: AiPolicy,
    pub wall_emergency_distance: f32,
    pub immediate_distance: f32,
    pub danger_distance: f32,
    pub caution_distance: f32,
    pub danger_side_margin: f32,
    pub caution_side_margin: f32,
    pub long_range_side_margin: f32,
    pub exploration_probability: f64,
    /// Minimum ticks a fan/pairwise decision is held
    pub plan_steps: u32,
    pub reflex_wall_distance: f32,
    pub reflex_look_ahead: f32,
    pub planner_segments: u32,
    /// Replaces the difficulty randomness when set
    pub randomness_override: Option<f32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            policy: AiPolicy::SensorFan,
            wall_emergency_distance: ai::WALL_EMERGENCY_DISTANCE,
            immediate_distance: ai::IMMEDIATE_DISTANCE,
            danger_distance: ai::DANGER_DISTANCE,
            caution_distance: ai::CAUTION_DISTANCE,
            danger_side_margin: ai::DANGER_SIDE_MARGIN,
            caution_side_margin: ai::CAUTION_SIDE_MARGIN,
            long_range_side_margin: ai::LONG_RANGE_SIDE_MARGIN,
            exploration_probability: ai::EXPLORATION_PROBABILITY,
            plan_steps: ai::PLAN_STEPS,
            reflex_wall_distance: ai::REFLEX_WALL_DISTANCE,
            reflex_look_ahead: ai::REFLEX_LOOK_AHEAD,
            planner_segments: planner::SEGMENTS,
            randomness_override: None,
        }
    }
}

impl AiConfig {
    /// Load AI overrides from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(policy) = std::env::var("AI_POLICY") {
            match policy.parse() {
                Ok(parsed) => config.policy = parsed,
                Err(_) => tracing::warn!("Invalid AI_POLICY '{}', using default", policy),
            }
        }

        if let Ok(distance) = std::env::var("AI_WALL_EMERGENCY_DISTANCE") {
            match distance.parse::<f32>() {
                Ok(parsed) if parsed > 0.0 && parsed.is_finite() => {
                    config.wall_emergency_distance = parsed;
                }
                _ => tracing::warn!(
                    "Invalid AI_WALL_EMERGENCY_DISTANCE '{}', using default",
                    distance
                ),
            }
        }

        if let Ok(randomness) = std::env::var("AI_RANDOMNESS_OVERRIDE") {
            match randomness.parse::<f32>() {
                Ok(parsed) if (0.0..=1.0).contains(&parsed) => {
                    config.randomness_override = Some(parsed);
                }
                _ => tracing::warn!(
                    "AI_RANDOMNESS_OVERRIDE must be 0.0-1.0, got '{}', ignoring",
                    randomness
                ),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.immediate_distance <= self.danger_distance
            && self.danger_distance <= self.caution_distance)
        {
            return Err("AI distance bands must satisfy immediate <= danger <= caution".to_string());
        }
        if self.wall_emergency_distance <= 0.0 {
            return Err("wall_emergency_distance must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.exploration_probability) {
            return Err("exploration_probability must be within 0.0-1.0".to_string());
        }
        if let Some(r) = self.randomness_override {
            if !(0.0..=1.0).contains(&r) {
                return Err("randomness_override must be within 0.0-1.0".to_string());
            }
        }
        if self.plan_steps == 0 {
            return Err("plan_steps must be at least 1".to_string());
        }
        if self.planner_segments == 0 {
            return Err("planner_segments must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Arena width in px
    pub arena_width: f32,
    /// Arena height in px
    pub arena_height: f32,
    /// Base trail stroke width in px
    pub line_width: f32,
    /// Display-synchronised frame rate
    pub max_fps: u32,
    pub difficulty: Difficulty,
    /// Run AI planning on background workers
    pub ai_offload: bool,
    /// Spawn powerups (only effective with the `powerups` feature)
    pub powerups: bool,
    /// Ticks between spatial index refreshes
    pub spatial_refresh_interval: u64,
    /// Seed for every random draw in the simulation
    pub seed: u64,
    /// Hard cap on ticks per round (0 = unlimited)
    pub max_round_ticks: u64,
    pub ai: AiConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena_width: 1200.0,
            arena_height: 800.0,
            line_width: 10.0,
            max_fps: 60,
            difficulty: Difficulty::Medium,
            ai_offload: false,
            powerups: cfg!(feature = "powerups"),
            spatial_refresh_interval: spatial::DEFAULT_REFRESH_INTERVAL,
            seed: 0x5EED,
            max_round_ticks: 0,
            ai: AiConfig::default(),
        }
    }
}

fn env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(width) = std::env::var("ARENA_WIDTH") {
            match width.parse::<f32>() {
                Ok(parsed) if parsed >= 100.0 && parsed <= 20_000.0 => config.arena_width = parsed,
                _ => tracing::warn!("ARENA_WIDTH must be 100-20000, got '{}', using default", width),
            }
        }

        if let Ok(height) = std::env::var("ARENA_HEIGHT") {
            match height.parse::<f32>() {
                Ok(parsed) if parsed >= 100.0 && parsed <= 20_000.0 => config.arena_height = parsed,
                _ => tracing::warn!("ARENA_HEIGHT must be 100-20000, got '{}', using default", height),
            }
        }

        if let Ok(width) = std::env::var("LINE_WIDTH") {
            match width.parse::<f32>() {
                Ok(parsed) if parsed >= 1.0 && parsed <= 50.0 => config.line_width = parsed,
                _ => tracing::warn!("LINE_WIDTH must be 1-50, got '{}', using default", width),
            }
        }

        if let Ok(fps) = std::env::var("MAX_FPS") {
            match fps.parse::<u32>() {
                Ok(parsed) if parsed > 0 && parsed <= 1000 => config.max_fps = parsed,
                _ => tracing::warn!("MAX_FPS must be 1-1000, got '{}', using default", fps),
            }
        }

        if let Ok(difficulty) = std::env::var("DIFFICULTY") {
            config.difficulty = Difficulty::parse_or_default(&difficulty);
        }

        if let Ok(offload) = std::env::var("AI_OFFLOAD") {
            match env_flag(&offload) {
                Some(flag) => config.ai_offload = flag,
                None => tracing::warn!("Invalid AI_OFFLOAD '{}', using default", offload),
            }
        }

        if let Ok(powerups) = std::env::var("POWERUPS") {
            match env_flag(&powerups) {
                Some(flag) => config.powerups = flag,
                None => tracing::warn!("Invalid POWERUPS '{}', using default", powerups),
            }
        }

        if let Ok(interval) = std::env::var("SPATIAL_REFRESH_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(parsed) if parsed > 0 && parsed <= 600 => config.spatial_refresh_interval = parsed,
                _ => tracing::warn!(
                    "SPATIAL_REFRESH_INTERVAL must be 1-600, got '{}', using default",
                    interval
                ),
            }
        }

        if let Ok(seed) = std::env::var("SIM_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => config.seed = parsed,
                Err(_) => tracing::warn!("Invalid SIM_SEED '{}', using default", seed),
            }
        }

        if let Ok(cap) = std::env::var("MAX_ROUND_TICKS") {
            match cap.parse::<u64>() {
                Ok(parsed) => config.max_round_ticks = parsed,
                Err(_) => tracing::warn!("Invalid MAX_ROUND_TICKS '{}', using default", cap),
            }
        }

        config.ai = AiConfig::load_or_default();
        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !(self.arena_width > 0.0 && self.arena_height > 0.0) {
            return Err("Arena dimensions must be positive".to_string());
        }
        if self.line_width <= 0.0 {
            return Err("line_width must be positive".to_string());
        }
        if self.line_width * 4.0 >= self.arena_width.min(self.arena_height) {
            return Err("line_width is too large for the arena".to_string());
        }
        if self.max_fps == 0 {
            return Err("max_fps must be at least 1".to_string());
        }
        if self.spatial_refresh_interval == 0 {
            return Err("spatial_refresh_interval must be at least 1".to_string());
        }
        let settings = self.difficulty.settings();
        if settings.gap_frequency.0 > settings.gap_frequency.1 {
            return Err("gap_frequency range is inverted".to_string());
        }
        self.ai.validate()
    }

    /// Difficulty table for the configured tier
    pub fn settings(&self) -> DifficultySettings {
        self.difficulty.settings()
    }

    /// Spatial index cell size (3x the base line width)
    pub fn cell_size(&self) -> f32 {
        self.line_width * spatial::CELL_SIZE_FACTOR
    }

    /// Effective AI randomness (override wins over the difficulty table)
    pub fn ai_randomness(&self) -> f32 {
        self.ai
            .randomness_override
            .unwrap_or_else(|| self.settings().randomness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.line_width, 10.0);
        assert_eq!(config.max_fps, 60);
        assert_eq!(config.difficulty, Difficulty::Medium);
        assert_eq!(config.spatial_refresh_interval, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.line_width > 0.0);
        assert!(config.max_fps > 0);
    }

    #[test]
    fn test_difficulty_tables() {
        let easy = Difficulty::Easy.settings();
        let medium = Difficulty::Medium.settings();
        let hard = Difficulty::Hard.settings();

        assert_eq!(easy.look_ahead, 30);
        assert_eq!(medium.gap_frequency, (50, 80));
        assert_eq!(hard.angle_delta, 5.0);
        assert!(easy.randomness > medium.randomness && medium.randomness > hard.randomness);
        assert!(easy.reaction_interval() > hard.reaction_interval());
    }

    #[test]
    fn test_reaction_interval_and_ai_speed() {
        let medium = Difficulty::Medium.settings();
        assert_eq!(medium.reaction_interval(), 24);
        assert!((medium.ai_tick_speed() - 1.9).abs() < 1e-5);

        let hard = Difficulty::Hard.settings();
        assert_eq!(hard.reaction_interval(), 8);
    }

    #[test]
    fn test_difficulty_parse_case_insensitive() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("nightmare".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::parse_or_default("nightmare"), Difficulty::Medium);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("planner".parse::<AiPolicy>(), Ok(AiPolicy::Planner));
        assert_eq!("Pairwise".parse::<AiPolicy>(), Ok(AiPolicy::Pairwise));
        assert_eq!("fan".parse::<AiPolicy>(), Ok(AiPolicy::SensorFan));
        assert!("magic".parse::<AiPolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.spatial_refresh_interval = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.line_width = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.ai.danger_distance = 50.0;
        assert!(config.validate().is_err(), "Bands out of order must be rejected");
    }

    #[test]
    fn test_randomness_override() {
        let mut config = SimConfig::default();
        assert!((config.ai_randomness() - 0.05).abs() < 1e-6);
        config.ai.randomness_override = Some(0.0);
        assert_eq!(config.ai_randomness(), 0.0);
    }

    #[test]
    fn test_cell_size_tracks_line_width() {
        let config = SimConfig::default();
        assert_eq!(config.cell_size(), 30.0);
    }
}
