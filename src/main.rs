use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use lightcycle_arena::config::SimConfig;
use lightcycle_arena::game::game_loop::{PlayerSetup, SimEvent, SimulationLoop};
use lightcycle_arena::game::match_result::{RoundResult, RoundResultSink, ScoreBoard};
use lightcycle_arena::game::performance::FrameStats;
use lightcycle_arena::game::render::NullRenderer;

/// Headless rounds are capped at this many seconds of simulated play
const DEFAULT_ROUND_SECONDS: u64 = 180;

fn env_or<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', using default {}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Lightcycle Arena v{}", env!("CARGO_PKG_VERSION"));

    let mut config = SimConfig::load_or_default();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        anyhow::bail!("invalid configuration: {}", e);
    }
    if config.max_round_ticks == 0 {
        config.max_round_ticks = DEFAULT_ROUND_SECONDS * config.max_fps as u64;
    }

    let rounds: u32 = env_or("ROUNDS", 3);
    let player_count: usize = env_or("PLAYER_COUNT", 4);
    let fast = std::env::var("HEADLESS_FAST").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    info!(
        "Configuration loaded: {}x{} arena, {:?}, {} players, {} rounds, offload={}, fast={}",
        config.arena_width, config.arena_height, config.difficulty, player_count, rounds, config.ai_offload, fast
    );

    let roster: Vec<PlayerSetup> = (0..player_count)
        .map(|i| PlayerSetup::ai(format!("AI {}", i + 1)))
        .collect();
    let frame_duration = Duration::from_secs_f64(1.0 / config.max_fps as f64);

    let mut sim = SimulationLoop::new(config.clone()).context("failed to build simulation")?;
    let mut scores = ScoreBoard::new(player_count);
    let mut renderer = NullRenderer::new();
    let mut stats = FrameStats::new(config.max_fps);
    let mut results: Vec<RoundResult> = Vec::new();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    'rounds: for round in 1..=rounds {
        sim.start_round(&roster).with_context(|| format!("failed to start round {}", round))?;
        let mut ticker = interval(frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if fast {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("Shutdown signal received");
                        break 'rounds;
                    }
                    _ = tokio::task::yield_now() => {}
                }
            } else {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown signal received");
                        break 'rounds;
                    }
                    _ = ticker.tick() => {}
                }
            }

            stats.frame_start();
            let events = sim.tick();
            sim.render(&mut renderer);
            stats.frame_end();

            let tick = sim.state().tick;
            if tick % 10 == 0 {
                debug!(
                    tick,
                    fps = stats.average_fps(),
                    over_budget = stats.over_budget(),
                    "Frame stats"
                );
            }

            for event in events {
                match event {
                    SimEvent::PlayerEliminated { player, tick, cause } => {
                        info!(round, player, tick, ?cause, "Eliminated");
                    }
                    #[cfg(feature = "powerups")]
                    SimEvent::PowerupCollected { player, kind } => {
                        info!(round, player, kind = kind.name(), "Powerup collected");
                    }
                    SimEvent::RoundOver(result) => {
                        scores.record_round(&result);
                        results.push(result);
                        continue 'rounds;
                    }
                }
            }
        }
    }

    for (player, total) in scores.standings() {
        info!(player, total, "Standings");
    }

    let summary = serde_json::json!({
        "rounds": results,
        "standings": scores.standings(),
        "frames": renderer.frames(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("Simulation stopped");
    Ok(())
}
