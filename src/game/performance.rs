//! Frame timing statistics
//!
//! Tracks a rolling window of frame durations so the runner can report the
//! achieved frame rate and whether frames overrun the display budget.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::game::constants::round::FRAME_STATS_SAMPLES;

/// Rolling frame-duration window
pub struct FrameStats {
    /// Most recent frame durations, oldest first
    durations: VecDeque<Duration>,
    max_samples: usize,
    /// Frame budget (1 / max FPS)
    budget: Duration,
    frame_start: Option<Instant>,
    frames: u64,
}

impl FrameStats {
    pub fn new(max_fps: u32) -> Self {
        Self {
            durations: VecDeque::with_capacity(FRAME_STATS_SAMPLES),
            max_samples: FRAME_STATS_SAMPLES,
            budget: Duration::from_secs_f64(1.0 / max_fps.max(1) as f64),
            frame_start: None,
            frames: 0,
        }
    }

    pub fn frame_start(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Stop timing the current frame; no-op without a matching start
    pub fn frame_end(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.record(start.elapsed());
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.durations.push_back(duration);
        while self.durations.len() > self.max_samples {
            self.durations.pop_front();
        }
        self.frames += 1;
    }

    pub fn average_frame_duration(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.durations.iter().sum();
        sum / self.durations.len() as u32
    }

    /// Frames per second implied by the average duration (0 before any sample)
    pub fn average_fps(&self) -> f64 {
        let avg = self.average_frame_duration().as_secs_f64();
        if avg <= 0.0 {
            0.0
        } else {
            1.0 / avg
        }
    }

    /// Average frame exceeds the budget
    pub fn over_budget(&self) -> bool {
        !self.durations.is_empty() && self.average_frame_duration() > self.budget
    }

    #[inline]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.durations.len()
    }

    /// Frames recorded since creation
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
