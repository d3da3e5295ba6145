//! Ray casting from a player's head

use smallvec::SmallVec;

use crate::game::constants::sensor::{
    DEFAULT_FAN, DETECTION_RADIUS_FACTOR, RAY_STEPS, SELF_SKIP, WALL_BUFFER_FACTOR,
};
use crate::game::state::PlayerId;
use crate::game::systems::collision::{trail_contact, wall_contact, ArenaView};
use crate::util::vec2::Vec2;

/// One ray of a sensor fan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSpec {
    /// Offset from the heading in degrees (negative = left)
    pub angle: f32,
    pub max_length: f32,
}

impl SensorSpec {
    pub const fn new(angle: f32, max_length: f32) -> Self {
        Self { angle, max_length }
    }
}

/// Result of casting one ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub angle: f32,
    pub distance: f32,
    pub max_length: f32,
}

impl SensorReading {
    #[inline]
    pub fn is_left(&self) -> bool {
        self.angle < 0.0
    }

    #[inline]
    pub fn hit(&self) -> bool {
        self.distance < self.max_length
    }
}

/// Fan readings, closest first
pub type SensorFan = SmallVec<[SensorReading; 16]>;

/// The standard 13-ray fan
pub fn default_fan() -> SmallVec<[SensorSpec; 16]> {
    DEFAULT_FAN
        .iter()
        .map(|&(angle, max_length)| SensorSpec::new(angle, max_length))
        .collect()
}

/// Distance along `direction` to the first wall or solid trail point.
///
/// Samples `RAY_STEPS` evenly spaced points up to `max_length`. A sample
/// within twice the line width of a wall, or within three line widths of a
/// trail point, stops the ray. Returns exactly `max_length` on a clear ray.
pub fn cast_ray(
    view: &ArenaView<'_>,
    origin: Vec2,
    direction: Vec2,
    max_length: f32,
    caster: PlayerId,
) -> f32 {
    if max_length <= 0.0 {
        return 0.0;
    }
    let step = max_length / RAY_STEPS as f32;
    let wall_buffer = view.line_width * WALL_BUFFER_FACTOR;
    let radius = view.line_width * DETECTION_RADIUS_FACTOR;

    for i in 1..=RAY_STEPS {
        let distance = i as f32 * step;
        let sample = origin + direction * distance;

        if wall_contact(sample, wall_buffer, view.bounds) {
            return distance;
        }
        if trail_contact(view, sample, radius, caster, SELF_SKIP).is_some() {
            return distance;
        }
    }

    max_length
}

/// Cast every ray of `specs` relative to `heading` (unit vector) and sort
/// the readings by distance. Ties keep the order of `specs`.
pub fn cast_fan(
    view: &ArenaView<'_>,
    origin: Vec2,
    heading: Vec2,
    specs: &[SensorSpec],
    caster: PlayerId,
) -> SensorFan {
    let mut readings: SensorFan = specs
        .iter()
        .map(|spec| SensorReading {
            angle: spec.angle,
            distance: cast_ray(
                view,
                origin,
                heading.rotate_degrees(spec.angle),
                spec.max_length,
                caster,
            ),
            max_length: spec.max_length,
        })
        .collect();
    readings.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    readings
}

/// Reading for the sensor at `angle`, if the fan has one
pub fn reading_at(fan: &[SensorReading], angle: f32) -> Option<&SensorReading> {
    fan.iter().find(|r| r.angle == angle)
}
