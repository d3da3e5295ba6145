pub mod collision;
pub mod sensor;
pub mod ai;
pub mod planner;

#[cfg(feature = "powerups")]
pub mod powerups;
