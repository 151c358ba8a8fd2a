//! Combat math shared by every scheduler

pub mod behavior;
pub mod constants;
pub mod math;

pub use behavior::Behavior;
pub use math::{damage, resolve_damage, DamageRoll};
