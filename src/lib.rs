//! Shadow Dungeons - dungeon encounters fought by a shared shadow army
//!
//! Channel activity opens rank-scaled dungeons. Each one grows a mob
//! population, fields a share of the user's shadow army against it, and
//! resolves into experience and extraction chances.

pub mod army;
pub mod combat;
pub mod core;
pub mod dungeon;
pub mod host;
pub mod runtime;
pub mod simulation;
pub mod store;

pub use crate::core::{DungeonConfig, DungeonError, Result};
pub use crate::simulation::{DungeonEngine, DungeonEvent};
