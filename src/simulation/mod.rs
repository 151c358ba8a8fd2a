pub mod combat;
pub mod completion;
pub mod engine;
pub mod events;
pub mod regen;
pub mod timers;

pub use completion::{distribute_xp, unit_xp, user_xp};
pub use engine::DungeonEngine;
pub use events::{Attacker, DungeonEvent, XpReport};
pub use regen::{regenerate, RegenTick};
pub use timers::{TaskKind, TimerQueue};
