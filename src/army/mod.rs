//! The shadow army: allocation, resurrection and extraction

pub mod allocator;
pub mod extraction;
pub mod resurrection;

pub use allocator::{expected_share, split_roster, ArmyAllocator};
pub use extraction::{AwaitingExtraction, BossExtraction, ExtractionSystem};
pub use resurrection::{revive_cost, ResurrectionEconomy, ReviveAttempt};
