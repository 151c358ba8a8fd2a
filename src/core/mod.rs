pub mod config;
pub mod error;
pub mod types;

pub use config::DungeonConfig;
pub use error::{DungeonError, Result};
pub use types::{BossId, ChannelInfo, ChannelKey, EncounterId, Millis, MobId, Rank, Stats, UnitId};
