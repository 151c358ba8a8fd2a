//! Interfaces to the host application
//!
//! The roster, the user's resource pool and stats, notifications and the
//! current channel all belong to other subsystems. The engine sees them
//! only through these traits, resolved once at startup.

pub mod availability;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::core::types::{ChannelInfo, Rank, Stats, UnitId};
use crate::dungeon::biome::BeastFamily;

pub use availability::{Availability, Collaborator};

/// A permanent combat unit owned by the army subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub rank: Rank,
    pub level: u32,
    pub xp: u64,
    pub stats: Stats,
}

/// Notification severity, mapped by the host to its own toast styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Point-in-time view of the user from the stats subsystem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserSnapshot {
    pub rank: Rank,
    pub level: u32,
    pub stats: Stats,
}

/// Everything the roster needs to roll an extraction
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    /// Stable id of the defeated entity; attempts are counted per id
    pub target_id: String,
    pub target_name: &'a str,
    pub user_rank: Rank,
    pub user_level: u32,
    pub user_stats: Stats,
    pub target_rank: Rank,
    pub target_stats: Stats,
    pub target_power: f64,
    pub allowed_families: &'a [BeastFamily],
}

/// Answer of the roster to an extraction attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub unit: Option<Unit>,
    pub attempts_remaining: Option<u32>,
    pub error: Option<String>,
}

/// The external army roster
pub trait RosterProvider {
    fn all_units(&self) -> Vec<Unit>;
    fn attempt_extraction(&mut self, request: &ExtractionRequest<'_>) -> ExtractionOutcome;
    fn grant_xp(&mut self, amount: u64, reason: &str, unit_ids: &[UnitId]);
    fn effective_stats(&self, unit: &Unit) -> Stats;
}

/// The user's HP and mana
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourcePool {
    pub hp: f64,
    pub max_hp: f64,
    pub mana: f64,
    pub max_mana: f64,
}

pub trait ResourcePoolProvider {
    /// Freshest values
    fn pool(&self) -> ResourcePool;
    fn set_pool(&mut self, pool: ResourcePool);
    /// Tell the host UI that values changed
    fn notify_changed(&mut self);
}

/// The stats subsystem: user rank, level and attributes
pub trait UserProfileProvider {
    fn rank(&self) -> Rank;
    fn level(&self) -> u32;
    fn stats(&self) -> Stats;
    fn grant_xp(&mut self, amount: u64, reason: &str);
}

pub trait NotificationSink {
    fn notify(&mut self, message: &str, severity: Severity);
}

pub trait ChannelContextProvider {
    fn current_channel(&self) -> Option<ChannelInfo>;
}

/// All collaborators, each with its own availability
pub struct Host {
    pub roster: Collaborator<Box<dyn RosterProvider>>,
    pub pool: Collaborator<Box<dyn ResourcePoolProvider>>,
    pub user: Collaborator<Box<dyn UserProfileProvider>>,
    pub notifier: Collaborator<Box<dyn NotificationSink>>,
    pub channel: Collaborator<Box<dyn ChannelContextProvider>>,
}

impl Host {
    /// Host whose collaborators are all available immediately
    pub fn ready(
        roster: Box<dyn RosterProvider>,
        pool: Box<dyn ResourcePoolProvider>,
        user: Box<dyn UserProfileProvider>,
        notifier: Box<dyn NotificationSink>,
        channel: Box<dyn ChannelContextProvider>,
    ) -> Self {
        Self {
            roster: Collaborator::ready("roster", roster),
            pool: Collaborator::ready("resource pool", pool),
            user: Collaborator::ready("user profile", user),
            notifier: Collaborator::ready("notifications", notifier),
            channel: Collaborator::ready("channel context", channel),
        }
    }

    /// Retry every collaborator that is still pending
    ///
    /// Returns true while at least one is still pending.
    pub fn poll_pending(&mut self, now: u64, retry_ms: u64, max_attempts: u32) -> bool {
        let results = [
            self.roster.poll(now, retry_ms, max_attempts),
            self.pool.poll(now, retry_ms, max_attempts),
            self.user.poll(now, retry_ms, max_attempts),
            self.notifier.poll(now, retry_ms, max_attempts),
            self.channel.poll(now, retry_ms, max_attempts),
        ];
        results.iter().any(|a| matches!(a, Availability::Pending { .. }))
    }

    pub fn roster_units(&self) -> Vec<Unit> {
        self.roster.get().map(|r| r.all_units()).unwrap_or_default()
    }

    pub fn user_rank(&self) -> Rank {
        self.user.get().map(|u| u.rank()).unwrap_or(Rank::E)
    }

    pub fn user_snapshot(&self) -> Option<UserSnapshot> {
        self.user.get().map(|u| UserSnapshot {
            rank: u.rank(),
            level: u.level(),
            stats: u.stats(),
        })
    }

    pub fn current_channel(&self) -> Option<ChannelInfo> {
        self.channel.get().and_then(|c| c.current_channel())
    }

    /// Fire-and-forget notification; falls back to the log when unavailable
    pub fn notify(&mut self, message: &str, severity: Severity) {
        match self.notifier.get_mut() {
            Some(sink) => sink.notify(message, severity),
            None => tracing::info!("[{:?}] {}", severity, message),
        }
    }
}
