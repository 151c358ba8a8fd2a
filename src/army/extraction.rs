//! Extraction of new units from defeated mobs and bosses
//!
//! Mobs get one implicit attempt the moment they die. A slain boss keeps
//! its encounter alive in a grace window where the user may try again until
//! the roster reports no attempts left or the window closes.

use ahash::AHashMap;

use crate::combat::math::xp_rank_multiplier;
use crate::core::error::{DungeonError, Result};
use crate::core::types::{ChannelKey, Millis, Rank, Stats};
use crate::dungeon::encounter::{Encounter, Mob};
use crate::host::{ExtractionOutcome, ExtractionRequest, RosterProvider, Unit, UserSnapshot};

/// Power figure the roster uses to weigh an extraction
pub fn target_power(stats: &Stats, rank: Rank) -> f64 {
    stats.total() * xp_rank_multiplier(rank)
}

fn mob_target_id(encounter: &Encounter, mob: &Mob) -> String {
    format!("{}:mob:{}", encounter.id.0, mob.id.0)
}

/// An encounter kept past its boss kill for extraction
#[derive(Debug, Clone)]
pub struct AwaitingExtraction {
    pub encounter: Encounter,
    pub expires_at: Millis,
    pub attempts_remaining: Option<u32>,
}

/// Answer to a boss extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub struct BossExtraction {
    pub outcome: ExtractionOutcome,
    /// The record was purged; its persisted state should go too
    pub window_closed: bool,
}

#[derive(Debug, Default)]
pub struct ExtractionSystem {
    grace_ms: Millis,
    awaiting: AHashMap<ChannelKey, AwaitingExtraction>,
    pub mob_attempts: u64,
    pub mob_extractions: u64,
}

impl ExtractionSystem {
    pub fn new(grace_ms: Millis) -> Self {
        Self {
            grace_ms,
            ..Self::default()
        }
    }

    /// The single implicit attempt on a mob that just died
    pub fn attempt_mob(
        &mut self,
        roster: &mut dyn RosterProvider,
        user: &UserSnapshot,
        encounter: &Encounter,
        mob: &Mob,
    ) -> Option<Unit> {
        let request = ExtractionRequest {
            target_id: mob_target_id(encounter, mob),
            target_name: mob.beast.name(),
            user_rank: user.rank,
            user_level: user.level,
            user_stats: user.stats,
            target_rank: mob.rank,
            target_stats: mob.stats,
            target_power: target_power(&mob.stats, mob.rank),
            allowed_families: encounter.biome.families(),
        };

        self.mob_attempts += 1;
        let outcome = roster.attempt_extraction(&request);
        if let Some(err) = &outcome.error {
            tracing::debug!("Mob extraction in {} rejected: {}", encounter.key(), err);
        }
        if outcome.success {
            self.mob_extractions += 1;
        }
        outcome.unit.filter(|_| outcome.success)
    }

    /// Keep a boss-slain encounter for the grace window
    pub fn retain(&mut self, mut encounter: Encounter, now: Millis) {
        let expires_at = encounter
            .extraction_deadline
            .unwrap_or(now + self.grace_ms);
        encounter.extraction_deadline = Some(expires_at);
        encounter.mark_dirty();

        tracing::info!(
            "Boss {} in {} awaits extraction until {}",
            encounter.boss.name,
            encounter.key(),
            expires_at
        );

        self.awaiting.insert(
            encounter.key(),
            AwaitingExtraction {
                encounter,
                expires_at,
                attempts_remaining: None,
            },
        );
    }

    pub fn is_awaiting(&self, key: &ChannelKey) -> bool {
        self.awaiting.contains_key(key)
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&AwaitingExtraction> {
        self.awaiting.get(key)
    }

    pub fn len(&self) -> usize {
        self.awaiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awaiting.is_empty()
    }

    /// Try to extract the boss retained for `key`
    ///
    /// The attempt count lives with the roster, keyed by the stable boss id.
    pub fn attempt_boss(
        &mut self,
        key: &ChannelKey,
        now: Millis,
        roster: &mut dyn RosterProvider,
        user: &UserSnapshot,
    ) -> Result<BossExtraction> {
        let record = self
            .awaiting
            .get_mut(key)
            .ok_or_else(|| DungeonError::UnknownEncounter(key.clone()))?;

        if now >= record.expires_at {
            self.awaiting.remove(key);
            return Err(DungeonError::Extraction(format!(
                "extraction window in {} has closed",
                key
            )));
        }

        let boss = &record.encounter.boss;
        let request = ExtractionRequest {
            target_id: boss.id.to_string(),
            target_name: &boss.name,
            user_rank: user.rank,
            user_level: user.level,
            user_stats: user.stats,
            target_rank: boss.rank,
            target_stats: boss.stats,
            target_power: target_power(&boss.stats, boss.rank),
            allowed_families: record.encounter.biome.families(),
        };

        let outcome = roster.attempt_extraction(&request);
        record.attempts_remaining = outcome.attempts_remaining;

        let window_closed = outcome.success || outcome.attempts_remaining == Some(0);
        if window_closed {
            self.awaiting.remove(key);
            tracing::info!(
                "Extraction window in {} closed ({})",
                key,
                if outcome.success { "extracted" } else { "no attempts left" }
            );
        }

        Ok(BossExtraction {
            outcome,
            window_closed,
        })
    }

    /// Purge every record whose window has passed
    pub fn sweep(&mut self, now: Millis) -> Vec<AwaitingExtraction> {
        let expired: Vec<ChannelKey> = self
            .awaiting
            .iter()
            .filter(|(_, r)| now >= r.expires_at)
            .map(|(k, _)| k.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                tracing::info!("Extraction window in {} expired", key);
                self.awaiting.remove(&key)
            })
            .collect()
    }

    /// Records with unsaved changes, cleared as they are returned
    pub fn take_dirty(&mut self) -> Vec<Encounter> {
        self.awaiting
            .values_mut()
            .filter(|r| r.encounter.dirty)
            .map(|r| {
                r.encounter.dirty = false;
                r.encounter.clone()
            })
            .collect()
    }
}
