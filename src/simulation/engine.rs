//! The dungeon engine
//!
//! Owns the encounter registry and all simulation state. Nothing here reads
//! a clock: callers pass `now`, and [`DungeonEngine::advance`] fires every
//! task due up to that time in `(due, sequence)` order. Events produced
//! along the way are queued and handed back to the caller.

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::army::allocator::ArmyAllocator;
use crate::army::extraction::{BossExtraction, ExtractionSystem};
use crate::army::resurrection::ResurrectionEconomy;
use crate::core::config::DungeonConfig;
use crate::core::error::{DungeonError, Result};
use crate::core::types::{ChannelInfo, ChannelKey, Millis, Rank};
use crate::dungeon::encounter::{Encounter, Outcome, Participation};
use crate::dungeon::mobs::{is_stalled, spawn_tick};
use crate::dungeon::spawn::{SpawnController, SpawnRequest};
use crate::host::{Host, Severity};
use crate::simulation::combat::{self, CombatContext};
use crate::simulation::completion::distribute_xp;
use crate::simulation::events::DungeonEvent;
use crate::simulation::regen;
use crate::simulation::timers::{DueTask, TaskId, TaskKind, TimerQueue};
use crate::store::PersistenceSink;

pub struct DungeonEngine {
    config: DungeonConfig,
    encounters: AHashMap<ChannelKey, Encounter>,
    spawner: SpawnController,
    timers: TimerQueue,
    allocator: ArmyAllocator,
    economy: ResurrectionEconomy,
    extraction: ExtractionSystem,
    host: Host,
    sink: Box<dyn PersistenceSink>,
    rng: ChaCha8Rng,
    outbox: Vec<DungeonEvent>,
    now: Millis,
    shut_down: bool,
}

fn live_pairs(encounters: &AHashMap<ChannelKey, Encounter>) -> Vec<(ChannelKey, Rank)> {
    encounters
        .values()
        .filter(|e| !e.is_terminal())
        .map(|e| (e.key(), e.rank))
        .collect()
}

impl DungeonEngine {
    pub fn new(
        config: DungeonConfig,
        host: Host,
        sink: Box<dyn PersistenceSink>,
        now: Millis,
    ) -> Result<Self> {
        config.validate()?;

        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut engine = Self {
            allocator: ArmyAllocator::new(config.allocation_ttl_ms),
            economy: ResurrectionEconomy::new(config.revive_warning_every),
            extraction: ExtractionSystem::new(config.extraction_grace_ms),
            config,
            encounters: AHashMap::new(),
            spawner: SpawnController::new(),
            timers: TimerQueue::new(),
            host,
            sink,
            rng,
            outbox: Vec::new(),
            now,
            shut_down: false,
        };
        engine.schedule_globals(now);
        Ok(engine)
    }

    fn schedule_globals(&mut self, now: Millis) {
        let c = &self.config;
        self.timers
            .every(TaskKind::Regeneration, None, now + c.regen_interval_ms, c.regen_interval_ms);
        self.timers.every(
            TaskKind::ExtractionSweep,
            None,
            now + c.extraction_sweep_interval_ms,
            c.extraction_sweep_interval_ms,
        );
        self.timers.every(
            TaskKind::PersistSweep,
            None,
            now + c.persist_interval_ms,
            c.persist_interval_ms,
        );

        if self
            .host
            .poll_pending(now, c.collaborator_retry_ms, c.collaborator_max_attempts)
        {
            self.timers.every(
                TaskKind::CollaboratorRetry,
                None,
                now + c.collaborator_retry_ms,
                c.collaborator_retry_ms,
            );
        }
    }

    fn schedule_encounter(&mut self, encounter: &Encounter, now: Millis) {
        let c = &self.config;
        let key = Some(encounter.key());

        if !encounter.mobs.is_filled() {
            self.timers.every(
                TaskKind::MobSpawn,
                key.clone(),
                now + c.mob_spawn_interval_ms,
                c.mob_spawn_interval_ms,
            );
            self.timers.every(
                TaskKind::CapacityMonitor,
                key.clone(),
                now + c.capacity_monitor_interval_ms,
                c.capacity_monitor_interval_ms,
            );
        }
        self.timers.every(
            TaskKind::ShadowAttack,
            key.clone(),
            now + c.shadow_attack_interval_ms,
            c.shadow_attack_interval_ms,
        );
        self.timers.every(
            TaskKind::BossAttack,
            key.clone(),
            now + c.boss_attack_interval_ms,
            c.boss_attack_interval_ms,
        );
        self.timers.every(
            TaskKind::MobAttack,
            key.clone(),
            now + c.mob_attack_interval_ms,
            c.mob_attack_interval_ms,
        );
        self.timers.once(TaskKind::Expiry, key, encounter.expires_at);
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &DungeonConfig {
        &self.config
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn encounter(&self, key: &ChannelKey) -> Option<&Encounter> {
        self.encounters.get(key)
    }

    pub fn encounters(&self) -> impl Iterator<Item = &Encounter> {
        self.encounters.values()
    }

    pub fn live_count(&self) -> usize {
        self.encounters.len()
    }

    pub fn extraction(&self) -> &ExtractionSystem {
        &self.extraction
    }

    pub fn economy(&self) -> &ResurrectionEconomy {
        &self.economy
    }

    pub fn allocator(&self) -> &ArmyAllocator {
        &self.allocator
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn pending_tasks(&self) -> usize {
        self.timers.len()
    }

    pub fn has_task(&self, key: &ChannelKey, kind: TaskKind) -> bool {
        self.timers.has(key, kind)
    }

    /// Earliest time something is scheduled
    pub fn next_due(&mut self) -> Option<Millis> {
        self.timers.next_due()
    }

    /// Events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<DungeonEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn live_ranks(&self) -> Vec<Rank> {
        self.encounters
            .values()
            .filter(|e| !e.is_terminal())
            .map(|e| e.rank)
            .collect()
    }

    // === OPERATIONS ===

    /// Activity observed in a channel
    ///
    /// Rolls for a new dungeon when the channel has none; otherwise the user
    /// attacks if they take part in it and are looking at that channel.
    pub fn on_activity(&mut self, channel: &ChannelInfo, now: Millis) -> Vec<DungeonEvent> {
        if self.shut_down {
            return Vec::new();
        }
        self.run_due(now);

        let key = channel.key();
        if self.encounters.contains_key(&key) {
            let watching_channel = self
                .host
                .current_channel()
                .map_or(false, |current| current.key() == key);
            if watching_channel {
                self.user_attack(&key, now);
            }
        } else {
            self.try_spawn(channel, now);
        }
        self.drain_events()
    }

    /// Roll for a dungeon in `channel`
    pub fn try_spawn(&mut self, channel: &ChannelInfo, now: Millis) -> Option<&Encounter> {
        if self.shut_down {
            return None;
        }
        let key = channel.key();
        let occupied = self.encounters.contains_key(&key) || self.extraction.is_awaiting(&key);
        let live_ranks = self.live_ranks();
        let request = SpawnRequest {
            channel,
            occupied,
            user_rank: self.host.user_rank(),
            roster_size: self.host.roster_units().len(),
            live_ranks: &live_ranks,
        };

        let mut encounter = self
            .spawner
            .try_spawn(&request, &self.config, now, &mut self.rng)?;

        self.sink.save(&encounter);
        encounter.dirty = false;
        self.allocator.invalidate();
        self.schedule_encounter(&encounter, now);

        self.outbox.push(DungeonEvent::Spawned {
            channel: key.clone(),
            name: encounter.name.clone(),
            rank: encounter.rank,
            boss: encounter.boss.name.clone(),
            target_mobs: encounter.mobs.target_count,
        });
        let message = format!("A {}-rank dungeon has opened: {}", encounter.rank, encounter.name);
        self.host.notify(&message, Severity::Info);

        self.encounters.insert(key.clone(), encounter);
        self.encounters.get(&key)
    }

    fn set_participation(&mut self, key: &ChannelKey, participation: Participation) -> Result<()> {
        let encounter = self
            .encounters
            .get_mut(key)
            .filter(|e| !e.is_terminal())
            .ok_or_else(|| DungeonError::UnknownEncounter(key.clone()))?;
        if encounter.participation != participation {
            encounter.participation = participation;
            encounter.mark_dirty();
            tracing::info!("User is now {:?} in {}", participation, key);
        }
        Ok(())
    }

    /// The user enters the fight in `key`
    pub fn join(&mut self, key: &ChannelKey) -> Result<()> {
        self.set_participation(key, Participation::Participating)
    }

    /// The user leaves the fight in `key` to the army
    pub fn watch(&mut self, key: &ChannelKey) -> Result<()> {
        self.set_participation(key, Participation::Watching)
    }

    /// Run every task due up to `now`
    pub fn advance(&mut self, now: Millis) -> Vec<DungeonEvent> {
        self.run_due(now);
        self.drain_events()
    }

    fn run_due(&mut self, now: Millis) {
        if self.shut_down {
            return;
        }
        let now = now.max(self.now);
        self.now = now;

        while let Some(task) = self.timers.pop_due(now) {
            self.run_task(task);
        }
    }

    fn run_task(&mut self, due: DueTask) {
        let DueTask { id, due, task } = due;
        match task.kind {
            TaskKind::Regeneration => self.regenerate(),
            TaskKind::ExtractionSweep => self.sweep_extractions(due),
            TaskKind::PersistSweep => self.persist_dirty(),
            TaskKind::CollaboratorRetry => self.retry_collaborators(id, due),
            kind => {
                if let Some(key) = task.encounter {
                    self.run_encounter_task(kind, &key, due);
                }
            }
        }
    }

    fn run_encounter_task(&mut self, kind: TaskKind, key: &ChannelKey, now: Millis) {
        let Some(encounter) = self.encounters.get(key) else {
            self.timers.cancel_encounter(key);
            return;
        };
        if encounter.is_terminal() {
            return;
        }

        let outcome = match kind {
            TaskKind::MobSpawn | TaskKind::CapacityMonitor => {
                self.grow_mobs(kind, key, now);
                None
            }
            TaskKind::Expiry => Some(if encounter.mobs.is_cleared() {
                Outcome::Cleared
            } else {
                Outcome::TimedOut
            }),
            TaskKind::ShadowAttack | TaskKind::BossAttack | TaskKind::MobAttack => {
                self.combat_tick(kind, key, now)
            }
            _ => None,
        };

        if let Some(outcome) = outcome {
            self.resolve_at(key, outcome, now);
        }
    }

    fn grow_mobs(&mut self, kind: TaskKind, key: &ChannelKey, now: Millis) {
        let Some(encounter) = self.encounters.get_mut(key) else {
            return;
        };

        if kind == TaskKind::CapacityMonitor
            && !encounter.mobs.is_filled()
            && !is_stalled(&encounter.mobs, &self.config, now)
        {
            return;
        }
        if kind == TaskKind::CapacityMonitor && !encounter.mobs.is_filled() {
            tracing::debug!("Mob growth stalled in {}, forcing a spawn tick", key);
        }

        let tick = spawn_tick(encounter, &self.config, now, &mut self.rng);
        if tick.spawned > 0 {
            self.outbox.push(DungeonEvent::MobsSpawned {
                channel: key.clone(),
                count: tick.spawned,
                total: encounter.mobs.total,
            });
        }

        if tick.filled {
            let total = encounter.mobs.total;
            self.timers.cancel_kind(key, TaskKind::MobSpawn);
            self.timers.cancel_kind(key, TaskKind::CapacityMonitor);
            tracing::info!("{} reached its population of {} mobs", key, total);
            self.outbox.push(DungeonEvent::SpawningComplete {
                channel: key.clone(),
                total,
            });
        }
    }

    fn refresh_allocation(&mut self, now: Millis) {
        let encounters = &self.encounters;
        let host = &self.host;
        self.allocator
            .refresh(now, || host.roster_units(), || live_pairs(encounters));
    }

    fn combat_tick(&mut self, kind: TaskKind, key: &ChannelKey, now: Millis) -> Option<Outcome> {
        self.refresh_allocation(now);
        let fighters = combat::fighters(
            self.allocator.units_for(key),
            self.host.roster.get().map(|r| &**r),
        );
        let user = self.host.user_snapshot();

        let encounter = self.encounters.get_mut(key)?;
        let mut ctx = CombatContext {
            config: &self.config,
            fighters: &fighters,
            user,
            host: &mut self.host,
            economy: &mut self.economy,
            extraction: &mut self.extraction,
            rng: &mut self.rng,
            events: &mut self.outbox,
        };

        match kind {
            TaskKind::ShadowAttack => combat::shadow_tick(encounter, &mut ctx, now),
            TaskKind::BossAttack => combat::boss_tick(encounter, &mut ctx, now),
            TaskKind::MobAttack => combat::mob_tick(encounter, &mut ctx, now),
            _ => None,
        }
    }

    fn user_attack(&mut self, key: &ChannelKey, now: Millis) {
        let user = self.host.user_snapshot();
        let Some(encounter) = self.encounters.get_mut(key) else {
            return;
        };
        let mut ctx = CombatContext {
            config: &self.config,
            fighters: &[],
            user,
            host: &mut self.host,
            economy: &mut self.economy,
            extraction: &mut self.extraction,
            rng: &mut self.rng,
            events: &mut self.outbox,
        };

        if let Some(outcome) = combat::user_attack(encounter, &mut ctx) {
            self.resolve_at(key, outcome, now);
        }
    }

    fn regenerate(&mut self) {
        let Some(user) = self.host.user_snapshot() else {
            return;
        };
        if let Some(pool) = self.host.pool.get_mut() {
            regen::regenerate(pool.as_mut(), &user);
        }
    }

    fn retry_collaborators(&mut self, id: TaskId, now: Millis) {
        let c = &self.config;
        let pending = self
            .host
            .poll_pending(now, c.collaborator_retry_ms, c.collaborator_max_attempts);
        if !pending {
            self.timers.cancel(id);
            self.allocator.invalidate();
        }
    }

    fn persist_dirty(&mut self) {
        for encounter in self.encounters.values_mut().filter(|e| e.dirty) {
            self.sink.save(encounter);
            encounter.dirty = false;
        }
        for encounter in self.extraction.take_dirty() {
            self.sink.save(&encounter);
        }
    }

    fn sweep_extractions(&mut self, now: Millis) {
        for record in self.extraction.sweep(now) {
            let key = record.encounter.key();
            self.sink.delete(&key);
            self.outbox.push(DungeonEvent::ExtractionClosed { channel: key });
        }
    }

    // === COMPLETION ===

    /// Finish the live encounter in `key`
    ///
    /// Returns false when there is nothing live to finish, so a second call
    /// for the same encounter does nothing.
    pub fn resolve(&mut self, key: &ChannelKey, outcome: Outcome) -> bool {
        let now = self.now;
        self.resolve_at(key, outcome, now)
    }

    fn resolve_at(&mut self, key: &ChannelKey, outcome: Outcome, now: Millis) -> bool {
        let Some(mut encounter) = self.encounters.remove(key) else {
            return false;
        };
        if !encounter.finish(outcome) {
            return false;
        }

        self.timers.cancel_encounter(key);
        self.allocator.invalidate();

        let xp = (outcome == Outcome::BossSlain)
            .then(|| distribute_xp(&encounter, &mut self.host, &self.config));
        let retain = outcome == Outcome::BossSlain && encounter.user_participating();

        let (message, severity) = match outcome {
            Outcome::BossSlain => (
                format!("{} has fallen in {}", encounter.boss.name, encounter.name),
                Severity::Success,
            ),
            Outcome::Cleared => (format!("{} has been cleared", encounter.name), Severity::Success),
            Outcome::TimedOut => (format!("{} has collapsed", encounter.name), Severity::Warning),
            Outcome::Defeated => (
                format!("You were defeated in {}", encounter.name),
                Severity::Error,
            ),
        };
        self.host.notify(&message, severity);

        tracing::info!(
            "{} finished as {:?} ({} mobs killed, boss at {:.0}/{:.0} HP)",
            key,
            outcome,
            encounter.mobs.killed,
            encounter.boss.hp,
            encounter.boss.max_hp
        );

        if retain {
            self.extraction.retain(encounter, now);
            if let Some(record) = self.extraction.get(key) {
                self.sink.save(&record.encounter);
            }
        } else {
            self.sink.delete(key);
        }

        self.outbox.push(DungeonEvent::Completed {
            channel: key.clone(),
            outcome,
            xp,
            awaiting_extraction: retain,
        });
        true
    }

    // === EXTRACTION ===

    /// Try to extract the boss slain in `key`
    pub fn attempt_boss_extraction(
        &mut self,
        key: &ChannelKey,
        now: Millis,
    ) -> Result<BossExtraction> {
        if self.shut_down {
            return Err(DungeonError::Unavailable("dungeon engine"));
        }
        let user = self
            .host
            .user_snapshot()
            .ok_or(DungeonError::Unavailable("user profile"))?;
        let roster = self
            .host
            .roster
            .get_mut()
            .ok_or(DungeonError::Unavailable("roster"))?;

        let result = self.extraction.attempt_boss(key, now, roster.as_mut(), &user);

        match &result {
            Ok(attempt) => {
                let extracted = attempt.outcome.unit.as_ref().filter(|_| attempt.outcome.success);
                if let Some(unit) = extracted {
                    self.allocator.invalidate();
                    self.outbox.push(DungeonEvent::BossExtracted {
                        channel: key.clone(),
                        unit: unit.id,
                    });
                    let message = format!("{} rises as your shadow", unit.name);
                    self.host.notify(&message, Severity::Success);
                } else if let Some(left) = attempt.outcome.attempts_remaining {
                    let message = format!("Extraction failed, {} attempt(s) left", left);
                    self.host.notify(&message, Severity::Info);
                }

                if attempt.window_closed {
                    self.sink.delete(key);
                    self.outbox.push(DungeonEvent::ExtractionClosed { channel: key.clone() });
                }
            }
            Err(DungeonError::Extraction(_)) => {
                self.sink.delete(key);
                self.outbox.push(DungeonEvent::ExtractionClosed { channel: key.clone() });
            }
            Err(_) => {}
        }
        result
    }

    // === RESTART ===

    /// Bring persisted encounters back after a restart
    ///
    /// Live encounters are rescheduled; an expiry already in the past fires
    /// on the next advance. Boss kills with an open extraction window are
    /// retained; anything else finished is purged.
    pub fn restore(&mut self, records: Vec<Encounter>, now: Millis) -> usize {
        if self.shut_down {
            return 0;
        }
        let mut restored = 0;

        for mut encounter in records {
            let key = encounter.key();
            if self.encounters.contains_key(&key) || self.extraction.is_awaiting(&key) {
                tracing::warn!("Ignoring duplicate record for {}", key);
                continue;
            }

            match encounter.outcome() {
                None => {
                    encounter.dirty = false;
                    self.spawner.record_spawn(key.clone(), encounter.start_time);
                    self.schedule_encounter(&encounter, now);
                    self.encounters.insert(key.clone(), encounter);
                    self.outbox.push(DungeonEvent::Restored { channel: key });
                    restored += 1;
                }
                Some(Outcome::BossSlain)
                    if encounter.extraction_deadline.map_or(false, |d| d > now) =>
                {
                    self.extraction.retain(encounter, now);
                    restored += 1;
                }
                Some(_) => self.sink.delete(&key),
            }
        }

        if restored > 0 {
            self.allocator.invalidate();
        }
        tracing::info!("Restored {} encounter(s)", restored);
        restored
    }

    /// Stop everything
    ///
    /// Dirty state is flushed once; every task is cancelled in bulk and later
    /// calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.persist_dirty();
        self.timers.cancel_all();
        self.shut_down = true;
        tracing::info!(
            "Dungeon engine stopped with {} live encounter(s)",
            self.encounters.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Stats;
    use crate::dungeon::encounter::fixtures::encounter;
    use crate::host::memory::{
        FixedChannel, InMemoryRoster, RecordingNotifier, SharedPool, StaticUser,
    };
    use crate::store::{EncounterStore, MemoryStore};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn host() -> Host {
        let stats = Stats::uniform(40.0);
        Host::ready(
            Box::new(InMemoryRoster::generate(30, Rank::C, 5)),
            Box::new(SharedPool::for_user(&stats, Rank::C)),
            Box::new(StaticUser::new(Rank::C, 25, stats)),
            Box::new(RecordingNotifier::new()),
            Box::new(FixedChannel::new(Some(ChannelInfo::new("guild", "channel")))),
        )
    }

    fn engine(store: &Rc<RefCell<MemoryStore>>) -> DungeonEngine {
        let config = DungeonConfig {
            spawn_chance: 1.0,
            rng_seed: Some(7),
            ..DungeonConfig::default()
        };
        DungeonEngine::new(config, host(), Box::new(store.clone()), 0).unwrap()
    }

    #[test]
    fn test_spawn_persists_and_schedules() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let channel = ChannelInfo::new("guild", "channel");

        let events = engine.on_activity(&channel, 0);

        assert!(matches!(events[0], DungeonEvent::Spawned { .. }));
        assert_eq!(engine.live_count(), 1);
        assert_eq!(store.borrow().len(), 1);
        assert!(engine.has_task(&channel.key(), TaskKind::ShadowAttack));
        assert!(engine.has_task(&channel.key(), TaskKind::Expiry));
    }

    #[test]
    fn test_one_encounter_per_channel() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let channel = ChannelInfo::new("guild", "channel");

        engine.on_activity(&channel, 0);
        let id = engine.encounter(&channel.key()).map(|e| e.id);
        engine.on_activity(&channel, 1_000);

        assert_eq!(engine.live_count(), 1);
        assert_eq!(engine.encounter(&channel.key()).map(|e| e.id), id);
        assert!(engine.try_spawn(&channel, 2_000).is_none());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let channel = ChannelInfo::new("guild", "other");
        engine.try_spawn(&channel, 0);
        let key = channel.key();

        assert!(engine.resolve(&key, Outcome::TimedOut));
        assert!(!engine.resolve(&key, Outcome::BossSlain));

        let completions = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, DungeonEvent::Completed { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(engine.pending_tasks(), 3);
        assert!(store.borrow().get(&key).unwrap().is_none());
    }

    #[test]
    fn test_expiry_times_out_unfinished_encounter() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let mut enc = encounter(Rank::E, 1.0e12, 1_000_000);
        enc.expires_at = 20_000;
        let key = enc.key();
        engine.restore(vec![enc], 0);

        let events = engine.advance(20_000);

        assert!(events.iter().any(|e| matches!(
            e,
            DungeonEvent::Completed {
                outcome: Outcome::TimedOut,
                ..
            }
        )));
        assert!(engine.encounter(&key).is_none());
        assert!(!engine.has_task(&key, TaskKind::ShadowAttack));
    }

    #[test]
    fn test_boss_kill_with_participation_opens_extraction() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let mut enc = encounter(Rank::E, 1.0, 0);
        enc.participation = Participation::Participating;
        let key = enc.key();
        engine.restore(vec![enc], 0);

        engine.advance(2_000);

        assert!(engine.encounter(&key).is_none());
        assert!(engine.extraction().is_awaiting(&key));
        let stored = store.borrow().get(&key).unwrap().unwrap();
        assert_eq!(stored.outcome(), Some(Outcome::BossSlain));
        assert_eq!(stored.extraction_deadline, Some(2_000 + 300_000));

        // Sweep purges after the window
        let events = engine.advance(310_000);
        assert!(events
            .iter()
            .any(|e| matches!(e, DungeonEvent::ExtractionClosed { .. })));
        assert!(store.borrow().get(&key).unwrap().is_none());
    }

    #[test]
    fn test_shutdown_stops_all_ticks() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let channel = ChannelInfo::new("guild", "channel");
        engine.on_activity(&channel, 0);

        engine.shutdown();

        assert_eq!(engine.pending_tasks(), 0);
        assert!(engine.advance(60_000).is_empty());
        assert!(engine.on_activity(&ChannelInfo::new("guild", "x"), 61_000).is_empty());
        assert!(engine.is_shut_down());
    }

    #[test]
    fn test_join_unknown_channel_fails() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let mut engine = engine(&store);
        let err = engine.join(&ChannelKey("nope".into())).unwrap_err();
        assert!(matches!(err, DungeonError::UnknownEncounter(_)));
    }
}
