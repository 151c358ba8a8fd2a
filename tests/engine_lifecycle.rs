//! Engine lifecycle integration tests
//!
//! Drive a full engine through spawning, combat resolution, extraction and
//! restarts, using the in-memory host collaborators and stores.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use shadow_dungeons::core::error::DungeonError;
use shadow_dungeons::core::types::{ChannelInfo, ChannelKey, Rank, Stats};
use shadow_dungeons::core::DungeonConfig;
use shadow_dungeons::dungeon::encounter::{Contribution, Encounter, Outcome, Participation};
use shadow_dungeons::host::memory::{
    FixedChannel, InMemoryRoster, RecordingNotifier, SharedPool, StaticUser,
};
use shadow_dungeons::host::{
    Availability, ChannelContextProvider, Collaborator, Host, NotificationSink,
    ResourcePoolProvider, RosterProvider, UserProfileProvider,
};
use shadow_dungeons::simulation::{DungeonEngine, DungeonEvent, TaskKind};
use shadow_dungeons::store::{EncounterStore, MemoryStore, PersistenceSink};

struct Handles {
    roster: InMemoryRoster,
    user: StaticUser,
    notifier: RecordingNotifier,
}

fn host(roster_size: usize) -> (Host, Handles) {
    let stats = Stats::uniform(40.0);
    let roster = InMemoryRoster::generate(roster_size, Rank::D, 11);
    let user = StaticUser::new(Rank::C, 20, stats);
    let notifier = RecordingNotifier::new();
    let host = Host::ready(
        Box::new(roster.clone()),
        Box::new(SharedPool::for_user(&stats, Rank::C)),
        Box::new(user.clone()),
        Box::new(notifier.clone()),
        Box::new(FixedChannel::new(None)),
    );
    (host, Handles { roster, user, notifier })
}

fn config() -> DungeonConfig {
    DungeonConfig {
        spawn_chance: 1.0,
        rng_seed: Some(99),
        ..DungeonConfig::default()
    }
}

fn shared_store() -> Rc<RefCell<MemoryStore>> {
    Rc::new(RefCell::new(MemoryStore::new()))
}

/// A live record spawned by an engine whose army is empty, so nothing fights
fn spawned_record(channel: &ChannelInfo) -> Encounter {
    let store = shared_store();
    let (host, _) = host(0);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 0).unwrap();
    engine.on_activity(channel, 0);
    let record = store.borrow().get(&channel.key()).unwrap().unwrap();
    record
}

/// A record whose boss falls to the first shadow blow
fn doomed_record(channel: &ChannelInfo, participation: Participation) -> Encounter {
    let mut record = spawned_record(channel);
    record.rank = Rank::E;
    record.boss.hp = 1.0;
    record.boss.max_hp = 1.0;
    record.boss.stats = Stats::uniform(1.0);
    record.mobs.active.clear();
    record.mobs.target_count = record.mobs.total;
    record.mobs.remaining = 0;
    record.participation = participation;
    record
}

/// Sink that counts writes before passing them to a shared store
#[derive(Clone)]
struct CountingSink {
    store: Rc<RefCell<MemoryStore>>,
    saves: Rc<Cell<usize>>,
    deletes: Rc<Cell<usize>>,
}

impl CountingSink {
    fn new(store: Rc<RefCell<MemoryStore>>) -> Self {
        Self {
            store,
            saves: Rc::new(Cell::new(0)),
            deletes: Rc::new(Cell::new(0)),
        }
    }
}

impl PersistenceSink for CountingSink {
    fn save(&mut self, encounter: &Encounter) {
        self.saves.set(self.saves.get() + 1);
        PersistenceSink::save(&mut self.store, encounter);
    }

    fn delete(&mut self, key: &ChannelKey) {
        self.deletes.set(self.deletes.get() + 1);
        PersistenceSink::delete(&mut self.store, key);
    }
}

fn completions(events: &[DungeonEvent]) -> Vec<&DungeonEvent> {
    events
        .iter()
        .filter(|e| matches!(e, DungeonEvent::Completed { .. }))
        .collect()
}

#[test]
fn test_many_activities_keep_one_encounter_per_channel() {
    let store = shared_store();
    let (host, _) = host(0);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 0).unwrap();
    let lobby = ChannelInfo::new("guild", "lobby");
    let arena = ChannelInfo::new("guild", "arena");

    for t in 0..50u64 {
        engine.on_activity(&lobby, t * 500);
        engine.on_activity(&arena, t * 500 + 250);
    }

    assert_eq!(engine.live_count(), 2);
    assert_eq!(store.borrow().all().unwrap().len(), 2);
    let keys: Vec<_> = engine.encounters().map(|e| e.key()).collect();
    assert!(keys.contains(&lobby.key()));
    assert!(keys.contains(&arena.key()));
}

#[test]
fn test_restart_restores_live_encounter_and_cooldown() {
    let channel = ChannelInfo::new("guild", "lobby");
    let store = shared_store();

    let (host_a, _) = host(0);
    let mut first = DungeonEngine::new(config(), host_a, Box::new(store.clone()), 0).unwrap();
    first.on_activity(&channel, 0);
    let id = first.encounter(&channel.key()).unwrap().id;
    first.advance(30_000);
    first.shutdown();

    let records = store.borrow().all().unwrap();
    assert_eq!(records.len(), 1);

    let (host_b, _) = host(0);
    let mut second = DungeonEngine::new(config(), host_b, Box::new(store.clone()), 40_000).unwrap();
    assert_eq!(second.restore(records, 40_000), 1);

    let restored = second.encounter(&channel.key()).unwrap();
    assert_eq!(restored.id, id);
    assert!(second.has_task(&channel.key(), TaskKind::ShadowAttack));
    assert!(second.has_task(&channel.key(), TaskKind::Expiry));
    assert!(matches!(
        second.drain_events().first(),
        Some(DungeonEvent::Restored { .. })
    ));

    // The channel is still cooling down from the original spawn
    assert!(second.resolve(&channel.key(), Outcome::TimedOut));
    assert!(second.try_spawn(&channel, 50_000).is_none());
    assert!(store.borrow().get(&channel.key()).unwrap().is_none());
}

#[test]
fn test_restored_encounter_past_expiry_times_out() {
    let channel = ChannelInfo::new("guild", "lobby");
    let record = spawned_record(&channel);
    let expires_at = record.expires_at;

    let store = shared_store();
    let (host, _) = host(0);
    let restart = expires_at + 60_000;
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), restart).unwrap();
    engine.restore(vec![record], expires_at + 60_000);

    let events = engine.advance(expires_at + 60_001);

    let done = completions(&events);
    assert_eq!(done.len(), 1);
    assert!(matches!(
        done[0],
        DungeonEvent::Completed {
            outcome: Outcome::TimedOut,
            ..
        }
    ));
    assert_eq!(engine.live_count(), 0);
}

#[test]
fn test_boss_kill_pays_xp_and_runs_extraction_window() {
    let channel = ChannelInfo::new("guild", "lobby");
    let store = shared_store();
    let (host, handles) = host(20);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 0).unwrap();
    engine.restore(vec![doomed_record(&channel, Participation::Participating)], 0);

    let events = engine.advance(5_000);

    let done = completions(&events);
    assert_eq!(done.len(), 1);
    match done[0] {
        DungeonEvent::Completed {
            outcome,
            xp,
            awaiting_extraction,
            ..
        } => {
            assert_eq!(*outcome, Outcome::BossSlain);
            assert!(*awaiting_extraction);
            assert!(xp.as_ref().map_or(false, |r| r.user_xp > 0));
        }
        _ => unreachable!(),
    }
    assert!(handles.user.xp() > 0);
    assert!(!handles.roster.xp_log().is_empty());

    let stored = store.borrow().get(&channel.key()).unwrap().unwrap();
    assert_eq!(stored.outcome(), Some(Outcome::BossSlain));
    assert!(stored.extraction_deadline.is_some());

    // The roster grants three attempts per boss
    let mut closed = false;
    for attempt in 0..3u64 {
        let result = engine
            .attempt_boss_extraction(&channel.key(), 10_000 + attempt)
            .unwrap();
        if result.window_closed {
            closed = true;
            break;
        }
    }
    assert!(closed);
    assert!(!engine.extraction().is_awaiting(&channel.key()));
    assert!(store.borrow().get(&channel.key()).unwrap().is_none());
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| matches!(e, DungeonEvent::ExtractionClosed { .. })));

    let err = engine
        .attempt_boss_extraction(&channel.key(), 20_000)
        .unwrap_err();
    assert!(matches!(err, DungeonError::UnknownEncounter(_)));
    assert!(handles.notifier.messages().len() >= 2);
}

#[test]
fn test_watched_boss_kill_has_no_extraction_window() {
    let channel = ChannelInfo::new("guild", "lobby");
    let store = shared_store();
    let (host, _) = host(20);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 0).unwrap();
    engine.restore(vec![doomed_record(&channel, Participation::Watching)], 0);

    let events = engine.advance(5_000);

    assert!(matches!(
        completions(&events)[..],
        [DungeonEvent::Completed {
            outcome: Outcome::BossSlain,
            awaiting_extraction: false,
            ..
        }]
    ));
    assert!(engine.extraction().is_empty());
    assert!(store.borrow().get(&channel.key()).unwrap().is_none());
}

#[test]
fn test_extraction_window_survives_restart_then_expires() {
    let channel = ChannelInfo::new("guild", "lobby");
    let store = shared_store();

    let (host_a, _) = host(20);
    let mut first = DungeonEngine::new(config(), host_a, Box::new(store.clone()), 0).unwrap();
    first.restore(vec![doomed_record(&channel, Participation::Participating)], 0);
    first.advance(5_000);
    first.shutdown();

    let deadline = store
        .borrow()
        .get(&channel.key())
        .unwrap()
        .and_then(|r| r.extraction_deadline)
        .unwrap();

    let (host_b, _) = host(20);
    let mut second = DungeonEngine::new(config(), host_b, Box::new(store.clone()), 60_000).unwrap();
    let records = store.borrow().all().unwrap();
    assert_eq!(second.restore(records, 60_000), 1);
    assert_eq!(second.live_count(), 0);
    assert_eq!(
        second.extraction().get(&channel.key()).map(|r| r.expires_at),
        Some(deadline)
    );

    let events = second.advance(deadline + 10_000);
    assert!(events
        .iter()
        .any(|e| matches!(e, DungeonEvent::ExtractionClosed { .. })));
    assert!(store.borrow().get(&channel.key()).unwrap().is_none());
}

#[test]
fn test_expired_windows_are_purged_on_restore() {
    let channel = ChannelInfo::new("guild", "lobby");
    let mut record = doomed_record(&channel, Participation::Participating);
    record.finish(Outcome::BossSlain);
    record.extraction_deadline = Some(1_000);

    let store = shared_store();
    store.borrow_mut().put(&record).unwrap();
    let (host, _) = host(0);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 5_000).unwrap();

    assert_eq!(engine.restore(vec![record], 5_000), 0);
    assert!(engine.extraction().is_empty());
    assert!(store.borrow().all().unwrap().is_empty());
}

#[test]
fn test_pending_roster_resolves_on_retry() {
    let calls = Rc::new(Cell::new(0u32));
    let counter = calls.clone();
    let stats = Stats::uniform(40.0);

    let host = Host {
        roster: Collaborator::resolving("roster", move || {
            counter.set(counter.get() + 1);
            (counter.get() >= 3).then(|| {
                Box::new(InMemoryRoster::generate(5, Rank::C, 1)) as Box<dyn RosterProvider>
            })
        }),
        pool: Collaborator::ready(
            "resource pool",
            Box::new(SharedPool::for_user(&stats, Rank::C)) as Box<dyn ResourcePoolProvider>,
        ),
        user: Collaborator::ready(
            "user profile",
            Box::new(StaticUser::new(Rank::C, 20, stats)) as Box<dyn UserProfileProvider>,
        ),
        notifier: Collaborator::ready(
            "notifications",
            Box::new(RecordingNotifier::new()) as Box<dyn NotificationSink>,
        ),
        channel: Collaborator::ready(
            "channel context",
            Box::new(FixedChannel::new(None)) as Box<dyn ChannelContextProvider>,
        ),
    };

    let mut engine = DungeonEngine::new(config(), host, Box::new(shared_store()), 0).unwrap();
    assert_eq!(engine.pending_tasks(), 4);

    engine.advance(10_000);

    assert_eq!(calls.get(), 3);
    assert_eq!(engine.host().roster.state(), Availability::Ready);
    assert_eq!(engine.host().roster_units().len(), 5);
    assert_eq!(engine.pending_tasks(), 3);
}

#[test]
fn test_user_attacks_only_from_current_channel_when_joined() {
    let channel = ChannelInfo::new("guild", "lobby");
    let stats = Stats::uniform(40.0);
    let focus = FixedChannel::new(None);
    let host = Host::ready(
        Box::new(InMemoryRoster::generate(0, Rank::C, 1)),
        Box::new(SharedPool::for_user(&stats, Rank::C)),
        Box::new(StaticUser::new(Rank::C, 20, stats)),
        Box::new(RecordingNotifier::new()),
        Box::new(focus.clone()),
    );
    let mut engine = DungeonEngine::new(config(), host, Box::new(shared_store()), 0).unwrap();
    let mut record = spawned_record(&channel);
    record.mobs.active.clear();
    record.mobs.remaining = 0;
    engine.restore(vec![record], 0);
    engine.join(&channel.key()).unwrap();

    // Not looking at the channel: no blow lands
    engine.on_activity(&channel, 100);
    assert_eq!(engine.encounter(&channel.key()).unwrap().user_damage, 0.0);

    focus.set(Some(channel.clone()));
    let events = engine.on_activity(&channel, 200);

    assert!(events
        .iter()
        .any(|e| matches!(e, DungeonEvent::BossHit { .. } | DungeonEvent::Completed { .. })));
}

#[test]
fn test_second_boss_kill_resolve_grants_nothing() {
    let channel = ChannelInfo::new("guild", "lobby");
    let (host, handles) = host(20);
    let sink = CountingSink::new(shared_store());
    let mut engine = DungeonEngine::new(config(), host, Box::new(sink.clone()), 0).unwrap();

    let mut record = spawned_record(&channel);
    record.participation = Participation::Participating;
    for unit in handles.roster.all_units().iter().take(3) {
        record.shadow_contributions.insert(
            unit.id,
            Contribution {
                mob_kills: 5,
                boss_damage: record.boss.max_hp / 3.0,
            },
        );
    }
    let key = channel.key();
    engine.restore(vec![record], 0);
    engine.drain_events();

    assert!(engine.resolve(&key, Outcome::BossSlain));
    let user_xp = handles.user.xp();
    let units: Vec<_> = handles
        .roster
        .all_units()
        .into_iter()
        .map(|u| (u.id, u.level, u.xp))
        .collect();
    let grants = handles.roster.xp_log().len();
    assert!(user_xp > 0);
    assert_eq!(grants, 3);
    assert_eq!((sink.saves.get(), sink.deletes.get()), (1, 0));

    assert!(!engine.resolve(&key, Outcome::BossSlain));

    assert_eq!(handles.user.xp(), user_xp);
    assert_eq!(handles.roster.xp_log().len(), grants);
    let after: Vec<_> = handles
        .roster
        .all_units()
        .into_iter()
        .map(|u| (u.id, u.level, u.xp))
        .collect();
    assert_eq!(after, units);
    assert_eq!((sink.saves.get(), sink.deletes.get()), (1, 0));
    assert_eq!(completions(&engine.drain_events()).len(), 1);
    assert!(engine.extraction().is_awaiting(&key));
}

#[test]
fn test_boss_worn_down_by_many_blows_completes_once() {
    let channel = ChannelInfo::new("guild", "lobby");
    let store = shared_store();
    let (host, _) = host(20);
    let mut engine = DungeonEngine::new(config(), host, Box::new(store.clone()), 0).unwrap();

    let mut record = doomed_record(&channel, Participation::Watching);
    record.boss.hp = 5_000.0;
    record.boss.max_hp = 5_000.0;
    let key = channel.key();
    engine.restore(vec![record], 0);

    let events = engine.advance(120_000);

    let hits: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            DungeonEvent::BossHit { hp_left, .. } => Some(*hp_left),
            _ => None,
        })
        .collect();
    assert!(hits.len() >= 2);
    assert!(hits.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(hits.last().copied(), Some(0.0));

    let done = completions(&events);
    assert_eq!(done.len(), 1);
    assert!(matches!(
        done[0],
        DungeonEvent::Completed {
            outcome: Outcome::BossSlain,
            ..
        }
    ));
    let last_hit = events
        .iter()
        .rposition(|e| matches!(e, DungeonEvent::BossHit { .. }));
    let completed_at = events
        .iter()
        .position(|e| matches!(e, DungeonEvent::Completed { .. }));
    assert!(last_hit < completed_at);

    assert!(!engine.resolve(&key, Outcome::BossSlain));
    assert!(completions(&engine.advance(240_000)).is_empty());
}

#[test]
fn test_pinned_seed_reproduces_spawns() {
    let mut config = DungeonConfig {
        spawn_chance: 1.0,
        ..DungeonConfig::default()
    };
    config.pin_seed();
    let channel = ChannelInfo::new("guild", "lobby");

    let spawn = |config: DungeonConfig| {
        let (host, _) = host(0);
        let mut engine = DungeonEngine::new(config, host, Box::new(shared_store()), 0).unwrap();
        engine.on_activity(&channel, 0);
        let encounter = engine.encounter(&channel.key()).unwrap();
        (encounter.rank, encounter.boss.name.clone(), encounter.mobs.target_count)
    };

    assert_eq!(spawn(config.clone()), spawn(config));
}
