//! In-process stand-ins for the host collaborators
//!
//! Used by the demo binary and by tests. Each stand-in is a cheap handle
//! over shared state so a caller can keep a clone and inspect what the
//! engine did through its own copy.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::rc::Rc;

use crate::combat::math::{user_max_hp, user_max_mana};
use crate::core::types::{ChannelInfo, Rank, Stats, UnitId};
use crate::host::{
    ChannelContextProvider, ExtractionOutcome, ExtractionRequest, NotificationSink, ResourcePool,
    ResourcePoolProvider, RosterProvider, Severity, Unit, UserProfileProvider,
};

/// XP needed to go from `level` to `level + 1`
pub fn xp_for_level(level: u32) -> u64 {
    100 * level.max(1) as u64
}

/// Levels per rank step
pub const LEVELS_PER_RANK: u32 = 10;

/// Extraction attempts granted per defeated target id
pub const EXTRACTION_ATTEMPTS: u32 = 3;

#[derive(Debug)]
struct RosterState {
    units: Vec<Unit>,
    attempts: AHashMap<String, u32>,
    rng: ChaCha8Rng,
    xp_log: Vec<(u64, String, Vec<UnitId>)>,
}

/// Army roster kept in memory
#[derive(Debug, Clone)]
pub struct InMemoryRoster {
    state: Rc<RefCell<RosterState>>,
}

impl InMemoryRoster {
    pub fn new(units: Vec<Unit>, seed: u64) -> Self {
        Self {
            state: Rc::new(RefCell::new(RosterState {
                units,
                attempts: AHashMap::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
                xp_log: Vec::new(),
            })),
        }
    }

    /// Roster of `count` units spread around `rank`
    pub fn generate(count: usize, rank: Rank, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let units = (0..count)
            .map(|i| {
                let unit_rank = rank.offset(rng.gen_range(-2..=2));
                let base = 10.0 + unit_rank.index() as f64 * 12.0;
                Unit {
                    id: UnitId::new(),
                    name: format!("Shadow #{}", i + 1),
                    rank: unit_rank,
                    level: rng.gen_range(1..=LEVELS_PER_RANK),
                    xp: 0,
                    stats: Stats {
                        strength: base * rng.gen_range(0.8..1.2),
                        agility: base * rng.gen_range(0.8..1.2),
                        intelligence: base * rng.gen_range(0.8..1.2),
                        vitality: base * rng.gen_range(0.8..1.2),
                        perception: base * rng.gen_range(0.8..1.2),
                    },
                }
            })
            .collect();
        Self::new(units, seed.wrapping_add(1))
    }

    pub fn unit(&self, id: &UnitId) -> Option<Unit> {
        self.state.borrow().units.iter().find(|u| &u.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `grant_xp` call received, in order
    pub fn xp_log(&self) -> Vec<(u64, String, Vec<UnitId>)> {
        self.state.borrow().xp_log.clone()
    }

    fn extraction_chance(request: &ExtractionRequest<'_>) -> f64 {
        let rank_edge = request.user_rank.diff(request.target_rank) as f64 * 0.1;
        let level_edge = request.user_level as f64 * 0.002;
        let focus = request.user_stats.intelligence / 1_000.0;
        (0.1 + rank_edge + level_edge + focus).clamp(0.01, 0.9)
    }
}

impl RosterProvider for InMemoryRoster {
    fn all_units(&self) -> Vec<Unit> {
        self.state.borrow().units.clone()
    }

    fn attempt_extraction(&mut self, request: &ExtractionRequest<'_>) -> ExtractionOutcome {
        let mut state = self.state.borrow_mut();
        let used = *state.attempts.get(&request.target_id).unwrap_or(&0);
        if used >= EXTRACTION_ATTEMPTS {
            return ExtractionOutcome {
                success: false,
                unit: None,
                attempts_remaining: Some(0),
                error: Some("no extraction attempts left".into()),
            };
        }
        state.attempts.insert(request.target_id.clone(), used + 1);
        let remaining = EXTRACTION_ATTEMPTS - used - 1;

        let chance = Self::extraction_chance(request);
        if !state.rng.gen_bool(chance) {
            return ExtractionOutcome {
                success: false,
                unit: None,
                attempts_remaining: Some(remaining),
                error: None,
            };
        }

        let unit = Unit {
            id: UnitId::new(),
            name: format!("Shadow {}", request.target_name),
            rank: request.target_rank,
            level: 1,
            xp: 0,
            stats: request.target_stats,
        };
        state.units.push(unit.clone());

        ExtractionOutcome {
            success: true,
            unit: Some(unit),
            attempts_remaining: Some(0),
            error: None,
        }
    }

    fn grant_xp(&mut self, amount: u64, reason: &str, unit_ids: &[UnitId]) {
        let mut state = self.state.borrow_mut();
        state
            .xp_log
            .push((amount, reason.to_string(), unit_ids.to_vec()));

        for unit in state.units.iter_mut().filter(|u| unit_ids.contains(&u.id)) {
            unit.xp += amount;
            while unit.xp >= xp_for_level(unit.level) {
                unit.xp -= xp_for_level(unit.level);
                unit.level += 1;
                if unit.level % LEVELS_PER_RANK == 0 {
                    unit.rank = unit.rank.offset(1);
                }
            }
        }
    }

    fn effective_stats(&self, unit: &Unit) -> Stats {
        let scale = 1.0 + unit.level as f64 * 0.02;
        Stats {
            strength: unit.stats.strength * scale,
            agility: unit.stats.agility * scale,
            intelligence: unit.stats.intelligence * scale,
            vitality: unit.stats.vitality * scale,
            perception: unit.stats.perception * scale,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    pool: ResourcePool,
    changes: u32,
}

/// Resource pool kept in memory
#[derive(Debug, Clone)]
pub struct SharedPool {
    state: Rc<RefCell<PoolState>>,
}

impl SharedPool {
    pub fn new(pool: ResourcePool) -> Self {
        Self {
            state: Rc::new(RefCell::new(PoolState { pool, changes: 0 })),
        }
    }

    /// Full pool for a user with these stats
    pub fn for_user(stats: &Stats, rank: Rank) -> Self {
        let max_hp = user_max_hp(stats, rank);
        let max_mana = user_max_mana(stats, rank);
        Self::new(ResourcePool {
            hp: max_hp,
            max_hp,
            mana: max_mana,
            max_mana,
        })
    }

    pub fn get(&self) -> ResourcePool {
        self.state.borrow().pool
    }

    pub fn set(&self, pool: ResourcePool) {
        self.state.borrow_mut().pool = pool;
    }

    /// How many times the engine told the host the pool changed
    pub fn changes(&self) -> u32 {
        self.state.borrow().changes
    }
}

impl ResourcePoolProvider for SharedPool {
    fn pool(&self) -> ResourcePool {
        self.get()
    }

    fn set_pool(&mut self, pool: ResourcePool) {
        self.set(pool);
    }

    fn notify_changed(&mut self) {
        self.state.borrow_mut().changes += 1;
    }
}

#[derive(Debug)]
struct UserState {
    rank: Rank,
    level: u32,
    stats: Stats,
    xp: u64,
}

/// User profile with fixed rank and stats; XP accumulates
#[derive(Debug, Clone)]
pub struct StaticUser {
    state: Rc<RefCell<UserState>>,
}

impl StaticUser {
    pub fn new(rank: Rank, level: u32, stats: Stats) -> Self {
        Self {
            state: Rc::new(RefCell::new(UserState {
                rank,
                level,
                stats,
                xp: 0,
            })),
        }
    }

    pub fn xp(&self) -> u64 {
        self.state.borrow().xp
    }
}

impl UserProfileProvider for StaticUser {
    fn rank(&self) -> Rank {
        self.state.borrow().rank
    }

    fn level(&self) -> u32 {
        self.state.borrow().level
    }

    fn stats(&self) -> Stats {
        self.state.borrow().stats
    }

    fn grant_xp(&mut self, amount: u64, reason: &str) {
        tracing::debug!("User gains {} XP ({})", amount, reason);
        self.state.borrow_mut().xp += amount;
    }
}

/// Notification sink that logs and remembers every message
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Rc<RefCell<Vec<(String, Severity)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.borrow().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|(_, s)| *s == severity)
            .count()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Warning | Severity::Error => tracing::warn!("{}", message),
            _ => tracing::info!("{}", message),
        }
        self.messages.borrow_mut().push((message.to_string(), severity));
    }
}

/// Channel the user is looking at, settable from outside
#[derive(Debug, Clone, Default)]
pub struct FixedChannel {
    current: Rc<RefCell<Option<ChannelInfo>>>,
}

impl FixedChannel {
    pub fn new(current: Option<ChannelInfo>) -> Self {
        Self {
            current: Rc::new(RefCell::new(current)),
        }
    }

    pub fn set(&self, channel: Option<ChannelInfo>) {
        *self.current.borrow_mut() = channel;
    }
}

impl ChannelContextProvider for FixedChannel {
    fn current_channel(&self) -> Option<ChannelInfo> {
        self.current.borrow().clone()
    }
}
