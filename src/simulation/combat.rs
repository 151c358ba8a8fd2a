//! Attack ticks for one encounter
//!
//! Shadows, the boss and the mobs each attack on their own task. Every
//! tick runs to completion against the encounter it was given; a returned
//! [`Outcome`] means the encounter must be resolved and nothing else may
//! touch it.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::army::extraction::ExtractionSystem;
use crate::army::resurrection::ResurrectionEconomy;
use crate::combat::behavior::Behavior;
use crate::combat::math::{aoe_target_count, attack_variance, damage, unit_max_hp};
use crate::core::config::DungeonConfig;
use crate::core::types::{Millis, Rank, Stats, UnitId};
use crate::dungeon::encounter::{AttackState, Encounter, Mob, Outcome, ShadowHealth};
use crate::host::{Host, RosterProvider, Severity, Unit, UserSnapshot};
use crate::simulation::events::{Attacker, DungeonEvent};

/// An allocated unit as it fights: roster rank plus effective stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fighter {
    pub id: UnitId,
    pub rank: Rank,
    pub stats: Stats,
}

/// Resolve effective stats for the allocated units
pub fn fighters(units: &[Unit], roster: Option<&dyn RosterProvider>) -> Vec<Fighter> {
    units
        .iter()
        .map(|unit| Fighter {
            id: unit.id,
            rank: unit.rank,
            stats: roster.map_or(unit.stats, |r| r.effective_stats(unit)),
        })
        .collect()
}

/// Everything a tick may touch besides the encounter itself
pub struct CombatContext<'a> {
    pub config: &'a DungeonConfig,
    pub fighters: &'a [Fighter],
    pub user: Option<UserSnapshot>,
    pub host: &'a mut Host,
    pub economy: &'a mut ResurrectionEconomy,
    pub extraction: &'a mut ExtractionSystem,
    pub rng: &'a mut ChaCha8Rng,
    pub events: &'a mut Vec<DungeonEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Mob(usize),
    Boss,
}

/// Give every allocated unit an HP ledger and a behavior on first sight
pub fn ensure_ledgers(
    encounter: &mut Encounter,
    fighters: &[Fighter],
    rng: &mut impl Rng,
    now: Millis,
) {
    for fighter in fighters {
        let max_hp = unit_max_hp(fighter.stats.vitality, fighter.rank);
        encounter
            .shadow_hp
            .entry(fighter.id)
            .or_insert_with(|| ShadowHealth::new(max_hp));
        encounter.shadow_attacks.entry(fighter.id).or_insert_with(|| AttackState {
            behavior: Behavior::random(rng),
            next_attack_at: now,
            attacks: 0,
        });
    }
}

fn pick_target(encounter: &Encounter, mob_bias: f64, rng: &mut impl Rng) -> Option<Target> {
    let mobs = encounter.mobs.active.len();
    match (mobs > 0, encounter.boss.is_alive()) {
        (true, true) => {
            if rng.gen_bool(mob_bias.clamp(0.0, 1.0)) {
                Some(Target::Mob(rng.gen_range(0..mobs)))
            } else {
                Some(Target::Boss)
            }
        }
        (true, false) => Some(Target::Mob(rng.gen_range(0..mobs))),
        (false, true) => Some(Target::Boss),
        (false, false) => None,
    }
}

fn alive_fighters(encounter: &Encounter, fighters: &[Fighter]) -> Vec<Fighter> {
    fighters
        .iter()
        .filter(|f| encounter.shadow_hp.get(&f.id).map_or(false, |h| h.is_alive()))
        .copied()
        .collect()
}

/// One blow from a shadow or the user against a mob or the boss
fn strike(
    encounter: &mut Encounter,
    attacker: Attacker,
    stats: &Stats,
    rank: Rank,
    multiplier: f64,
    ctx: &mut CombatContext<'_>,
) -> Option<Outcome> {
    let target = pick_target(encounter, ctx.config.mob_target_bias, ctx.rng)?;
    let channel = encounter.key();

    match target {
        Target::Mob(index) => {
            let mob = &mut encounter.mobs.active[index];
            let roll = damage(stats, &mob.stats, rank, mob.rank, ctx.rng);
            let hit = mob.apply_damage(roll.amount * attack_variance(ctx.rng) * multiplier);
            encounter.mark_dirty();

            if hit.killed {
                let mob = encounter.mobs.remove(index);
                match attacker {
                    Attacker::Shadow(id) => {
                        encounter.shadow_contributions.entry(id).or_default().mob_kills += 1
                    }
                    Attacker::User => encounter.user_kills += 1,
                }
                ctx.events.push(DungeonEvent::MobKilled {
                    channel,
                    mob: mob.id,
                    by: attacker,
                });
                if encounter.user_participating() {
                    try_extract_mob(encounter, &mob, ctx);
                }
            }
            None
        }
        Target::Boss => {
            let boss = &encounter.boss;
            let roll = damage(stats, &boss.stats, rank, boss.rank, ctx.rng);
            let hit = encounter
                .boss
                .apply_damage(roll.amount * attack_variance(ctx.rng) * multiplier);
            encounter.mark_dirty();

            match attacker {
                Attacker::Shadow(id) => {
                    encounter.shadow_contributions.entry(id).or_default().boss_damage += hit.dealt
                }
                Attacker::User => encounter.user_damage += hit.dealt,
            }
            ctx.events.push(DungeonEvent::BossHit {
                channel,
                by: attacker,
                amount: hit.dealt,
                critical: roll.critical,
                hp_left: encounter.boss.hp,
            });

            hit.killed.then_some(Outcome::BossSlain)
        }
    }
}

fn try_extract_mob(encounter: &Encounter, mob: &Mob, ctx: &mut CombatContext<'_>) {
    let Some(user) = ctx.user else {
        return;
    };
    let Some(roster) = ctx.host.roster.get_mut() else {
        return;
    };
    if let Some(unit) = ctx.extraction.attempt_mob(roster.as_mut(), &user, encounter, mob) {
        tracing::info!("Extracted {} from {}", unit.name, encounter.key());
        ctx.events.push(DungeonEvent::MobExtracted {
            channel: encounter.key(),
            unit: unit.id,
            name: unit.name,
        });
    }
}

/// Damage a shadow; a lethal hit goes through resurrection first
fn hit_shadow(
    encounter: &mut Encounter,
    fighter: &Fighter,
    amount: f64,
    ctx: &mut CombatContext<'_>,
) {
    let channel = encounter.key();
    let Some(health) = encounter.shadow_hp.get_mut(&fighter.id) else {
        return;
    };
    if !health.apply_damage(amount).killed {
        return;
    }

    let attempt = ctx
        .host
        .pool
        .get_mut()
        .map(|pool| ctx.economy.attempt_revive(fighter.rank, pool.as_mut()));

    match attempt {
        Some(a) if a.revived => {
            health.hp = health.max_hp;
            health.revives += 1;
            encounter.revives += 1;
            ctx.events.push(DungeonEvent::ShadowRevived {
                channel,
                unit: fighter.id,
                cost: a.cost,
            });
        }
        attempt => {
            health.dead = true;
            encounter.failed_revives += 1;
            ctx.events.push(DungeonEvent::ShadowDown {
                channel,
                unit: fighter.id,
            });
            if attempt.map_or(false, |a| a.low_mana_warning) {
                let message = format!(
                    "Not enough mana to revive fallen shadows ({} failed in a row)",
                    ctx.economy.consecutive_failures()
                );
                ctx.host.notify(&message, Severity::Warning);
            }
        }
    }
}

/// Fallback damage to the participating user once the army is down
fn strike_user(
    encounter: &mut Encounter,
    stats: &Stats,
    rank: Rank,
    factor: f64,
    ctx: &mut CombatContext<'_>,
) -> Option<Outcome> {
    if !encounter.user_participating() {
        return None;
    }
    let user = ctx.user?;
    let pool = ctx.host.pool.get_mut()?;

    let roll = damage(stats, &user.stats, rank, user.rank, ctx.rng);
    let amount = roll.amount * factor;

    let mut values = pool.pool();
    let hp = if values.hp.is_finite() { values.hp } else { values.max_hp };
    values.hp = (hp - amount).max(0.0);
    pool.set_pool(values);
    pool.notify_changed();

    encounter.user_damage_taken += amount;
    encounter.mark_dirty();
    ctx.events.push(DungeonEvent::UserHit {
        channel: encounter.key(),
        amount,
        hp_left: values.hp,
    });

    (values.hp <= 0.0).then_some(Outcome::Defeated)
}

/// Shadow attack task
///
/// Every standing unit whose cooldown elapsed attacks, catching up on each
/// cooldown that ran out inside this tick's window.
pub fn shadow_tick(
    encounter: &mut Encounter,
    ctx: &mut CombatContext<'_>,
    now: Millis,
) -> Option<Outcome> {
    if encounter.is_terminal() {
        return None;
    }
    let fighters = ctx.fighters;
    ensure_ledgers(encounter, fighters, ctx.rng, now);
    let window_start = now.saturating_sub(ctx.config.shadow_attack_interval_ms);

    for fighter in fighters {
        if !encounter.shadow_hp.get(&fighter.id).map_or(false, |h| h.is_alive()) {
            continue;
        }
        let Some(mut state) = encounter.shadow_attacks.get(&fighter.id).copied() else {
            continue;
        };
        state.next_attack_at = state.next_attack_at.max(window_start);

        let mut outcome = None;
        while state.next_attack_at <= now {
            state.attacks += 1;
            state.next_attack_at += state.behavior.roll_cooldown(ctx.rng);
            outcome = strike(
                encounter,
                Attacker::Shadow(fighter.id),
                &fighter.stats,
                fighter.rank,
                state.behavior.damage_multiplier(),
                ctx,
            );
            if outcome.is_some() {
                break;
            }
        }
        encounter.shadow_attacks.insert(fighter.id, state);

        if outcome.is_some() {
            return outcome;
        }
    }
    None
}

/// Boss attack task, gated by the boss's own cooldown
pub fn boss_tick(
    encounter: &mut Encounter,
    ctx: &mut CombatContext<'_>,
    now: Millis,
) -> Option<Outcome> {
    if encounter.is_terminal()
        || !encounter.boss.is_alive()
        || now < encounter.boss.next_attack_at
    {
        return None;
    }
    let fighters = ctx.fighters;
    ensure_ledgers(encounter, fighters, ctx.rng, now);
    encounter.boss.next_attack_at = now + encounter.boss.attack_cooldown_ms;

    let boss_stats = encounter.boss.stats;
    let boss_rank = encounter.boss.rank;
    let alive = alive_fighters(encounter, fighters);

    if alive.is_empty() {
        let factor = ctx.config.boss_user_damage_factor;
        return strike_user(encounter, &boss_stats, boss_rank, factor, ctx);
    }

    let count = aoe_target_count(boss_rank).min(alive.len());
    let targets: Vec<Fighter> = alive.choose_multiple(ctx.rng, count).copied().collect();
    for target in &targets {
        let roll = damage(&boss_stats, &target.stats, boss_rank, target.rank, ctx.rng);
        hit_shadow(encounter, target, roll.amount, ctx);
    }
    encounter.mark_dirty();
    None
}

/// Mob attack task: every ready mob hits one random standing unit
pub fn mob_tick(
    encounter: &mut Encounter,
    ctx: &mut CombatContext<'_>,
    now: Millis,
) -> Option<Outcome> {
    if encounter.is_terminal() {
        return None;
    }
    let fighters = ctx.fighters;
    ensure_ledgers(encounter, fighters, ctx.rng, now);
    let mut alive = alive_fighters(encounter, fighters);
    let factor = ctx.config.mob_user_damage_factor;

    for index in 0..encounter.mobs.active.len() {
        let mob = &mut encounter.mobs.active[index];
        if mob.next_attack_at > now {
            continue;
        }
        mob.next_attack_at = now + mob.attack_cooldown_ms;
        let (stats, rank) = (mob.stats, mob.rank);

        if alive.is_empty() {
            if let Some(outcome) = strike_user(encounter, &stats, rank, factor, ctx) {
                return Some(outcome);
            }
            continue;
        }

        let pick = ctx.rng.gen_range(0..alive.len());
        let target = alive[pick];
        let roll = damage(&stats, &target.stats, rank, target.rank, ctx.rng);
        hit_shadow(encounter, &target, roll.amount, ctx);
        if encounter.is_shadow_dead(&target.id) {
            alive.swap_remove(pick);
        }
        encounter.mark_dirty();
    }
    None
}

/// The user attacks after activity in the encounter's channel
pub fn user_attack(encounter: &mut Encounter, ctx: &mut CombatContext<'_>) -> Option<Outcome> {
    if encounter.is_terminal() || !encounter.user_participating() {
        return None;
    }
    let user = ctx.user?;
    strike(encounter, Attacker::User, &user.stats, user.rank, 1.0, ctx)
}
