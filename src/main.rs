//! Shadow Dungeons - demo driver
//!
//! Runs the engine against in-memory collaborators and simulated channel
//! chatter, persisting encounters to a directory of JSON files so a second
//! run picks up where the first stopped.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use shadow_dungeons::core::error::Result;
use shadow_dungeons::core::types::{ChannelInfo, Rank, Stats};
use shadow_dungeons::core::DungeonConfig;
use shadow_dungeons::host::memory::{
    FixedChannel, InMemoryRoster, RecordingNotifier, SharedPool, StaticUser,
};
use shadow_dungeons::host::{Host, Severity};
use shadow_dungeons::runtime::{self, DriverOptions, EngineHandle};
use shadow_dungeons::simulation::{DungeonEngine, DungeonEvent};
use shadow_dungeons::store::{spawn_store_worker, JsonFileStore};

fn parse_rank(s: &str) -> std::result::Result<Rank, String> {
    Rank::ALL
        .iter()
        .copied()
        .find(|r| r.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown rank '{}'", s))
}

/// Shadow Dungeons - simulate dungeon encounters fought by a shadow army
#[derive(Parser, Debug)]
#[command(name = "shadow-dungeons")]
#[command(about = "Simulate channel-triggered dungeons fought by a shared shadow army")]
struct Args {
    /// TOML configuration file (defaults are used when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding persisted encounters
    #[arg(long, default_value = "dungeon-data")]
    store: PathBuf,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated channels
    #[arg(long, default_value_t = 3)]
    channels: usize,

    /// Simulated minutes to run
    #[arg(long, default_value_t = 20)]
    minutes: u64,

    /// Virtual milliseconds per wall millisecond
    #[arg(long, default_value_t = 200)]
    speed: u64,

    /// Virtual milliseconds between simulated messages
    #[arg(long, default_value_t = 4_000)]
    activity_ms: u64,

    /// Shadows in the user's army
    #[arg(long, default_value_t = 40)]
    roster: usize,

    /// User rank (E, D, C, ... "Shadow Monarch")
    #[arg(long, default_value = "C", value_parser = parse_rank)]
    rank: Rank,

    /// Join every dungeon as it opens instead of only watching
    #[arg(long)]
    join: bool,
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shadow_dungeons=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DungeonConfig::load(path)?,
        None => DungeonConfig::default(),
    };
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, mut config: DungeonConfig) -> Result<()> {
    let seed = config.pin_seed();
    tracing::info!("Shadow Dungeons starting (seed {})", seed);

    let (store, worker) = spawn_store_worker(JsonFileStore::open(&args.store)?);
    let records = store.all().await?;

    let channels: Vec<ChannelInfo> = (0..args.channels.max(1))
        .map(|i| ChannelInfo::new("demo-guild", format!("channel-{}", i + 1)))
        .collect();

    let stats = Stats::uniform(10.0 + args.rank.index() as f64 * 15.0);
    let roster = InMemoryRoster::generate(args.roster, args.rank, seed);
    let user = StaticUser::new(args.rank, 1 + args.rank.index() as u32 * 10, stats);
    let notifier = RecordingNotifier::new();
    let host = Host::ready(
        Box::new(roster.clone()),
        Box::new(SharedPool::for_user(&stats, args.rank)),
        Box::new(user.clone()),
        Box::new(notifier.clone()),
        Box::new(FixedChannel::new(channels.first().cloned())),
    );

    let now = epoch_ms();
    let mut engine = DungeonEngine::new(config, host, Box::new(store.clone()), now)?;
    let restored = engine.restore(records, now);
    if restored > 0 {
        println!("Restored {} encounter(s) from {}", restored, args.store.display());
    }
    engine.drain_events();

    let (handle, commands) = runtime::channel();
    let chatter = tokio::spawn(simulate_chatter(
        handle.clone(),
        channels,
        args.minutes * 60_000,
        args.activity_ms,
        args.speed,
        seed,
    ));

    let options = DriverOptions {
        tick: Duration::from_millis(50),
        speed: args.speed,
    };
    let join = args.join;
    let (engine, report) = runtime::drive(engine, commands, options, |event| {
        on_event(event, &handle, join)
    })
    .await;

    if let Err(e) = chatter.await {
        tracing::warn!("Chatter task failed: {}", e);
    }

    println!();
    println!("=== SUMMARY ===");
    println!("Events:        {}", report.events);
    println!("Dungeons:      {} opened, {} finished", report.spawned, report.completed);
    println!("Still open:    {}", engine.live_count());
    println!(
        "Revives:       {} ({} failed, {:.0} mana)",
        engine.economy().total_revives,
        engine.economy().total_failures,
        engine.economy().mana_spent
    );
    println!("Extracted:     {} mob(s)", engine.extraction().mob_extractions);
    println!("Army size:     {}", roster.len());
    println!("User XP:       {}", user.xp());
    println!("Warnings:      {}", notifier.count(Severity::Warning));

    drop(engine);
    store.flush().await?;
    drop(store);
    if worker.await.is_err() {
        tracing::warn!("Store worker ended abnormally");
    }
    Ok(())
}

fn on_event(event: &DungeonEvent, handle: &EngineHandle, join: bool) {
    match event {
        DungeonEvent::Spawned {
            channel,
            name,
            rank,
            boss,
            target_mobs,
        } => {
            println!(
                "[{}] {}-rank {} opened, boss {} with {} mobs",
                channel, rank, name, boss, target_mobs
            );
            if join {
                if let Err(e) = handle.join(channel.clone()) {
                    tracing::warn!("Could not join {}: {}", channel, e);
                }
            }
        }
        DungeonEvent::Completed {
            channel,
            outcome,
            xp,
            awaiting_extraction,
        } => {
            let xp_total = xp.as_ref().map_or(0, |r| r.user_xp + r.total_unit_xp());
            println!("[{}] finished: {:?} ({} XP)", channel, outcome, xp_total);
            if *awaiting_extraction {
                let handle = handle.clone();
                let channel = channel.clone();
                tokio::spawn(async move {
                    match handle.extract_boss(channel.clone()).await {
                        Ok(attempt) if attempt.outcome.success => {
                            println!("[{}] boss extracted", channel)
                        }
                        Ok(_) => println!("[{}] boss extraction failed", channel),
                        Err(e) => tracing::warn!("Extraction in {} failed: {}", channel, e),
                    }
                });
            }
        }
        DungeonEvent::MobExtracted { channel, name, .. } => {
            println!("[{}] {} joins the army", channel, name);
        }
        DungeonEvent::ExtractionClosed { channel } => {
            tracing::info!("Extraction window closed in {}", channel);
        }
        other => tracing::debug!("{:?}", other),
    }
}

/// Post messages into random channels for `duration` virtual milliseconds
async fn simulate_chatter(
    handle: EngineHandle,
    channels: Vec<ChannelInfo>,
    duration: u64,
    activity_ms: u64,
    speed: u64,
    seed: u64,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(17));
    let pause = Duration::from_millis((activity_ms / speed.max(1)).max(1));
    let messages = duration / activity_ms.max(1);

    for _ in 0..messages {
        tokio::time::sleep(pause).await;
        let channel = channels[rng.gen_range(0..channels.len())].clone();
        if handle.activity(channel).is_err() {
            return;
        }
    }

    let _ = handle.shutdown();
}
