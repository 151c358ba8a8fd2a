//! Tokio driver for the dungeon engine
//!
//! The engine is single-threaded and owns all of its state, so the driver
//! runs it on one task and feeds it through a command channel. Virtual time
//! is wall time since start, optionally sped up.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::army::extraction::BossExtraction;
use crate::core::error::{DungeonError, Result};
use crate::core::types::{ChannelInfo, ChannelKey, Millis};
use crate::simulation::engine::DungeonEngine;
use crate::simulation::events::DungeonEvent;

#[derive(Debug)]
pub enum Command {
    /// A message was posted in a channel
    Activity(ChannelInfo),
    Join(ChannelKey),
    Watch(ChannelKey),
    ExtractBoss {
        channel: ChannelKey,
        reply: oneshot::Sender<Result<BossExtraction>>,
    },
    Shutdown,
}

/// Sending side of the driver
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| DungeonError::Unavailable("dungeon engine"))
    }

    pub fn activity(&self, channel: ChannelInfo) -> Result<()> {
        self.send(Command::Activity(channel))
    }

    pub fn join(&self, channel: ChannelKey) -> Result<()> {
        self.send(Command::Join(channel))
    }

    pub fn watch(&self, channel: ChannelKey) -> Result<()> {
        self.send(Command::Watch(channel))
    }

    pub async fn extract_boss(&self, channel: ChannelKey) -> Result<BossExtraction> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ExtractBoss { channel, reply })?;
        rx.await
            .map_err(|_| DungeonError::Unavailable("dungeon engine"))?
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// How often due tasks are fired
    pub tick: Duration,
    /// Virtual milliseconds per wall millisecond
    pub speed: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            speed: 1,
        }
    }
}

/// Counters gathered while driving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub events: u64,
    pub spawned: u64,
    pub completed: u64,
    pub final_time: Millis,
}

impl DriverReport {
    fn record(&mut self, event: &DungeonEvent) {
        self.events += 1;
        match event {
            DungeonEvent::Spawned { .. } => self.spawned += 1,
            DungeonEvent::Completed { .. } => self.completed += 1,
            _ => {}
        }
    }
}

pub fn channel() -> (EngineHandle, mpsc::UnboundedReceiver<Command>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EngineHandle { tx }, rx)
}

/// Drive `engine` until a shutdown command arrives or every handle is dropped
///
/// Every produced event is passed to `on_event`. The engine is shut down and
/// handed back when the loop ends.
pub async fn drive(
    mut engine: DungeonEngine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    options: DriverOptions,
    mut on_event: impl FnMut(&DungeonEvent),
) -> (DungeonEngine, DriverReport) {
    let started = Instant::now();
    let base = engine.now();
    let speed = options.speed.max(1);
    let clock = move || base + started.elapsed().as_millis() as u64 * speed;

    let mut ticker = interval(options.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut report = DriverReport::default();

    tracing::info!("Dungeon driver started at t={}ms ({}x)", base, speed);

    loop {
        let events = tokio::select! {
            _ = ticker.tick() => engine.advance(clock()),
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::info!("All engine handles dropped");
                    break;
                };
                match command {
                    Command::Activity(channel) => engine.on_activity(&channel, clock()),
                    Command::Join(key) => {
                        if let Err(e) = engine.join(&key) {
                            tracing::warn!("Join failed: {}", e);
                        }
                        Vec::new()
                    }
                    Command::Watch(key) => {
                        if let Err(e) = engine.watch(&key) {
                            tracing::warn!("Watch failed: {}", e);
                        }
                        Vec::new()
                    }
                    Command::ExtractBoss { channel, reply } => {
                        let result = engine.attempt_boss_extraction(&channel, clock());
                        let _ = reply.send(result);
                        engine.drain_events()
                    }
                    Command::Shutdown => break,
                }
            }
        };

        for event in &events {
            report.record(event);
            on_event(event);
        }
    }

    engine.shutdown();
    report.final_time = clock();
    tracing::info!(
        "Dungeon driver stopped: {} events, {} spawned, {} completed",
        report.events,
        report.spawned,
        report.completed
    );
    (engine, report)
}
