//! Fire-and-forget write path from the engine to a store
//!
//! The engine never waits on persistence. Failures are logged and the
//! in-memory state carries on; nothing is retried or rolled back.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::error::{DungeonError, Result};
use crate::core::types::{ChannelKey, Rank};
use crate::dungeon::encounter::Encounter;
use crate::store::EncounterStore;

pub trait PersistenceSink {
    fn save(&mut self, encounter: &Encounter);
    fn delete(&mut self, key: &ChannelKey);
}

/// Sink that drops every write
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn save(&mut self, _encounter: &Encounter) {}
    fn delete(&mut self, _key: &ChannelKey) {}
}

/// Synchronous sink over a shared store
impl<S: EncounterStore> PersistenceSink for Rc<RefCell<S>> {
    fn save(&mut self, encounter: &Encounter) {
        if let Err(e) = self.borrow_mut().put(encounter) {
            tracing::warn!("Failed to persist encounter {}: {}", encounter.key(), e);
        }
    }

    fn delete(&mut self, key: &ChannelKey) {
        if let Err(e) = self.borrow_mut().delete(key) {
            tracing::warn!("Failed to delete encounter {}: {}", key, e);
        }
    }
}

enum StoreCommand {
    Save(Box<Encounter>),
    Delete(ChannelKey),
    Get(ChannelKey, oneshot::Sender<Result<Option<Encounter>>>),
    All(oneshot::Sender<Result<Vec<Encounter>>>),
    Active(oneshot::Sender<Result<Vec<Encounter>>>),
    ByRank(Rank, oneshot::Sender<Result<Vec<Encounter>>>),
    Flush(oneshot::Sender<()>),
}

/// Async handle to a store owned by a background task
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreCommand::Save(e) => write!(f, "Save({})", e.key()),
            StoreCommand::Delete(k) => write!(f, "Delete({})", k),
            StoreCommand::Get(k, _) => write!(f, "Get({})", k),
            StoreCommand::All(_) => f.write_str("All"),
            StoreCommand::Active(_) => f.write_str("Active"),
            StoreCommand::ByRank(r, _) => write!(f, "ByRank({})", r),
            StoreCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

fn worker_gone() -> DungeonError {
    DungeonError::Store("store worker stopped".into())
}

impl StoreHandle {
    fn send(&self, command: StoreCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Store worker stopped, dropping write");
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> StoreCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }

    pub async fn get(&self, key: ChannelKey) -> Result<Option<Encounter>> {
        self.request(|reply| StoreCommand::Get(key, reply)).await
    }

    /// Every record, finished ones included
    pub async fn all(&self) -> Result<Vec<Encounter>> {
        self.request(StoreCommand::All).await
    }

    pub async fn active(&self) -> Result<Vec<Encounter>> {
        self.request(StoreCommand::Active).await
    }

    pub async fn by_rank(&self, rank: Rank) -> Result<Vec<Encounter>> {
        self.request(|reply| StoreCommand::ByRank(rank, reply)).await
    }

    /// Wait until every write sent so far has been applied
    pub async fn flush(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Flush(reply))
            .map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())
    }
}

impl PersistenceSink for StoreHandle {
    fn save(&mut self, encounter: &Encounter) {
        self.send(StoreCommand::Save(Box::new(encounter.clone())));
    }

    fn delete(&mut self, key: &ChannelKey) {
        self.send(StoreCommand::Delete(key.clone()));
    }
}

/// Move `store` onto a blocking-pool thread and return a handle to it
///
/// File I/O never runs on the runtime thread driving the engine. The
/// worker ends, handing the store back, once every handle is dropped.
pub fn spawn_store_worker<S>(mut store: S) -> (StoreHandle, JoinHandle<S>)
where
    S: EncounterStore + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();

    let worker = tokio::task::spawn_blocking(move || {
        while let Some(command) = rx.blocking_recv() {
            tracing::trace!("store: {:?}", command);
            match command {
                StoreCommand::Save(encounter) => {
                    if let Err(e) = store.put(&encounter) {
                        tracing::warn!("Failed to persist encounter {}: {}", encounter.key(), e);
                    }
                }
                StoreCommand::Delete(key) => {
                    if let Err(e) = store.delete(&key) {
                        tracing::warn!("Failed to delete encounter {}: {}", key, e);
                    }
                }
                StoreCommand::Get(key, reply) => {
                    let _ = reply.send(store.get(&key));
                }
                StoreCommand::All(reply) => {
                    let _ = reply.send(store.all());
                }
                StoreCommand::Active(reply) => {
                    let _ = reply.send(store.active());
                }
                StoreCommand::ByRank(rank, reply) => {
                    let _ = reply.send(store.by_rank(rank));
                }
                StoreCommand::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }
        store
    });

    (StoreHandle { tx }, worker)
}
