//! Virtual-time task queue
//!
//! Periodic and one-shot tasks ordered by `(due, sequence)`. Cancelling a
//! task only forgets it; its heap entry is dropped lazily when popped.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::core::types::{ChannelKey, Millis};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    MobSpawn,
    CapacityMonitor,
    ShadowAttack,
    BossAttack,
    MobAttack,
    Expiry,
    Regeneration,
    ExtractionSweep,
    PersistSweep,
    CollaboratorRetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: TaskKind,
    /// Owning encounter; `None` for global tasks
    pub encounter: Option<ChannelKey>,
    pub period: Option<Millis>,
}

/// A task popped from the queue, with the time it was due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    pub id: TaskId,
    pub due: Millis,
    pub task: Task,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Millis, u64, TaskId)>>,
    tasks: AHashMap<TaskId, Task>,
    by_encounter: AHashMap<ChannelKey, Vec<TaskId>>,
    next_id: TaskId,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, id: TaskId, due: Millis) {
        self.seq += 1;
        self.heap.push(Reverse((due, self.seq, id)));
    }

    fn register(&mut self, task: Task, due: Millis) -> TaskId {
        self.next_id += 1;
        let id = self.next_id;
        if let Some(key) = &task.encounter {
            self.by_encounter.entry(key.clone()).or_default().push(id);
        }
        self.tasks.insert(id, task);
        self.push(id, due);
        id
    }

    /// Task firing at `first_due` and then every `period`
    pub fn every(
        &mut self,
        kind: TaskKind,
        encounter: Option<ChannelKey>,
        first_due: Millis,
        period: Millis,
    ) -> TaskId {
        let task = Task {
            kind,
            encounter,
            period: Some(period.max(1)),
        };
        self.register(task, first_due)
    }

    /// Task firing once at `due`
    pub fn once(&mut self, kind: TaskKind, encounter: Option<ChannelKey>, due: Millis) -> TaskId {
        let task = Task {
            kind,
            encounter,
            period: None,
        };
        self.register(task, due)
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some(task) => {
                if let Some(key) = task.encounter {
                    if let Some(ids) = self.by_encounter.get_mut(&key) {
                        ids.retain(|i| *i != id);
                        if ids.is_empty() {
                            self.by_encounter.remove(&key);
                        }
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Cancel one kind of task for an encounter
    pub fn cancel_kind(&mut self, key: &ChannelKey, kind: TaskKind) -> usize {
        let ids: Vec<TaskId> = self
            .by_encounter
            .get(key)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.tasks.get(id).map_or(false, |t| t.kind == kind))
                    .collect()
            })
            .unwrap_or_default();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Cancel every task of an encounter at once
    pub fn cancel_encounter(&mut self, key: &ChannelKey) -> usize {
        let ids = self.by_encounter.remove(key).unwrap_or_default();
        ids.iter().filter(|id| self.tasks.remove(id).is_some()).count()
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
        self.by_encounter.clear();
        self.heap.clear();
    }

    pub fn has(&self, key: &ChannelKey, kind: TaskKind) -> bool {
        self.by_encounter.get(key).map_or(false, |ids| {
            ids.iter()
                .any(|id| self.tasks.get(id).map_or(false, |t| t.kind == kind))
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest due time of a live task
    pub fn next_due(&mut self) -> Option<Millis> {
        while let Some(Reverse((due, _, id))) = self.heap.peek().copied() {
            if self.tasks.contains_key(&id) {
                return Some(due);
            }
            self.heap.pop();
        }
        None
    }

    /// Pop the next task due at or before `now`
    ///
    /// Periodic tasks are rescheduled before they are returned, so a task
    /// can cancel itself while it runs.
    pub fn pop_due(&mut self, now: Millis) -> Option<DueTask> {
        loop {
            let Reverse((due, _, id)) = *self.heap.peek()?;
            if due > now {
                return None;
            }
            self.heap.pop();

            let Some(task) = self.tasks.get(&id).cloned() else {
                continue;
            };
            match task.period {
                Some(period) => self.push(id, due + period),
                None => {
                    self.cancel(id);
                }
            }
            return Some(DueTask { id, due, task });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ChannelKey {
        ChannelKey(name.into())
    }

    fn drain(queue: &mut TimerQueue, now: Millis) -> Vec<(Millis, TaskKind)> {
        let mut fired = Vec::new();
        while let Some(t) = queue.pop_due(now) {
            fired.push((t.due, t.task.kind));
        }
        fired
    }

    #[test]
    fn test_fires_in_due_then_insertion_order() {
        let mut queue = TimerQueue::new();
        queue.once(TaskKind::Expiry, Some(key("a")), 500);
        queue.every(TaskKind::BossAttack, Some(key("a")), 100, 1_000);
        queue.every(TaskKind::MobAttack, Some(key("a")), 100, 1_000);

        let fired = drain(&mut queue, 1_100);
        assert_eq!(
            fired,
            vec![
                (100, TaskKind::BossAttack),
                (100, TaskKind::MobAttack),
                (500, TaskKind::Expiry),
                (1_100, TaskKind::BossAttack),
                (1_100, TaskKind::MobAttack),
            ]
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_cancel_encounter_removes_only_its_tasks() {
        let mut queue = TimerQueue::new();
        queue.every(TaskKind::ShadowAttack, Some(key("a")), 0, 2_000);
        queue.every(TaskKind::MobSpawn, Some(key("a")), 0, 3_000);
        queue.every(TaskKind::ShadowAttack, Some(key("b")), 0, 2_000);
        queue.every(TaskKind::Regeneration, None, 0, 1_000);

        assert_eq!(queue.cancel_encounter(&key("a")), 2);
        let fired = drain(&mut queue, 0);
        assert_eq!(fired.len(), 2);
        assert!(!queue.has(&key("a"), TaskKind::ShadowAttack));
        assert!(queue.has(&key("b"), TaskKind::ShadowAttack));
    }

    #[test]
    fn test_task_can_cancel_itself_while_running() {
        let mut queue = TimerQueue::new();
        queue.every(TaskKind::MobSpawn, Some(key("a")), 0, 3_000);

        let first = queue.pop_due(0).unwrap();
        assert_eq!(queue.cancel_kind(&key("a"), TaskKind::MobSpawn), 1);
        assert!(!queue.cancel(first.id));
        assert!(queue.pop_due(10_000).is_none());
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn test_cancel_all_empties_queue() {
        let mut queue = TimerQueue::new();
        queue.every(TaskKind::Regeneration, None, 0, 1_000);
        queue.once(TaskKind::Expiry, Some(key("a")), 10);
        queue.cancel_all();
        assert!(queue.is_empty());
        assert!(queue.pop_due(u64::MAX).is_none());
    }
}
