//! Work queue for the extraction workers.
//!
//! The queue is built once at the start of a run:
//! 1. Entities already present in the progress checkpoint are dropped
//! 2. Duplicate identity keys in the input are dropped (first one wins)
//! 3. Low-information categories are optionally moved to the front
//! 4. An optional sample limit is applied
//!
//! After that it is only drained through [`TaskQueue::try_take`], which hands
//! each task to exactly one worker and never blocks.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use crate::entity::{Entity, Task};

/// How to build the queue from the entity list.
#[derive(Debug, Clone)]
pub struct QueuePlan {
    /// Move entities whose category matches a priority marker to the front.
    pub prioritize: bool,
    /// Case-insensitive substrings marking a low-information category.
    pub priority_markers: Vec<String>,
    /// Keep at most this many tasks (after ordering).
    pub sample_size: Option<usize>,
}

impl Default for QueuePlan {
    fn default() -> Self {
        Self {
            prioritize: true,
            priority_markers: vec!["Unspecified".to_string()],
            sample_size: None,
        }
    }
}

impl QueuePlan {
    fn is_priority(&self, entity: &Entity) -> bool {
        let category = entity.category.to_lowercase();
        self.priority_markers
            .iter()
            .any(|marker| category.contains(&marker.to_lowercase()))
    }
}

/// Counts gathered while building a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub input: usize,
    pub already_completed: usize,
    pub duplicates: usize,
    pub prioritized: usize,
    pub queued: usize,
}

/// Ordered, consumable collection of tasks shared by all workers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    initial_len: usize,
}

impl TaskQueue {
    /// Build a queue from the entity list, skipping already completed keys.
    pub fn build<'a, I>(entities: I, completed: &HashSet<String>, plan: &QueuePlan) -> (Self, QueueStats)
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut stats = QueueStats::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut priority = Vec::new();
        let mut normal = Vec::new();

        for entity in entities {
            stats.input += 1;
            let task = Task::new(entity.clone());

            if completed.contains(task.key()) {
                stats.already_completed += 1;
                continue;
            }
            if !seen.insert(task.key().to_string()) {
                stats.duplicates += 1;
                continue;
            }

            if plan.prioritize && plan.is_priority(task.entity()) {
                priority.push(task);
            } else {
                normal.push(task);
            }
        }

        stats.prioritized = priority.len();
        let mut ordered: VecDeque<Task> = priority.into_iter().chain(normal).collect();
        if let Some(limit) = plan.sample_size {
            ordered.truncate(limit);
        }
        stats.queued = ordered.len();

        debug!(
            input = stats.input,
            completed = stats.already_completed,
            duplicates = stats.duplicates,
            prioritized = stats.prioritized,
            queued = stats.queued,
            "Built task queue"
        );

        (Self::from_tasks(ordered), stats)
    }

    /// Create a queue holding the given tasks in order.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks: VecDeque<Task> = tasks.into_iter().collect();
        let initial_len = tasks.len();
        Self {
            tasks: Mutex::new(tasks),
            initial_len,
        }
    }

    /// Atomically take the next task, or `None` once the queue is drained.
    pub fn try_take(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Return a claimed task that was never attempted to the front.
    pub fn requeue(&self, task: Task) {
        self.lock().push_front(task);
    }

    /// Tasks not yet claimed by any worker.
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Number of tasks the queue was created with.
    pub fn initial_len(&self) -> usize {
        self.initial_len
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        // A panicking holder cannot leave the deque half-modified.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entity(name: &str, category: &str) -> Entity {
        Entity::new(name, format!("{} Main St", name.len()), category, "Queens")
    }

    fn names(queue: &TaskQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_take())
            .map(|t| t.entity().name.clone())
            .collect()
    }

    #[test]
    fn test_build_filters_completed_keys() {
        let entities = vec![entity("a", "Pizza"), entity("bb", "Thai"), entity("ccc", "Deli")];
        let completed: HashSet<String> = [entities[1].key()].into_iter().collect();

        let (queue, stats) = TaskQueue::build(&entities, &completed, &QueuePlan::default());

        assert_eq!(stats.already_completed, 1);
        assert_eq!(stats.queued, 2);
        assert_eq!(names(&queue), vec!["a", "ccc"]);
    }

    #[test]
    fn test_build_prioritizes_unspecified_stably() {
        let entities = vec![
            entity("a", "Pizza"),
            entity("bb", "Unspecified"),
            entity("ccc", "Thai"),
            entity("dddd", "Other/Unspecified"),
        ];
        let (queue, stats) = TaskQueue::build(&entities, &HashSet::new(), &QueuePlan::default());

        assert_eq!(stats.prioritized, 2);
        assert_eq!(names(&queue), vec!["bb", "dddd", "a", "ccc"]);
    }

    #[test]
    fn test_build_without_prioritization_keeps_input_order() {
        let entities = vec![entity("a", "Pizza"), entity("bb", "Unspecified")];
        let plan = QueuePlan {
            prioritize: false,
            ..Default::default()
        };
        let (queue, stats) = TaskQueue::build(&entities, &HashSet::new(), &plan);

        assert_eq!(stats.prioritized, 0);
        assert_eq!(names(&queue), vec!["a", "bb"]);
    }

    #[test]
    fn test_build_applies_sample_after_ordering() {
        let entities = vec![
            entity("a", "Pizza"),
            entity("bb", "Thai"),
            entity("ccc", "unspecified"),
        ];
        let plan = QueuePlan {
            sample_size: Some(2),
            ..Default::default()
        };
        let (queue, stats) = TaskQueue::build(&entities, &HashSet::new(), &plan);

        assert_eq!(stats.queued, 2);
        assert_eq!(queue.initial_len(), 2);
        assert_eq!(names(&queue), vec!["ccc", "a"]);
    }

    #[test]
    fn test_build_drops_duplicate_keys() {
        let first = Entity::new("Cafe", "1 Main St", "Coffee", "Queens");
        let dup = Entity::new("Cafe", "1 Main St", "Unspecified", "Queens");
        let (queue, stats) = TaskQueue::build(&[first, dup], &HashSet::new(), &QueuePlan::default());

        assert_eq!(stats.duplicates, 1);
        assert_eq!(queue.remaining(), 1);
        assert_eq!(queue.try_take().unwrap().entity().category, "Coffee");
    }

    #[test]
    fn test_try_take_signals_empty() {
        let queue = TaskQueue::from_tasks(vec![Task::new(entity("a", "Pizza"))]);
        assert!(queue.try_take().is_some());
        assert!(queue.try_take().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_puts_task_back_first() {
        let queue = TaskQueue::from_tasks(vec![
            Task::new(entity("a", "Pizza")),
            Task::new(entity("bb", "Thai")),
        ]);
        let first = queue.try_take().unwrap();
        queue.requeue(first);

        assert_eq!(queue.remaining(), 2);
        assert_eq!(names(&queue), vec!["a", "bb"]);
    }

    #[test]
    fn test_concurrent_take_hands_out_each_task_once() {
        let tasks: Vec<Task> = (0..500)
            .map(|i| Task::new(Entity::new(format!("r{}", i), "addr", "", "")))
            .collect();
        let queue = Arc::new(TaskQueue::from_tasks(tasks));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(task) = queue.try_take() {
                        taken.push(task.key().to_string());
                    }
                    taken
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 500);
        assert_eq!(unique.len(), 500);
    }
}
