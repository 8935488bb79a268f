//! Priority admission scheduler
//!
//! Gates how many pending searches may enter processing at once. Searches
//! queue per priority tier (high > normal > low, FIFO within a tier); a
//! dispatcher task admits the next candidate whenever capacity frees up.
//! All queue and active-count mutation goes through one mutex so the
//! concurrency cap cannot be oversubscribed.

use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::Priority;

/// Pipeline task factory invoked for each admitted search
pub type SearchRunner = Arc<dyn Fn(Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

struct SchedulerState {
    high: VecDeque<Uuid>,
    normal: VecDeque<Uuid>,
    low: VecDeque<Uuid>,
    /// Handles of running pipeline tasks, keyed by search id
    active: HashMap<Uuid, JoinHandle<()>>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
            active: HashMap::new(),
        }
    }

    fn queue_for(&mut self, priority: Priority) -> &mut VecDeque<Uuid> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    /// Next search to admit: highest tier first, FIFO within a tier
    fn pop_next(&mut self) -> Option<Uuid> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    fn queued(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}

/// Admission scheduler
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    wake: Notify,
    max_concurrent: usize,
}

impl Scheduler {
    /// Create a scheduler and start its dispatcher task.
    ///
    /// `runner` produces the pipeline future for an admitted search. The
    /// dispatcher retains each spawned task's handle until the task reports
    /// completion via [`Scheduler::task_finished`].
    pub fn start(max_concurrent: usize, runner: SearchRunner) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            state: Mutex::new(SchedulerState::new()),
            wake: Notify::new(),
            max_concurrent,
        });

        let dispatcher = scheduler.clone();
        tokio::spawn(async move {
            dispatcher.dispatch_loop(runner).await;
        });

        scheduler
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a search for admission
    pub fn enqueue(&self, search_id: Uuid, priority: Priority) {
        {
            let mut state = self.lock();
            state.queue_for(priority).push_back(search_id);
        }
        tracing::debug!(search_id = %search_id, priority = priority.as_str(), "Search queued");
        self.wake.notify_one();
    }

    /// Remove a search that has not yet been admitted.
    ///
    /// Returns true if the search was still queued. Used by cancellation:
    /// a queued search can be cancelled without ever starting.
    pub fn remove_queued(&self, search_id: Uuid) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        for queue in [&mut state.high, &mut state.normal, &mut state.low] {
            if let Some(pos) = queue.iter().position(|id| *id == search_id) {
                queue.remove(pos);
                return true;
            }
        }
        false
    }

    /// Report that an admitted search's pipeline task finished.
    ///
    /// Frees a concurrency slot and wakes the dispatcher.
    pub fn task_finished(&self, search_id: Uuid) {
        {
            let mut state = self.lock();
            state.active.remove(&search_id);
        }
        self.wake.notify_one();
    }

    /// Searches waiting for admission
    pub fn queue_size(&self) -> usize {
        self.lock().queued()
    }

    /// Searches currently processing
    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    async fn dispatch_loop(self: Arc<Self>, runner: SearchRunner) {
        loop {
            self.admit_while_capacity(&runner);
            self.wake.notified().await;
        }
    }

    /// Admit queued searches until the cap is reached or the queue empties
    fn admit_while_capacity(self: &Arc<Self>, runner: &SearchRunner) {
        loop {
            let mut state = self.lock();
            if state.active.len() >= self.max_concurrent {
                return;
            }
            let Some(search_id) = state.pop_next() else {
                return;
            };

            let scheduler = self.clone();
            let future = runner(search_id);
            let handle = tokio::spawn(async move {
                future.await;
                scheduler.task_finished(search_id);
            });
            state.active.insert(search_id, handle);
            drop(state);

            tracing::debug!(search_id = %search_id, "Search admitted to processing");
        }
    }
}
