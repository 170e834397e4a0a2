//! Deferred execution for `delay` blocks.
//!
//! A prog never sleeps.  When a `delay` statement runs it hands a callback to
//! the host's [`Scheduler`] and carries on immediately.  [`DelayQueue`] is a
//! ready-made scheduler driven by a logical clock: the host calls
//! [`DelayQueue::advance`] from its own tick loop.
//!
//! ```rust
//! # use prog::scheduler::{DelayQueue, Scheduler};
//! # use std::cell::Cell;
//! # use std::rc::Rc;
//! # use std::time::Duration;
//! let queue = DelayQueue::new();
//! let fired = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&fired);
//! queue.schedule(Box::new(move || flag.set(true)), Duration::from_millis(50), "demo".into());
//!
//! assert_eq!(queue.advance(Duration::from_millis(20)), 0);
//! assert_eq!(queue.advance(Duration::from_millis(30)), 1);
//! assert!(fired.get());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

/// Host facility that runs a callback after a delay.
pub trait Scheduler {
    fn schedule(&self, callback: Box<dyn FnOnce()>, delay: Duration, description: String);
}

// ── Task ──────────────────────────────────────────────────────────────────

struct Task {
    id: u32,
    description: String,
    due: Duration,
    callback: Box<dyn FnOnce()>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("due", &self.due)
            .finish()
    }
}

/// A task waiting in a [`DelayQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub id: u32,
    pub description: String,
    /// Time remaining until the task fires.
    pub remaining: Duration,
}

// ── DelayQueue ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct QueueState {
    tasks: Vec<Task>,
    now: Duration,
    next_id: u32,
}

/// A [`Scheduler`] on a logical clock.
///
/// Tasks fire in order of due time, ties broken by scheduling order.  A
/// callback may schedule further tasks; any that are already due fire in the
/// same [`advance`](Self::advance) call.
#[derive(Debug, Default)]
pub struct DelayQueue {
    state: RefCell<QueueState>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical time elapsed since the queue was created.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Time until the soonest task fires, or `None` if nothing is queued.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let state = self.state.borrow();
        state.tasks.iter().map(|t| t.due.saturating_sub(state.now)).min()
    }

    /// Queued tasks in firing order.
    pub fn pending(&self) -> Vec<PendingTask> {
        let state = self.state.borrow();
        let mut out: Vec<PendingTask> = state
            .tasks
            .iter()
            .map(|t| PendingTask {
                id: t.id,
                description: t.description.clone(),
                remaining: t.due.saturating_sub(state.now),
            })
            .collect();
        out.sort_by_key(|p| (p.remaining, p.id));
        out
    }

    /// Cancel a task by ID.  Returns `true` if found.
    pub fn remove(&self, id: u32) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        state.tasks.len() < before
    }

    /// Drop every queued task without running it.
    pub fn clear(&self) {
        self.state.borrow_mut().tasks.clear();
    }

    /// Move the clock forward and run every task that became due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, elapsed: Duration) -> usize {
        self.state.borrow_mut().now += elapsed;
        let mut ran = 0;
        while let Some(task) = self.take_next_due() {
            tracing::trace!(id = task.id, description = %task.description, "running delayed task");
            (task.callback)();
            ran += 1;
        }
        ran
    }

    /// Keep advancing until the queue is empty.  Returns the number of tasks run.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while let Some(wait) = self.next_wakeup() {
            ran += self.advance(wait);
        }
        ran
    }

    // The borrow is released before the callback runs, so callbacks may
    // schedule more work.
    fn take_next_due(&self) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        let now = state.now;
        let idx = state
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(state.tasks.remove(idx))
    }
}

impl Scheduler for DelayQueue {
    fn schedule(&self, callback: Box<dyn FnOnce()>, delay: Duration, description: String) {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let due = state.now + delay;
        tracing::trace!(id, ?delay, %description, "queued delayed task");
        state.tasks.push(Task { id, description, due, callback });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
