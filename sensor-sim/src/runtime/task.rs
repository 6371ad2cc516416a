//! Schedulable units: name, priority, stack size and optional CPU placement.
//!
//! Host threads have no portable static priority, so the priority travels as
//! metadata, is checked by [`crate::SimConfig::validate`] and shows up in the
//! logs. Pinning both tasks to one CPU is the closest host analogue of the
//! single-core kernel the priorities were written for.

use std::io;
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use serde::{Deserialize, Serialize};

use crate::trace::{debug, warn};

/// Static task priority; larger runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    /// Priority of the kernel's idle task.
    pub const IDLE: Self = Self(0);

    /// `n` levels above idle.
    #[must_use]
    pub const fn above_idle(n: u8) -> Self {
        Self(Self::IDLE.0 + n)
    }
}

/// Creation parameters for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Thread name, for debugging only.
    pub name: String,
    pub priority: Priority,
    /// Stack size in bytes.
    pub stack_size: usize,
}

impl TaskSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, priority: Priority, stack_size: usize) -> Self {
        Self {
            name: name.into(),
            priority,
            stack_size,
        }
    }

    /// Spawns `body` on a new thread, optionally pinned to `core`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created, typically
    /// because memory for its stack is exhausted.
    pub fn spawn<F, T>(&self, core: Option<usize>, body: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        debug!(task = %self.name, priority = self.priority.0, stack = self.stack_size, "creating task");
        thread::Builder::new()
            .name(self.name.clone())
            .stack_size(self.stack_size)
            .spawn(move || {
                // Logs below take the name from the thread itself.
                if let Some(id) = core {
                    if core_affinity::set_for_current(CoreId { id }) {
                        debug!(task = ?thread::current().name(), core = id, "task pinned");
                    } else {
                        warn!(task = ?thread::current().name(), core = id, "task pinning failed, running unpinned");
                    }
                }
                body()
            })
    }
}

/// Ids of the CPUs this process may run on, lowest first.
#[must_use]
pub fn available_cores() -> Vec<usize> {
    let mut ids: Vec<usize> = core_affinity::get_core_ids()
        .map(|ids| ids.into_iter().map(|core| core.id).collect())
        .unwrap_or_default();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_order_above_idle() {
        assert!(Priority::above_idle(2) > Priority::above_idle(1));
        assert!(Priority::above_idle(1) > Priority::IDLE);
    }

    #[test]
    fn spawned_task_carries_name() {
        let spec = TaskSpec::new("sampler", Priority::above_idle(1), 64 * 1024);
        let handle = spec
            .spawn(None, || thread::current().name().map(str::to_owned))
            .unwrap();

        assert_eq!(handle.join().unwrap().as_deref(), Some("sampler"));
    }

    #[test]
    fn spawn_with_first_core_runs_body() {
        let core = available_cores().first().copied();
        let spec = TaskSpec::new("pinned", Priority::above_idle(1), 64 * 1024);

        assert_eq!(spec.spawn(core, || 7).unwrap().join().unwrap(), 7);
    }
}
