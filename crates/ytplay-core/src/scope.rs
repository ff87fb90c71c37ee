//! Task scope owning every continuation a session spawns

use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinSet;
use tracing::debug;

/// Owns spawned tasks; closing aborts all of them and refuses new ones
pub struct TaskScope {
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn into the scope. Returns false once the scope is closed.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.as_mut() {
            Some(set) => {
                // reap finished handlers
                while set.try_join_next().is_some() {}
                set.spawn(task);
                true
            }
            None => false,
        }
    }

    /// Abort everything. Idempotent.
    pub fn close(&self) {
        let taken = self.tasks.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut set) = taken {
            debug!(tasks = set.len(), "Aborting session tasks");
            set.abort_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Tasks not yet reaped
    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.close();
    }
}
