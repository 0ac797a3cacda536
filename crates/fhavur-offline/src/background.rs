//! Fire-and-forget work spawned by strategies
//!
//! Trims and revalidations run on their own tasks, tracked in a [`JoinSet`]
//! so hosts can wait for them with [`BackgroundTasks::settle`]. Each task has
//! its own error boundary: failures and panics are logged, never propagated.
//! Tasks are never cancelled, not even when the tracker is dropped.

use parking_lot::Mutex;
use std::{fmt::Display, future::Future};
use tokio::{runtime::Handle, task::JoinError, task::JoinSet};
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(error = %e, "Background task panicked");
        } else {
            trace!(error = %e, "Background task ended early");
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime; an `Err` is logged with `label`
    pub fn spawn<F, E>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            warn!(task = label, "No async runtime available, background task dropped");
            return;
        };

        let mut tasks = self.tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            log_join(result);
        }

        tasks.spawn_on(
            async move {
                if let Err(e) = task.await {
                    warn!(task = label, error = %e, "Background task failed");
                }
            },
            &handle,
        );
        trace!(task = label, pending = tasks.len(), "Spawned background task");
    }

    /// Tasks spawned and not yet reaped
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Wait until every task, including ones spawned meanwhile, has finished
    pub async fn settle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                log_join(result);
            }
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.tasks.get_mut().detach_all();
    }
}
