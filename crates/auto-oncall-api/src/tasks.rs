//! Tracking for deliveries processed after the HTTP response is sent.

use prometheus::IntGauge;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Result of [`BackgroundTasks::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that finished within the grace period
    pub completed: usize,
    /// Tasks aborted when the grace period ran out
    pub abandoned: usize,
}

/// Set of in-flight background tasks
///
/// Finished tasks are reaped whenever a new one is spawned, so the set only
/// grows with the number of deliveries actually in progress.
#[derive(Clone)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
    in_flight: IntGauge,
}

struct InFlightGuard(IntGauge);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

impl BackgroundTasks {
    pub fn new(in_flight: IntGauge) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            in_flight,
        }
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        while let Some(result) = tasks.try_join_next() {
            log_join_result(result);
        }

        self.in_flight.inc();
        let guard = InFlightGuard(self.in_flight.clone());
        tasks.spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Tasks spawned and not yet reaped
    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `grace` for in-flight tasks, then abort the rest.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        let mut completed = 0;
        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                log_join_result(result);
                completed += 1;
            }
        })
        .await
        .is_ok();

        let abandoned = tasks.len();
        if drained {
            info!(completed, "All background tasks finished");
        } else {
            warn!(
                completed,
                abandoned,
                grace_seconds = grace.as_secs(),
                "Grace period elapsed; aborting background tasks"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        ShutdownReport {
            completed,
            abandoned,
        }
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Background task panicked");
        }
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
