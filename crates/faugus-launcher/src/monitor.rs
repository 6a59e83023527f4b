use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use faugus_core::registry::RunningGameRegistry;
use faugus_process::ProcessTable;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// What changed in the running set since the previous tick.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunningChange {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
}

/// Drops registry entries whose main process is gone, once a second. The
/// only place reconciliation happens.
pub struct ReconcilePoller<T> {
    registry: RunningGameRegistry,
    table: Arc<T>,
    interval: Duration,
    running: BTreeSet<String>,
}

impl<T: ProcessTable + Send + Sync + 'static> ReconcilePoller<T> {
    pub fn new(registry: RunningGameRegistry, table: Arc<T>) -> Self {
        Self {
            registry,
            table,
            interval: RECONCILE_INTERVAL,
            running: BTreeSet::new(),
        }
    }

    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.tick().await;
                tokio::time::sleep(self.interval).await;
            }
        })
    }

    pub async fn tick(&mut self) -> RunningChange {
        let registry = self.registry.clone();
        let table = Arc::clone(&self.table);
        let pass = tokio::task::spawn_blocking(move || {
            if let Err(err) = registry.reconcile(&*table) {
                tracing::warn!(error = %err, "reconcile failed");
            }
            registry.read()
        })
        .await;
        let now: BTreeSet<String> = match pass {
            Ok(games) => games.into_keys().collect(),
            Err(err) => {
                tracing::warn!(error = %err, "reconcile task failed");
                return RunningChange::default();
            }
        };
        let change = RunningChange {
            started: now.difference(&self.running).cloned().collect(),
            stopped: self.running.difference(&now).cloned().collect(),
        };
        for title in &change.started {
            tracing::info!(title = %title, "running");
        }
        for title in &change.stopped {
            tracing::info!(title = %title, "stopped");
        }
        self.running = now;
        change
    }
}
