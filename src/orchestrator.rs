//! §4.7 / §5: the leader-owned rebalance orchestrator. One cooperative
//! sequential task per group reads a consistent snapshot from the
//! coordination store, runs the pure strategies in memory, and persists the
//! result with retry/backoff and a soft deadline.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cleanup::CleanupPlanner;
use crate::config::ClusterConfig;
use crate::error::{Error, StoreError};
use crate::manager::ClusterEnv;
use crate::model::{Assignment, GroupId, OperatorTarget, Task};
use crate::store::CoordinationStore;
use crate::strategy::{
    MoveOutcome, MulticastConfig, PartitionStrategyConfig, StickyMulticastStrategy,
    StickyPartitionStrategy,
};

pub struct RebalanceOrchestrator {
    env: ClusterEnv,
    store: Arc<dyn CoordinationStore>,
    config: ClusterConfig,
    multicast: StickyMulticastStrategy,
    partitions: StickyPartitionStrategy,
    cleanup: CleanupPlanner,
}

impl RebalanceOrchestrator {
    pub fn new(env: ClusterEnv, store: Arc<dyn CoordinationStore>, config: ClusterConfig) -> Self {
        let multicast = StickyMulticastStrategy::new(MulticastConfig {
            imbalance_threshold: config.imbalance_threshold,
        });
        let partitions = StickyPartitionStrategy::new(PartitionStrategyConfig {
            max_partitions_per_task: config.max_partitions_per_task,
        });
        Self {
            env,
            store,
            config,
            multicast,
            partitions,
            cleanup: CleanupPlanner::new(),
        }
    }

    pub fn env(&self) -> &ClusterEnv {
        &self.env
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn assignments_path(&self, instance: &str) -> String {
        format!("/{}/instances/{}/assignments", self.config.cluster_name, instance)
    }

    /// Reads the current committed assignment for `group` from the store:
    /// every live instance's `assignments/{taskName}` children.
    pub async fn read_current_assignment(&self, group: &GroupId) -> Result<Assignment, Error> {
        let mut assignment = Assignment::new();
        let live = self.env.roster.live_instances().await.map_err(Error::Store)?;
        for instance in &live {
            assignment.ensure_instance(instance);
            let names = self
                .store
                .children(&self.assignments_path(instance))
                .await
                .map_err(Error::Store)?;
            for name in names {
                let path = format!("{}/{}", self.assignments_path(instance), name);
                if let Some(json) = self.store.get(&path).await.map_err(Error::Store)? {
                    let task: Task = serde_json::from_str(&json)
                        .map_err(|e| Error::Store(StoreError::Fatal(format!("task corrupt at {path}: {e}"))))?;
                    if &task.group == group {
                        assignment.place(instance, task);
                    }
                }
            }
        }
        Ok(assignment)
    }

    /// Writes every task newly present in `next` (not in `previous` by name)
    /// and deletes the tombstones named by the cleanup planner. Task
    /// creations are idempotent (keyed by task name), so a crash between the
    /// two loops below is safe to replay from store state alone.
    pub async fn persist_assignment(
        &self,
        previous: &Assignment,
        next: &Assignment,
    ) -> Result<(), Error> {
        let previously_present = previous.all_task_names();
        for instance in next.instances() {
            for task in next.tasks_of(instance) {
                if previously_present.contains(&task.name) {
                    continue;
                }
                let path = format!("{}/{}", self.assignments_path(instance), task.name);
                let json = serde_json::to_string(task)
                    .map_err(|e| Error::Store(StoreError::Fatal(format!("task serialisation failed: {e}"))))?;
                self.store.put(&path, &json).await.map_err(Error::Store)?;
            }
        }

        let tombstones = self.cleanup.plan(previous, next);
        for (instance, tasks) in tombstones {
            if instance == "_unknown" {
                continue;
            }
            for name in tasks {
                let path = format!("{}/{}", self.assignments_path(&instance), name);
                self.store.delete(&path).await.map_err(Error::Store)?;
            }
        }
        Ok(())
    }

    /// Realizes an operator-directed move immediately, outside the regular
    /// rebalance cadence: reads the current assignment and partition
    /// snapshot, applies [`StickyPartitionStrategy::move_partitions`], and
    /// persists the result. Used by the admin CLI's `MOVE` command.
    pub async fn run_move(&self, group: &GroupId, target: OperatorTarget) -> Result<MoveOutcome, Error> {
        let snapshot = self
            .env
            .partitions
            .snapshot(group)
            .await
            .map_err(Error::Store)?;
        let current = self.read_current_assignment(group).await?;
        let mut rng = StdRng::from_entropy();
        let (next, outcome) = self
            .partitions
            .move_partitions(&current, group, &target, &snapshot, &mut rng)
            .map_err(Error::Assignment)?;
        self.persist_assignment(&current, &next).await?;
        Ok(outcome)
    }

    /// Runs one rebalance cycle for `group`: read, compute, persist. Returns
    /// without writing anything if any step fails or `cancel` fires first.
    pub async fn run_cycle(&self, group: &GroupId, cancel: &CancellationToken) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::LeadershipLost);
        }
        let live = self.env.roster.live_instances().await.map_err(Error::Store)?;
        let groups = self.env.registry.list_groups().await.map_err(Error::Store)?;
        let target_tasks = groups
            .iter()
            .find(|g| &g.id() == group)
            .and_then(|g| g.num_tasks)
            .unwrap_or(self.config.max_tasks);

        if cancel.is_cancelled() {
            return Err(Error::LeadershipLost);
        }
        let snapshot = self
            .env
            .partitions
            .snapshot(group)
            .await
            .map_err(Error::Store)?;
        let current = self.read_current_assignment(group).await?;

        if cancel.is_cancelled() {
            return Err(Error::LeadershipLost);
        }

        let mut rng = StdRng::from_entropy();
        // Every group in this crate is partition-sharded: the whole premise
        // of §4.2/§4.3 is that tasks co-reside and partitions are
        // distributed among them, so the task count is never capped at the
        // live instance count.
        let reconciled = self
            .multicast
            .reconcile(&current, group, &live, target_tasks, true, &mut rng);

        let next = if reconciled.group_tasks(group).is_empty() {
            reconciled
        } else {
            self.partitions
                .assign_partitions(&reconciled, group, &snapshot)
                .map_err(Error::Assignment)?
        };

        if cancel.is_cancelled() {
            return Err(Error::LeadershipLost);
        }
        self.persist_assignment(&current, &next).await?;
        info!(group = %group, instances = live.len(), "rebalance cycle committed");
        Ok(())
    }

    /// Drives [`Self::run_cycle`] with exponential backoff on retryable
    /// errors (capped by `retry_backoff_cap`) and a soft deadline after which
    /// the candidate is discarded and a retry rescheduled, per §5.
    pub async fn run_cycle_with_retry(&self, group: &GroupId, cancel: &CancellationToken) {
        let mut backoff = Duration::from_millis(100);
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let attempt = tokio::time::timeout(self.config.rebalance_deadline(), self.run_cycle(group, cancel)).await;
            match attempt {
                Ok(Ok(())) => return,
                Ok(Err(e)) if e.retryable() => {
                    warn!(group = %group, error = %e, backoff_ms = backoff.as_millis(), "rebalance cycle failed, retrying");
                }
                Ok(Err(e)) => {
                    warn!(group = %group, error = %e, "non-retryable rebalance error, giving up this tick");
                    return;
                }
                Err(_) => {
                    warn!(group = %group, "rebalance cycle exceeded soft deadline, discarding candidate");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => return,
            }
            backoff = (backoff * 2).min(self.config.retry_backoff_cap());
        }
    }
}
