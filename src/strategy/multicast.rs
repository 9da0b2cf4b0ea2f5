//! §4.1 sticky multicast strategy: assigns a target number of tasks per
//! group across live instances, minimizing mutation of the existing
//! assignment.

use rand::Rng;

use crate::model::{Assignment, GroupId, Task, TaskName};

#[derive(Debug, Clone, Copy)]
pub struct MulticastConfig {
    /// Maximum allowed difference, per group, between the task count of any
    /// two eligible instances after a multicast pass.
    pub imbalance_threshold: usize,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct StickyMulticastStrategy {
    config: MulticastConfig,
}

impl StickyMulticastStrategy {
    pub fn new(config: MulticastConfig) -> Self {
        Self { config }
    }

    /// Produces a new [`Assignment`] with exactly `target_tasks` tasks of
    /// `group` (or the clamped equivalent for non-sharded groups), reusing
    /// as much of `assignment`'s existing placement as possible.
    ///
    /// `live_instances` must be sorted; callers (the orchestrator) already
    /// sort instance names before any placement-affecting iteration.
    pub fn reconcile(
        &self,
        assignment: &Assignment,
        group: &GroupId,
        live_instances: &[String],
        target_tasks: usize,
        partition_sharded: bool,
        rng: &mut impl Rng,
    ) -> Assignment {
        let mut next = assignment.clone();

        let target = if partition_sharded {
            target_tasks.max(1)
        } else {
            let upper = live_instances.len().max(1);
            target_tasks.clamp(1, upper)
        };

        if live_instances.is_empty() {
            return next;
        }

        let existing = assignment.group_tasks(group);
        let (mut kept, orphaned): (Vec<(String, Task)>, Vec<(String, Task)>) = existing
            .into_iter()
            .map(|(instance, task)| (instance.to_string(), task.clone()))
            .partition(|(instance, task)| {
                live_instances.contains(instance) && task.lock_owner.as_deref() == Some(instance)
            });

        for (instance, task) in &orphaned {
            next.remove(instance, &task.name);
        }

        kept.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        if kept.len() > target {
            let surplus = kept.len() - target;
            for _ in 0..surplus {
                // Repeatedly pick the instance currently holding the most
                // kept tasks of this group; drop one of its tasks outright
                // (no successor — the task is being decommissioned, not
                // moved).
                let heaviest = heaviest_instance(&kept);
                if let Some(pos) = kept.iter().position(|(i, _)| i == &heaviest) {
                    let (instance, task) = kept.remove(pos);
                    next.remove(&instance, &task.name);
                }
            }
        } else if kept.len() < target {
            let deficit = target - kept.len();
            for _ in 0..deficit {
                let instance = next
                    .instance_with_fewest_group_tasks(group, live_instances.iter().map(String::as_str))
                    .map(str::to_string)
                    .expect("live_instances is non-empty");
                let name = TaskName::fresh(&group.0, rng);
                let task = Task::new(name, group.clone(), Vec::new());
                let mut placed = task.clone();
                placed.lock_owner = Some(instance.clone());
                next.place(&instance, placed.clone());
                kept.push((instance, placed));
            }
        }

        self.enforce_balance(&mut next, group, live_instances, rng);
        next
    }

    fn enforce_balance(
        &self,
        assignment: &mut Assignment,
        group: &GroupId,
        live_instances: &[String],
        rng: &mut impl Rng,
    ) {
        loop {
            let loads: Vec<(String, usize)> = live_instances
                .iter()
                .map(|i| (i.clone(), group_task_count(assignment, group, i)))
                .collect();
            let Some((heaviest, max_count)) = loads.iter().max_by_key(|(_, c)| *c).cloned() else {
                break;
            };
            let Some((lightest, min_count)) = loads.iter().min_by_key(|(_, c)| *c).cloned() else {
                break;
            };
            if max_count.saturating_sub(min_count) <= self.config.imbalance_threshold {
                break;
            }
            let Some(task) = assignment
                .tasks_of(&heaviest)
                .filter(|t| &t.group == group)
                .min_by(|a, b| a.name.cmp(&b.name))
                .cloned()
            else {
                break;
            };
            assignment.remove(&heaviest, &task.name);
            let successor = task.supersede(task.partitions.clone(), Some(lightest.clone()), rng);
            assignment.place(&lightest, successor);
        }
    }
}

fn group_task_count(assignment: &Assignment, group: &GroupId, instance: &str) -> usize {
    assignment
        .tasks_of(instance)
        .filter(|t| &t.group == group)
        .count()
}

fn heaviest_instance(kept: &[(String, Task)]) -> String {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for (instance, _) in kept {
        *counts.entry(instance.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, c)| *c)
        .map(|(i, _)| i.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn creates_requested_task_count_spread_across_instances() {
        let strategy = StickyMulticastStrategy::new(MulticastConfig::default());
        let assignment = Assignment::new();
        let group = GroupId("ds".to_string());
        let instances = vec!["instance1".to_string(), "instance2".to_string()];
        let mut r = rng();
        let result = strategy.reconcile(&assignment, &group, &instances, 4, false, &mut r);
        assert_eq!(result.group_tasks(&group).len(), 4);
        for instance in &instances {
            assert_eq!(result.task_count(instance), 2);
        }
    }

    #[test]
    fn keeps_locked_live_tasks_and_drops_orphans() {
        let strategy = StickyMulticastStrategy::new(MulticastConfig::default());
        let mut assignment = Assignment::new();
        let group = GroupId("ds".to_string());
        let mut kept_task = Task::new(TaskName::new("ds", 0, "keepme1"), group.clone(), vec![]);
        kept_task.lock_owner = Some("instance1".to_string());
        assignment.place("instance1", kept_task.clone());

        let mut orphan = Task::new(TaskName::new("ds", 0, "orphan01"), group.clone(), vec![]);
        orphan.lock_owner = Some("dead-instance".to_string());
        assignment.place("dead-instance", orphan);

        let instances = vec!["instance1".to_string()];
        let mut r = rng();
        let result = strategy.reconcile(&assignment, &group, &instances, 1, false, &mut r);
        assert_eq!(result.group_tasks(&group).len(), 1);
        assert!(result.find_owner(&kept_task.name).is_some());
    }

    #[test]
    fn drops_surplus_tasks_when_shrinking_target() {
        let strategy = StickyMulticastStrategy::new(MulticastConfig::default());
        let mut assignment = Assignment::new();
        let group = GroupId("ds".to_string());
        for i in 0..4 {
            let mut t = Task::new(
                TaskName::new("ds", 0, &format!("seed{i:04}")),
                group.clone(),
                vec![],
            );
            t.lock_owner = Some("instance1".to_string());
            assignment.place("instance1", t);
        }
        let instances = vec!["instance1".to_string()];
        let mut r = rng();
        let result = strategy.reconcile(&assignment, &group, &instances, 2, false, &mut r);
        assert_eq!(result.group_tasks(&group).len(), 2);
    }

    #[test]
    fn enforces_balance_within_threshold() {
        let strategy = StickyMulticastStrategy::new(MulticastConfig {
            imbalance_threshold: 1,
        });
        let mut assignment = Assignment::new();
        let group = GroupId("ds".to_string());
        for i in 0..4 {
            let mut t = Task::new(
                TaskName::new("ds", 0, &format!("seed{i:04}")),
                group.clone(),
                vec![],
            );
            t.lock_owner = Some("instance1".to_string());
            assignment.place("instance1", t);
        }
        let instances = vec!["instance1".to_string(), "instance2".to_string()];
        let mut r = rng();
        let result = strategy.reconcile(&assignment, &group, &instances, 4, false, &mut r);
        let c1 = result.task_count("instance1");
        let c2 = result.task_count("instance2");
        assert!((c1 as i64 - c2 as i64).abs() <= 1);
        assert_eq!(c1 + c2, 4);
    }
}
