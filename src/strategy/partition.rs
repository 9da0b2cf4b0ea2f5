//! §4.2 / §4.3 sticky partition strategy: `assign_partitions` folds a
//! partition-metadata snapshot forward onto a group's existing tasks, and
//! `move_partitions` realizes an operator-directed relocation. Both mint
//! successor tasks (never mutate in place) and end with the §4.5 invariant
//! checks.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::checks;
use crate::error::AssignmentError;
use crate::model::{Assignment, GroupId, OperatorTarget, PartitionSnapshot, Task, TaskName};

#[derive(Debug, Clone, Default)]
pub struct PartitionStrategyConfig {
    pub max_partitions_per_task: Option<usize>,
}

/// Report of an `move_partitions` call that accompanies the mutated
/// assignment: operator-requested partitions that had no confirmed source
/// task are silently dropped from the core mutation (per the source
/// design), but are listed here for the caller to log or surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    pub dropped: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct StickyPartitionStrategy {
    config: PartitionStrategyConfig,
}

impl StickyPartitionStrategy {
    pub fn new(config: PartitionStrategyConfig) -> Self {
        Self { config }
    }

    /// Deterministic seed derived from the snapshot's sorted partition set,
    /// so unit tests (and replays of the same snapshot) observe the same
    /// shuffle of newly-unassigned partitions.
    fn seed_for(snapshot: &PartitionSnapshot) -> u64 {
        let mut hasher = DefaultHasher::new();
        for p in &snapshot.partitions {
            p.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn assign_partitions(
        &self,
        assignment: &Assignment,
        group: &GroupId,
        snapshot: &PartitionSnapshot,
    ) -> Result<Assignment, AssignmentError> {
        let mut group_tasks: Vec<(String, Task)> = assignment
            .group_tasks(group)
            .into_iter()
            .map(|(instance, task)| (instance.to_string(), task.clone()))
            .collect();
        if group_tasks.is_empty() {
            return Err(AssignmentError::NoTasks {
                group: group.clone(),
            });
        }
        for (instance, task) in &group_tasks {
            if task.lock_owner.as_deref() != Some(instance.as_str()) {
                return Err(AssignmentError::UnlockedTask {
                    group: group.clone(),
                    task: task.name.clone(),
                });
            }
        }
        // Stable iteration order: by task name.
        group_tasks.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        let total_tasks = group_tasks.len();
        let assigned: BTreeSet<&str> = group_tasks
            .iter()
            .flat_map(|(_, t)| t.partitions.iter().map(String::as_str))
            .collect();
        let mut unassigned: Vec<String> = snapshot
            .partitions
            .iter()
            .filter(|p| !assigned.contains(p.as_str()))
            .cloned()
            .collect();

        let base = snapshot.partitions.len() / total_tasks;
        let mut remainder = snapshot.partitions.len() % total_tasks;

        // Reject at admission, before any task is touched, if the largest
        // possible allowance would already exceed the cap (resolves the
        // open question on maxPartitionsPerTask vs. a shrinking instance
        // set: fail fast rather than produce an over-cap task).
        if let Some(cap) = self.config.max_partitions_per_task {
            let max_allowance = if remainder > 0 { base + 1 } else { base };
            if max_allowance > cap {
                return Err(AssignmentError::PartitionCapExceeded {
                    group: group.clone(),
                    task: group_tasks[0].1.name.clone(),
                    actual: max_allowance,
                    cap,
                });
            }
        }

        let mut rng = StdRng::seed_from_u64(Self::seed_for(snapshot));
        unassigned.shuffle(&mut rng);

        let mut next = assignment.clone();
        for (instance, task) in &group_tasks {
            let mut working: Vec<String> = task
                .partitions
                .iter()
                .filter(|p| snapshot.partitions.contains(p.as_str()))
                .cloned()
                .collect();

            let allowance = if remainder > 0 {
                remainder -= 1;
                base + 1
            } else {
                base
            };

            while working.len() < allowance {
                match unassigned.pop() {
                    Some(p) => working.push(p),
                    None => break,
                }
            }

            let mut original_sorted = task.partitions.clone();
            original_sorted.sort();
            let mut working_sorted = working.clone();
            working_sorted.sort();

            if working_sorted == original_sorted {
                continue;
            }

            next.remove(instance, &task.name);
            let successor = task.supersede(working, Some(instance.clone()), &mut rng);
            next.place(instance, successor);
        }

        checks::check_all(&next, group, snapshot, self.config.max_partitions_per_task)?;
        Ok(next)
    }

    pub fn move_partitions(
        &self,
        assignment: &Assignment,
        group: &GroupId,
        target: &OperatorTarget,
        snapshot: &PartitionSnapshot,
        rng: &mut impl Rng,
    ) -> Result<(Assignment, MoveOutcome), AssignmentError> {
        let requested: BTreeSet<String> = target.by_instance.values().flatten().cloned().collect();
        let not_in_snapshot: BTreeSet<String> = requested
            .iter()
            .filter(|p| !snapshot.partitions.contains(p.as_str()))
            .cloned()
            .collect();
        let mut all_to_reassign: BTreeSet<String> = requested
            .iter()
            .filter(|p| snapshot.partitions.contains(p.as_str()))
            .cloned()
            .collect();

        let mut owner_of: BTreeMap<String, (String, TaskName)> = BTreeMap::new();
        for (instance, task) in assignment.group_tasks(group) {
            for p in &task.partitions {
                owner_of.insert(p.clone(), (instance.to_string(), task.name.clone()));
            }
        }

        // No-op removal: partition already sits on the instance the target
        // asks for.
        for (instance, parts) in &target.by_instance {
            for p in parts {
                if let Some((owner_instance, _)) = owner_of.get(p) {
                    if owner_instance == instance {
                        all_to_reassign.remove(p);
                    }
                }
            }
        }

        let mut confirmed: BTreeMap<TaskName, BTreeSet<String>> = BTreeMap::new();
        for p in &all_to_reassign {
            if let Some((_, task_name)) = owner_of.get(p) {
                confirmed.entry(task_name.clone()).or_default().insert(p.clone());
            }
        }
        let confirmed_partitions: BTreeSet<String> =
            confirmed.values().flatten().cloned().collect();

        let mut dropped: BTreeSet<String> = all_to_reassign
            .iter()
            .filter(|p| !confirmed_partitions.contains(p.as_str()))
            .cloned()
            .collect();
        dropped.extend(not_in_snapshot);

        let mut processed_target: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (instance, parts) in &target.by_instance {
            let set: BTreeSet<String> = parts
                .iter()
                .filter(|p| all_to_reassign.contains(p.as_str()))
                .cloned()
                .collect();
            if !set.is_empty() {
                processed_target.insert(instance.clone(), set);
            }
        }

        let mut next = assignment.clone();
        let mut instance_names: BTreeSet<String> =
            assignment.instances().map(|s| s.to_string()).collect();
        instance_names.extend(processed_target.keys().cloned());

        for instance in &instance_names {
            let to_add: BTreeSet<String> = processed_target
                .get(instance)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|p| confirmed_partitions.contains(p))
                .collect();

            let mut group_tasks_here: Vec<Task> = assignment
                .tasks_of(instance)
                .filter(|t| &t.group == group)
                .cloned()
                .collect();

            if !to_add.is_empty() && group_tasks_here.is_empty() {
                return Err(AssignmentError::NoTargetTask {
                    group: group.clone(),
                    instance: instance.clone(),
                });
            }
            if group_tasks_here.is_empty() {
                continue;
            }

            group_tasks_here.sort_by(|a, b| {
                a.partitions.len().cmp(&b.partitions.len()).then(a.name.cmp(&b.name))
            });
            let target_task_name = group_tasks_here[0].name.clone();

            for task in &group_tasks_here {
                let mut working = task.partitions.clone();
                let mut changed = false;
                let mut new_deps: BTreeSet<TaskName> = BTreeSet::new();

                if let Some(release) = confirmed.get(&task.name) {
                    let before = working.len();
                    working.retain(|p| !release.contains(p));
                    if working.len() != before {
                        changed = true;
                    }
                }

                if task.name == target_task_name && !to_add.is_empty() {
                    for p in &to_add {
                        working.push(p.clone());
                        if let Some((_, src_task)) = owner_of.get(p) {
                            new_deps.insert(src_task.clone());
                        }
                    }
                    changed = true;
                }

                if changed {
                    next.remove(instance, &task.name);
                    let mut successor = task.supersede(working, Some(instance.clone()), rng);
                    successor.dependencies.extend(new_deps);
                    next.place(instance, successor);
                }
            }
        }

        checks::check_all(&next, group, snapshot, self.config.max_partitions_per_task)?;
        Ok((next, MoveOutcome { dropped }))
    }
}
