use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{GroupId, Task, TaskName};

/// Mapping from instance name to the set of tasks currently owned by that
/// instance. A task belongs to at most one instance at any committed
/// assignment; `Assignment` does not enforce this on mutation (callers go
/// through the strategies, which do), it only asserts it in [`Self::validate_unique_ownership`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    by_instance: BTreeMap<String, BTreeMap<TaskName, Task>>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> impl Iterator<Item = &str> {
        self.by_instance.keys().map(String::as_str)
    }

    pub fn tasks_of(&self, instance: &str) -> impl Iterator<Item = &Task> {
        self.by_instance
            .get(instance)
            .into_iter()
            .flat_map(|m| m.values())
    }

    pub fn task_count(&self, instance: &str) -> usize {
        self.by_instance.get(instance).map_or(0, |m| m.len())
    }

    pub fn ensure_instance(&mut self, instance: &str) {
        self.by_instance.entry(instance.to_string()).or_default();
    }

    pub fn place(&mut self, instance: &str, task: Task) {
        self.by_instance
            .entry(instance.to_string())
            .or_default()
            .insert(task.name.clone(), task);
    }

    pub fn remove(&mut self, instance: &str, name: &TaskName) -> Option<Task> {
        self.by_instance.get_mut(instance).and_then(|m| m.remove(name))
    }

    /// All tasks across all instances, for a given group.
    pub fn group_tasks(&self, group: &GroupId) -> Vec<(&str, &Task)> {
        self.by_instance
            .iter()
            .flat_map(|(instance, tasks)| {
                tasks
                    .values()
                    .filter(|t| &t.group == group)
                    .map(move |t| (instance.as_str(), t))
            })
            .collect()
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.by_instance.values().flat_map(|m| m.values())
    }

    pub fn all_task_names(&self) -> BTreeSet<TaskName> {
        self.all_tasks().map(|t| t.name.clone()).collect()
    }

    pub fn find_owner(&self, name: &TaskName) -> Option<&str> {
        self.by_instance
            .iter()
            .find(|(_, tasks)| tasks.contains_key(name))
            .map(|(instance, _)| instance.as_str())
    }

    pub fn instance_with_fewest_group_tasks<'a>(
        &'a self,
        group: &GroupId,
        candidates: impl Iterator<Item = &'a str>,
    ) -> Option<&'a str> {
        candidates.min_by_key(|instance| {
            self.by_instance
                .get(*instance)
                .map_or(0, |m| m.values().filter(|t| &t.group == group).count())
        })
    }

    /// Sanity check: no task name appears under more than one instance. The
    /// builder methods above make this true by construction as long as
    /// callers never insert the same [`TaskName`] under two instances
    /// directly; strategies should call this after assembling a candidate.
    pub fn validate_unique_ownership(&self) -> bool {
        let mut seen = BTreeSet::new();
        for tasks in self.by_instance.values() {
            for name in tasks.keys() {
                if !seen.insert(name.clone()) {
                    return false;
                }
            }
        }
        true
    }
}
