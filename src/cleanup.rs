//! §4.4 cleanup planner: after a rebalance commits a new assignment, decide
//! which predecessor tasks are now safe to remove from the coordination
//! store.

use std::collections::BTreeMap;

use crate::model::{Assignment, TaskName};

#[derive(Debug, Default)]
pub struct CleanupPlanner;

impl CleanupPlanner {
    pub fn new() -> Self {
        Self
    }

    /// A task `T` is removable iff it is named in the dependency set of some
    /// task `T'` that appears in `new`, and `T` itself no longer appears in
    /// `new`. `previous` is consulted only to report which instance last
    /// hosted `T`, so the orchestrator knows where to send the tombstone
    /// write — it plays no role in the removability rule itself, which
    /// covers the case where a prior leader crashed mid-commit and left
    /// intermediate tasks in the store (those tasks may not even appear in
    /// `previous` as this leader last read it).
    pub fn plan(&self, previous: &Assignment, new: &Assignment) -> BTreeMap<String, Vec<TaskName>> {
        let present_in_new = new.all_task_names();
        let mut removable: std::collections::BTreeSet<TaskName> = std::collections::BTreeSet::new();

        for task in new.all_tasks() {
            for dep in &task.dependencies {
                if !present_in_new.contains(dep) {
                    removable.insert(dep.clone());
                }
            }
        }

        let mut plan: BTreeMap<String, Vec<TaskName>> = BTreeMap::new();
        for name in removable {
            if let Some(instance) = previous.find_owner(&name) {
                plan.entry(instance.to_string()).or_default().push(name);
            } else {
                // Predecessor absent from our last read of the store too;
                // still safe to remove, just not attributable to a known
                // instance. Filed under a synthetic bucket so the
                // orchestrator can still issue the tombstone delete.
                plan.entry("_unknown".to_string()).or_default().push(name);
            }
        }
        for tasks in plan.values_mut() {
            tasks.sort();
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GroupId, Task, TaskName};

    #[test]
    fn removes_predecessor_once_successor_is_active() {
        let group = GroupId("ds".to_string());
        let mut previous = Assignment::new();
        let predecessor = Task::new(TaskName::new("ds", 0, "aaaaaaaa"), group.clone(), vec!["t-0".into()]);
        previous.place("instance1", predecessor.clone());

        let mut new = Assignment::new();
        let mut successor = Task::new(TaskName::new("ds", 1, "bbbbbbbb"), group.clone(), vec!["t-0".into()]);
        successor.dependencies.insert(predecessor.name.clone());
        new.place("instance1", successor);

        let plan = CleanupPlanner::new().plan(&previous, &new);
        assert_eq!(plan.get("instance1"), Some(&vec![predecessor.name]));
    }

    #[test]
    fn keeps_predecessor_when_it_still_appears_in_new_assignment() {
        let group = GroupId("ds".to_string());
        let mut previous = Assignment::new();
        let predecessor = Task::new(TaskName::new("ds", 0, "aaaaaaaa"), group.clone(), vec![]);
        previous.place("instance1", predecessor.clone());

        let mut new = Assignment::new();
        new.place("instance1", predecessor);
        let mut successor = Task::new(TaskName::new("ds", 1, "bbbbbbbb"), group.clone(), vec![]);
        successor.dependencies.insert(TaskName::new("ds", 0, "aaaaaaaa"));
        new.place("instance1", successor);

        let plan = CleanupPlanner::new().plan(&previous, &new);
        assert!(plan.is_empty());
    }

    #[test]
    fn crash_orphaned_intermediate_task_is_still_removable() {
        // Simulates a prior leader crashing mid-commit: the intermediate
        // task never appears in what this leader last read as `previous`,
        // but a later successor still names it as a dependency.
        let group = GroupId("ds".to_string());
        let previous = Assignment::new();
        let mut new = Assignment::new();
        let mut successor = Task::new(TaskName::new("ds", 2, "cccccccc"), group.clone(), vec![]);
        let orphan = TaskName::new("ds", 1, "bbbbbbbb");
        successor.dependencies.insert(orphan.clone());
        new.place("instance1", successor);

        let plan = CleanupPlanner::new().plan(&previous, &new);
        assert_eq!(plan.get("_unknown"), Some(&vec![orphan]));
    }
}
