//! §4.5 invariant checks, run after every assignment mutation. Failure
//! aborts the rebalance; callers must not persist a candidate that fails
//! these checks.

use crate::error::AssignmentError;
use crate::model::{Assignment, GroupId, PartitionSnapshot};

pub fn check_all(
    assignment: &Assignment,
    group: &GroupId,
    snapshot: &PartitionSnapshot,
    max_partitions_per_task: Option<usize>,
) -> Result<(), AssignmentError> {
    check_coverage(assignment, group, snapshot)?;
    check_count(assignment, group, snapshot)?;
    if let Some(cap) = max_partitions_per_task {
        check_cap(assignment, group, cap)?;
    }
    check_unique_ownership(assignment, group)?;
    Ok(())
}

/// Invariant 2 (uniqueness): no task name appears under more than one
/// instance.
fn check_unique_ownership(assignment: &Assignment, group: &GroupId) -> Result<(), AssignmentError> {
    if assignment.validate_unique_ownership() {
        Ok(())
    } else {
        Err(AssignmentError::DuplicateOwnership {
            group: group.clone(),
        })
    }
}

fn check_coverage(
    assignment: &Assignment,
    group: &GroupId,
    snapshot: &PartitionSnapshot,
) -> Result<(), AssignmentError> {
    let covered: std::collections::BTreeSet<&str> = assignment
        .group_tasks(group)
        .into_iter()
        .flat_map(|(_, t)| t.partitions.iter().map(String::as_str))
        .collect();
    let missing: Vec<String> = snapshot
        .partitions
        .iter()
        .filter(|p| !covered.contains(p.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(AssignmentError::Coverage {
            group: group.clone(),
            missing,
        });
    }
    Ok(())
}

fn check_count(
    assignment: &Assignment,
    group: &GroupId,
    snapshot: &PartitionSnapshot,
) -> Result<(), AssignmentError> {
    let actual: usize = assignment
        .group_tasks(group)
        .iter()
        .map(|(_, t)| t.partitions.len())
        .sum();
    let expected = snapshot.partitions.len();
    if actual != expected {
        return Err(AssignmentError::CountMismatch {
            group: group.clone(),
            actual,
            expected,
        });
    }
    Ok(())
}

fn check_cap(
    assignment: &Assignment,
    group: &GroupId,
    cap: usize,
) -> Result<(), AssignmentError> {
    for (_, task) in assignment.group_tasks(group) {
        if task.partitions.len() > cap {
            return Err(AssignmentError::PartitionCapExceeded {
                group: group.clone(),
                task: task.name.clone(),
                actual: task.partitions.len(),
                cap,
            });
        }
    }
    Ok(())
}
