//! The data model: datastreams, groups, tasks, assignments, and the snapshot
//! / operator-move types the strategies in [`crate::strategy`] consume.

mod assignment;
mod datastream;
mod task;

pub use assignment::Assignment;
pub use datastream::{Datastream, DatastreamGroup, DatastreamStatus, GroupId};
pub use task::{Task, TaskName, TaskStatus, TaskStatusCode};

use std::collections::{BTreeMap, BTreeSet};

/// The current set of source partition identifiers observed by the connector
/// for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSnapshot {
    pub group: GroupId,
    pub partitions: BTreeSet<String>,
}

impl PartitionSnapshot {
    pub fn new(group: GroupId, partitions: impl IntoIterator<Item = String>) -> Self {
        Self {
            group,
            partitions: partitions.into_iter().collect(),
        }
    }
}

/// A mapping from instance name to the set of partition identifiers the
/// operator wishes to relocate onto that instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorTarget {
    pub by_instance: BTreeMap<String, BTreeSet<String>>,
}

impl OperatorTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, instance: impl Into<String>, partition: impl Into<String>) {
        self.by_instance
            .entry(instance.into())
            .or_default()
            .insert(partition.into());
    }
}
