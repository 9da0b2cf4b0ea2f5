use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Datastream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatastreamStatus {
    Ready,
    Paused,
    Stopping,
    Deleting,
}

/// A named source-to-destination pipeline.
///
/// `destination.partitions` and `source.connectionString` are flattened onto
/// this type rather than nested, since nothing else in this crate needs the
/// intermediate structs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastream {
    pub name: String,
    pub connector_name: String,
    pub source_connection_string: String,
    pub destination_connection_string: String,
    pub destination_partitions: u32,
    pub transport_provider_name: String,
    pub status: DatastreamStatus,
    pub metadata: BTreeMap<String, String>,
}

impl Datastream {
    pub fn new(name: impl Into<String>, connector_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connector_name: connector_name.into(),
            source_connection_string: String::new(),
            destination_connection_string: String::new(),
            destination_partitions: 0,
            transport_provider_name: String::new(),
            status: DatastreamStatus::Ready,
            metadata: BTreeMap::new(),
        }
    }
}

/// Identifies a [`DatastreamGroup`] by its shared task prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        GroupId(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        GroupId(s)
    }
}

/// A non-empty ordered collection of datastreams sharing a task prefix.
///
/// This is the unit at which the strategies operate: every rebalance call
/// takes a single group's worth of datastreams and tasks at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastreamGroup {
    task_prefix: String,
    datastreams: Vec<Datastream>,
    /// Target number of tasks for this group, used by the multicast strategy.
    /// `None` falls back to the caller-supplied global default.
    pub num_tasks: Option<usize>,
}

impl DatastreamGroup {
    /// Returns `None` if `datastreams` is empty, per the non-empty invariant.
    pub fn new(task_prefix: impl Into<String>, datastreams: Vec<Datastream>) -> Option<Self> {
        if datastreams.is_empty() {
            return None;
        }
        Some(Self {
            task_prefix: task_prefix.into(),
            datastreams,
            num_tasks: None,
        })
    }

    pub fn id(&self) -> GroupId {
        GroupId(self.task_prefix.clone())
    }

    pub fn task_prefix(&self) -> &str {
        &self.task_prefix
    }

    pub fn datastreams(&self) -> &[Datastream] {
        &self.datastreams
    }
}
