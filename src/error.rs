//! Crate-wide error types.
//!
//! Each subsystem gets its own error enum; [`Error`] composes them the way a
//! leader-node crate composes per-subsystem errors into one type that the
//! orchestrator can match on to decide retry vs. escalation.

use thiserror::Error;

use crate::model::{GroupId, TaskName};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("connection string {0:?} has no scheme")]
    MissingScheme(String),
    #[error("connection string {0:?} uses unknown scheme {1:?}")]
    UnknownScheme(String, String),
    #[error("connection string {0:?} has an empty topic")]
    EmptyTopic(String),
    #[error("connection string {0:?} has no host list")]
    MissingHosts(String),
    #[error("connection string {0:?} has an invalid host:port entry {1:?}")]
    InvalidHostPort(String, String),
    #[error("connection string {0:?} has a port outside 1..=65535: {1}")]
    PortOutOfRange(String, u32),
}

/// Errors produced by the sticky multicast / sticky partition strategies.
///
/// These are always locally recoverable: the orchestrator discards the
/// candidate assignment and schedules a retry. None of them ever escape with
/// partial state written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("group {group} has no tasks in the current assignment")]
    NoTasks { group: GroupId },

    #[error("task {task} of group {group} is not locked by its owner")]
    UnlockedTask { group: GroupId, task: TaskName },

    #[error("instance {instance} has no task of group {group} to receive a move")]
    NoTargetTask { group: GroupId, instance: String },

    #[error("task {task} of group {group} would carry {actual} partitions, exceeding cap {cap}")]
    PartitionCapExceeded {
        group: GroupId,
        task: TaskName,
        actual: usize,
        cap: usize,
    },

    #[error("group {group}: snapshot partitions {missing:?} are not covered by any task")]
    Coverage { group: GroupId, missing: Vec<String> },

    #[error(
        "group {group}: task partition counts sum to {actual}, expected snapshot size {expected}"
    )]
    CountMismatch {
        group: GroupId,
        actual: usize,
        expected: usize,
    },

    #[error("group {group}: the same task name appears under more than one instance")]
    DuplicateOwnership { group: GroupId },
}

impl AssignmentError {
    /// All `AssignmentError`s are locally recoverable: discard the candidate
    /// and retry on the next tick. Kept as a method (rather than folding the
    /// fact into the caller) so the classification has one home.
    pub fn retryable(&self) -> bool {
        true
    }
}

/// Errors from the coordination-store client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no node at path {0}")]
    NotFound(String),

    #[error("node already exists at path {0}")]
    AlreadyExists(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn retryable(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Transient(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    ConnectionString(#[from] ConnectionStringError),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("leadership lost mid-rebalance")]
    LeadershipLost,

    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn retryable(&self) -> bool {
        match self {
            Error::ConnectionString(_) => false,
            Error::Assignment(e) => e.retryable(),
            Error::Store(e) => e.retryable(),
            Error::LeadershipLost => false,
            Error::Validation(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
