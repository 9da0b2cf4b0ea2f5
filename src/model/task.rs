use std::collections::BTreeSet;
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::GroupId;

/// `<taskPrefix>_<generationCounter>_<randomSuffix>`.
///
/// Parsing splits on the last two underscores from the right so that task
/// prefixes containing underscores round-trip correctly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskName(pub String);

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TaskName {
    pub fn new(task_prefix: &str, generation: u64, random_suffix: &str) -> Self {
        TaskName(format!("{task_prefix}_{generation}_{random_suffix}"))
    }

    /// Mint a fresh successor name in the same generation lineage as `self`,
    /// bumping the generation counter by one. Falls back to generation 0 if
    /// `self` does not parse, so callers never need to special-case seed
    /// tasks that predate this naming scheme.
    pub fn next_generation(&self, rng: &mut impl Rng) -> Self {
        let (prefix, generation) = self
            .parse()
            .map(|(prefix, generation, _)| (prefix, generation))
            .unwrap_or_else(|| (self.0.clone(), 0));
        let suffix: String = rng
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        TaskName::new(&prefix, generation + 1, &suffix)
    }

    pub fn fresh(task_prefix: &str, rng: &mut impl Rng) -> Self {
        let suffix: String = rng
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        TaskName::new(task_prefix, 0, &suffix)
    }

    /// Splits `<prefix>_<generation>_<suffix>` on the last two underscores.
    pub fn parse(&self) -> Option<(String, u64, String)> {
        let s = &self.0;
        let last_us = s.rfind('_')?;
        let (head, suffix) = s.split_at(last_us);
        let suffix = &suffix[1..];
        let second_us = head.rfind('_')?;
        let (prefix, generation) = head.split_at(second_us);
        let generation = &generation[1..];
        let generation: u64 = generation.parse().ok()?;
        Some((prefix.to_string(), generation, suffix.to_string()))
    }
}

/// Status code of a [`TaskStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatusCode {
    Ok,
    Error,
    Complete,
    Paused,
}

/// A task's last reported status.
///
/// Equality requires both `code` and `message` to match (see DESIGN.md for
/// why this resolves the source ambiguity as AND rather than OR).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub code: TaskStatusCode,
    pub message: String,
    pub timestamp_millis: u64,
    pub host: String,
}

impl PartialEq for TaskStatus {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message
    }
}
impl Eq for TaskStatus {}

impl TaskStatus {
    /// Non-`ERROR` codes require a non-empty message.
    pub fn new(
        code: TaskStatusCode,
        message: impl Into<String>,
        timestamp_millis: u64,
        host: impl Into<String>,
    ) -> Option<Self> {
        let message = message.into();
        if code != TaskStatusCode::Error && message.is_empty() {
            return None;
        }
        Some(Self {
            code,
            message,
            timestamp_millis,
            host: host.into(),
        })
    }

    pub fn ok(timestamp_millis: u64, host: impl Into<String>) -> Self {
        Self {
            code: TaskStatusCode::Ok,
            message: "ok".to_string(),
            timestamp_millis,
            host: host.into(),
        }
    }
}

/// A unit of work produced by a strategy.
///
/// Tasks are treated as immutable after creation: a change to partitions,
/// owner, or status mints a new `Task` with a new [`TaskName`] that lists the
/// old one as a dependency, rather than mutating this struct in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: TaskName,
    pub group: GroupId,
    pub partitions: Vec<String>,
    pub dependencies: BTreeSet<TaskName>,
    pub lock_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<TaskStatus>,
}

impl Task {
    pub fn new(name: TaskName, group: GroupId, partitions: Vec<String>) -> Self {
        Self {
            name,
            group,
            partitions,
            dependencies: BTreeSet::new(),
            lock_owner: None,
            status: None,
        }
    }

    /// The group's task prefix, which doubles as the group id.
    pub fn task_prefix(&self) -> &str {
        self.group.0.as_str()
    }

    /// Locked iff an owner is recorded. The strategies additionally require
    /// the caller to confirm the lock is held by the instance currently
    /// reported as the owner in the coordination store (modeled by
    /// [`crate::manager::instance_roster::InstanceRoster`] liveness, not by
    /// this struct alone).
    pub fn is_locked(&self) -> bool {
        self.lock_owner.is_some()
    }

    /// Mint a successor task with the same group and a fresh name, carrying
    /// `self.name` forward as a dependency. `partitions` and `lock_owner` are
    /// supplied by the caller since they are exactly what changed.
    pub fn supersede(
        &self,
        partitions: Vec<String>,
        lock_owner: Option<String>,
        rng: &mut impl Rng,
    ) -> Task {
        let mut dependencies = BTreeSet::new();
        dependencies.insert(self.name.clone());
        Task {
            name: self.name.next_generation(rng),
            group: self.group.clone(),
            partitions,
            dependencies,
            lock_owner,
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn task_name_splits_on_last_two_underscores() {
        let name = TaskName("my_task_prefix_3_ab12cd34".to_string());
        let (prefix, generation, suffix) = name.parse().unwrap();
        assert_eq!(prefix, "my_task_prefix");
        assert_eq!(generation, 3);
        assert_eq!(suffix, "ab12cd34");
    }

    #[test]
    fn supersede_bumps_generation_and_records_dependency() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let t = Task::new(
            TaskName::new("ds", 0, "aaaaaaaa"),
            GroupId("ds".to_string()),
            vec!["p-0".to_string()],
        );
        let successor = t.supersede(vec!["p-0".to_string(), "p-1".to_string()], None, &mut rng);
        assert!(successor.dependencies.contains(&t.name));
        let (_, generation, _) = successor.name.parse().unwrap();
        assert_eq!(generation, 1);
    }

    #[test]
    fn task_status_equality_requires_code_and_message() {
        let a = TaskStatus::new(TaskStatusCode::Ok, "steady", 1, "h1").unwrap();
        let b = TaskStatus::new(TaskStatusCode::Ok, "steady", 2, "h2").unwrap();
        let c = TaskStatus::new(TaskStatusCode::Ok, "different", 1, "h1").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn non_error_status_requires_message() {
        assert!(TaskStatus::new(TaskStatusCode::Ok, "", 1, "h1").is_none());
        assert!(TaskStatus::new(TaskStatusCode::Error, "", 1, "h1").is_some());
    }
}
