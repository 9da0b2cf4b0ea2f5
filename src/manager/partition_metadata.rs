use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{GroupId, PartitionSnapshot};

/// Per group, the authoritative set of source partition identifiers as
/// observed by the connector. The connector implementations themselves
/// (message-log consumer, file reader, ...) are external collaborators; this
/// trait is the seam they would plug into.
#[async_trait]
pub trait PartitionMetadataProvider: Send + Sync {
    async fn snapshot(&self, group: &GroupId) -> Result<PartitionSnapshot, StoreError>;
}

/// An in-process provider backed by a plain map, standing in for a connector
/// in tests and in the demo binary. Production deployments would replace
/// this with a connector-backed implementation that polls or watches the
/// underlying source for partition changes.
#[derive(Default)]
pub struct StaticPartitionMetadataProvider {
    snapshots: RwLock<BTreeMap<GroupId, PartitionSnapshot>>,
}

impl StaticPartitionMetadataProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set(&self, snapshot: PartitionSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.group.clone(), snapshot);
    }
}

#[async_trait]
impl PartitionMetadataProvider for StaticPartitionMetadataProvider {
    async fn snapshot(&self, group: &GroupId) -> Result<PartitionSnapshot, StoreError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(group)
            .cloned()
            .unwrap_or_else(|| PartitionSnapshot::new(group.clone(), [])))
    }
}
