//! Leader-side collaborators: the instance roster, the stream registry, and
//! the partition metadata provider. Bundled into [`ClusterEnv`] the way the
//! teacher bundles its per-subsystem managers into one environment handle
//! that's cheap to clone and pass around.

pub mod instance_roster;
pub mod partition_metadata;
pub mod stream_registry;

use std::sync::Arc;

pub use instance_roster::InstanceRoster;
pub use partition_metadata::PartitionMetadataProvider;
pub use stream_registry::StreamRegistry;

use crate::store::CoordinationStore;

/// Constructor-injected bundle of the collaborators a rebalance cycle reads
/// from. Explicit and clonable rather than global/static, per the ambient
/// "no global mutable state" convention.
#[derive(Clone)]
pub struct ClusterEnv {
    pub roster: Arc<InstanceRoster>,
    pub registry: Arc<StreamRegistry>,
    pub partitions: Arc<dyn PartitionMetadataProvider>,
}

impl ClusterEnv {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        cluster: impl Into<String>,
        partitions: Arc<dyn PartitionMetadataProvider>,
    ) -> Self {
        let cluster = cluster.into();
        Self {
            roster: Arc::new(InstanceRoster::new(store.clone(), cluster.clone())),
            registry: Arc::new(StreamRegistry::new(store, cluster)),
            partitions,
        }
    }
}
