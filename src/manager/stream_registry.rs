use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{Datastream, DatastreamGroup};
use crate::store::CoordinationStore;

/// Holds the current set of datastream definitions and groups them by task
/// prefix, reading `/{cluster}/dms/{datastreamName}` on every call — the
/// registry is a thin, stateless read-through view, not a cache, matching
/// the consistent-snapshot contract of the rebalance orchestrator.
pub struct StreamRegistry {
    store: Arc<dyn CoordinationStore>,
    cluster: String,
}

impl StreamRegistry {
    pub fn new(store: Arc<dyn CoordinationStore>, cluster: impl Into<String>) -> Self {
        Self {
            store,
            cluster: cluster.into(),
        }
    }

    fn dms_path(&self) -> String {
        format!("/{}/dms", self.cluster)
    }

    pub async fn create(&self, datastream: &Datastream) -> Result<(), StoreError> {
        let path = format!("{}/{}", self.dms_path(), datastream.name);
        let json = serde_json::to_string(datastream)
            .map_err(|e| StoreError::Fatal(format!("datastream serialisation failed: {e}")))?;
        self.store.put(&path, &json).await?;
        self.touch().await
    }

    pub async fn get(&self, name: &str) -> Result<Option<Datastream>, StoreError> {
        let path = format!("{}/{}", self.dms_path(), name);
        match self.store.get(&path).await? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Fatal(format!("datastream corrupt: {e}"))),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = format!("{}/{}", self.dms_path(), name);
        self.store.delete(&path).await?;
        self.touch().await
    }

    pub async fn list_all(&self) -> Result<Vec<Datastream>, StoreError> {
        let names = self.store.children(&self.dms_path()).await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(ds) = self.get(&name).await? {
                out.push(ds);
            }
        }
        Ok(out)
    }

    /// Groups all registered datastreams by task prefix. A datastream's task
    /// prefix is its own name unless overridden via the `taskPrefix` metadata
    /// key, matching how connectors that fan a single logical stream out
    /// across multiple datastream records share a group.
    pub async fn list_groups(&self) -> Result<Vec<DatastreamGroup>, StoreError> {
        let all = self.list_all().await?;
        let mut by_prefix: std::collections::BTreeMap<String, Vec<Datastream>> =
            std::collections::BTreeMap::new();
        for ds in all {
            let prefix = ds
                .metadata
                .get("taskPrefix")
                .cloned()
                .unwrap_or_else(|| ds.name.clone());
            by_prefix.entry(prefix).or_default().push(ds);
        }
        Ok(by_prefix
            .into_iter()
            .filter_map(|(prefix, streams)| DatastreamGroup::new(prefix, streams))
            .collect())
    }

    /// A timestamp write to `/{cluster}/dms` serves as the change-notification
    /// tick for watchers; this is the only write the core makes to the
    /// notification node itself.
    async fn touch(&self) -> Result<(), StoreError> {
        let now = current_tick();
        self.store.put(&self.dms_path(), &now.to_string()).await
    }
}

/// A monotonic tick used only to mark the dms node as changed; this is not a
/// wall-clock timestamp contract, just a distinct value each call.
fn current_tick() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static TICK: AtomicU64 = AtomicU64::new(1);
    TICK.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DatastreamStatus;
    use crate::store::memory::InMemoryStore;

    fn make(name: &str) -> Datastream {
        let mut ds = Datastream::new(name, "kafka");
        ds.status = DatastreamStatus::Ready;
        ds
    }

    #[tokio::test]
    async fn create_get_delete_round_trip() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let registry = StreamRegistry::new(store, "cluster1");
        registry.create(&make("ds1")).await.unwrap();
        assert!(registry.get("ds1").await.unwrap().is_some());
        registry.delete("ds1").await.unwrap();
        assert!(registry.get("ds1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn groups_by_task_prefix_metadata() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let registry = StreamRegistry::new(store, "cluster1");
        let mut a = make("ds-a");
        a.metadata.insert("taskPrefix".to_string(), "shared".to_string());
        let mut b = make("ds-b");
        b.metadata.insert("taskPrefix".to_string(), "shared".to_string());
        let c = make("ds-c");
        registry.create(&a).await.unwrap();
        registry.create(&b).await.unwrap();
        registry.create(&c).await.unwrap();

        let groups = registry.list_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        let shared = groups.iter().find(|g| g.task_prefix() == "shared").unwrap();
        assert_eq!(shared.datastreams().len(), 2);
    }
}
