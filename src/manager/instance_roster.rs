use std::sync::Arc;

use crate::error::StoreError;
use crate::store::CoordinationStore;

/// The set of currently live worker instances, refreshed from the ephemeral
/// `/{cluster}/instances/{instanceName}` nodes each call. There is
/// deliberately no caching here: every rebalance cycle re-reads liveness as
/// part of taking its consistent snapshot (see the concurrency section of
/// SPEC_FULL.md).
pub struct InstanceRoster {
    store: Arc<dyn CoordinationStore>,
    cluster: String,
}

impl InstanceRoster {
    pub fn new(store: Arc<dyn CoordinationStore>, cluster: impl Into<String>) -> Self {
        Self {
            store,
            cluster: cluster.into(),
        }
    }

    fn instances_path(&self) -> String {
        format!("/{}/instances", self.cluster)
    }

    /// Live instance names, sorted for deterministic downstream iteration.
    pub async fn live_instances(&self) -> Result<Vec<String>, StoreError> {
        let mut names = self.store.children(&self.instances_path()).await?;
        names.sort();
        Ok(names)
    }

    pub async fn is_live(&self, instance: &str) -> Result<bool, StoreError> {
        Ok(self.live_instances().await?.iter().any(|n| n == instance))
    }

    pub async fn register(
        &self,
        session: crate::store::SessionId,
        instance: &str,
        host: &str,
    ) -> Result<(), StoreError> {
        self.store
            .create_ephemeral(session, &format!("{}/{}", self.instances_path(), instance), host)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn roster_reflects_registered_and_deregistered_instances() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        let roster = InstanceRoster::new(store.clone(), "cluster1");
        let session = store.open_session().await.unwrap();
        roster.register(session, "instance1", "host1").await.unwrap();
        roster.register(session, "instance2", "host2").await.unwrap();

        let mut live = roster.live_instances().await.unwrap();
        live.sort();
        assert_eq!(live, vec!["instance1".to_string(), "instance2".to_string()]);
        assert!(roster.is_live("instance1").await.unwrap());

        store.close_session(session).await.unwrap();
        assert!(roster.live_instances().await.unwrap().is_empty());
    }
}
