use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CoordinationStore, SessionId};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Node {
    value: String,
    /// `Some(session)` if this node is ephemeral and owned by that session.
    ephemeral_owner: Option<SessionId>,
}

#[derive(Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    next_sequence: BTreeMap<String, u64>,
}

/// An in-process, `RwLock`-guarded coordination store.
///
/// Good enough to exercise ephemeral-node and leader-election code paths in
/// tests; not a substitute for a real distributed store, which is why it
/// lives under `store::memory` rather than `store` directly.
pub struct InMemoryStore {
    tree: RwLock<Tree>,
    sessions: RwLock<BTreeSet<SessionId>>,
    session_seq: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::default()),
            sessions: RwLock::new(BTreeSet::new()),
            session_seq: AtomicU64::new(1),
        }
    }

    fn normalize(path: &str) -> String {
        path.trim_end_matches('/').to_string()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    async fn open_session(&self) -> Result<SessionId, StoreError> {
        let id = self.session_seq.fetch_add(1, Ordering::SeqCst);
        self.sessions.write().await.insert(id);
        Ok(id)
    }

    async fn close_session(&self, session: SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&session);
        let mut tree = self.tree.write().await;
        tree.nodes
            .retain(|_, node| node.ephemeral_owner != Some(session));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        let path = Self::normalize(path);
        Ok(self.tree.read().await.nodes.get(&path).map(|n| n.value.clone()))
    }

    async fn put(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let path = Self::normalize(path);
        self.tree.write().await.nodes.insert(
            path,
            Node {
                value: value.to_string(),
                ephemeral_owner: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let path = Self::normalize(path);
        self.tree.write().await.nodes.remove(&path);
        Ok(())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let path = Self::normalize(path);
        let prefix = format!("{path}/");
        let tree = self.tree.read().await;
        let mut names: BTreeSet<String> = BTreeSet::new();
        for key in tree.nodes.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let child = rest.split('/').next().unwrap_or(rest);
                names.insert(child.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn create_ephemeral(
        &self,
        session: SessionId,
        path: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let path = Self::normalize(path);
        let mut tree = self.tree.write().await;
        if tree.nodes.contains_key(&path) {
            return Err(StoreError::AlreadyExists(path));
        }
        tree.nodes.insert(
            path,
            Node {
                value: value.to_string(),
                ephemeral_owner: Some(session),
            },
        );
        Ok(())
    }

    async fn create_ephemeral_sequential(
        &self,
        session: SessionId,
        path_prefix: &str,
        value: &str,
    ) -> Result<String, StoreError> {
        let path_prefix = Self::normalize(path_prefix);
        let mut tree = self.tree.write().await;
        let seq = tree.next_sequence.entry(path_prefix.clone()).or_insert(0);
        let assigned = *seq;
        *seq += 1;
        let full_path = format!("{path_prefix}/{assigned:010}");
        tree.nodes.insert(
            full_path.clone(),
            Node {
                value: value.to_string(),
                ephemeral_owner: Some(session),
            },
        );
        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_node_disappears_when_session_closes() {
        let store = InMemoryStore::new();
        let session = store.open_session().await.unwrap();
        store
            .create_ephemeral(session, "/cluster/instances/i1", "host1")
            .await
            .unwrap();
        assert_eq!(
            store.get("/cluster/instances/i1").await.unwrap(),
            Some("host1".to_string())
        );
        store.close_session(session).await.unwrap();
        assert_eq!(store.get("/cluster/instances/i1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ephemeral_sequential_smallest_sequence_wins_election() {
        let store = InMemoryStore::new();
        let s1 = store.open_session().await.unwrap();
        let s2 = store.open_session().await.unwrap();
        let p1 = store
            .create_ephemeral_sequential(s1, "/cluster/liveinstances", "instance1")
            .await
            .unwrap();
        let p2 = store
            .create_ephemeral_sequential(s2, "/cluster/liveinstances", "instance2")
            .await
            .unwrap();
        let mut children = store.children("/cluster/liveinstances").await.unwrap();
        children.sort();
        assert_eq!(children.len(), 2);
        assert!(p1 < p2, "first registrant should get the smaller sequence");
    }

    #[tokio::test]
    async fn children_lists_only_direct_descendants() {
        let store = InMemoryStore::new();
        store.put("/cluster/dms/a", "{}").await.unwrap();
        store.put("/cluster/dms/b", "{}").await.unwrap();
        store
            .put("/cluster/dms/a/nested", "ignored-at-this-level")
            .await
            .unwrap();
        let mut children = store.children("/cluster/dms").await.unwrap();
        children.sort();
        assert_eq!(children, vec!["a".to_string(), "b".to_string()]);
    }
}
