//! The coordination-store client seam.
//!
//! [`CoordinationStore`] is the trait a real ZooKeeper-backed client would
//! implement (that client is an external collaborator, out of scope here).
//! [`memory::InMemoryStore`] is the in-process backend used by every test in
//! this crate and by the demo binary.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

/// A session handle. Ephemeral nodes created through a given handle are
/// removed when the handle is dropped (or [`CoordinationStore::close_session`]
/// is called), modeling ZooKeeper ephemeral-node semantics closely enough to
/// exercise leader-election and instance-liveness code paths in tests.
pub type SessionId = u64;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn open_session(&self) -> Result<SessionId, StoreError>;
    async fn close_session(&self, session: SessionId) -> Result<(), StoreError>;

    async fn get(&self, path: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, path: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Creates an ephemeral node tied to `session`; it disappears from
    /// [`Self::children`]/[`Self::get`] once that session closes.
    async fn create_ephemeral(
        &self,
        session: SessionId,
        path: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Creates an ephemeral sequential node under `path_prefix`, returning the
    /// full path including the assigned monotonic sequence suffix. Used for
    /// leader election: the live-instance node with the smallest sequence
    /// number is the leader.
    async fn create_ephemeral_sequential(
        &self,
        session: SessionId,
        path_prefix: &str,
        value: &str,
    ) -> Result<String, StoreError>;
}
