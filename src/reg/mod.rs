//! Coordination-service contract.
//!
//! Everything the rest of the crate knows about the registry goes through
//! [`CoordinatorRegistry`]: typed reads and writes of string-valued nodes,
//! an atomic ephemeral create-if-absent, the service clock, and a broadcast
//! stream of [`DataEvent`]s describing every node change.
//!
//! # Implementations
//!
//! - [`memory::InMemoryRegistry`]: a shared in-process tree with sessions,
//!   ephemeral ownership and per-session read caches. Each call to
//!   [`InMemoryRegistry::connect`](memory::InMemoryRegistry::connect) yields a
//!   [`RegistrySession`](memory::RegistrySession) that behaves like one client
//!   connection.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;

pub use memory::{InMemoryRegistry, RegistrySession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// A single node change. `data` is the node value after the change, or the
/// last value it held when `kind` is `Removed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEvent {
    pub path: String,
    pub kind: ChangeKind,
    pub data: String,
}

impl DataEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind, data: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            data: data.into(),
        }
    }
}

#[async_trait]
pub trait CoordinatorRegistry: Send + Sync {
    /// Read through the local cache; falls back to a direct read when the key
    /// is outside every cached subtree.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read from the service, bypassing any cache.
    async fn get_directly(&self, key: &str) -> Result<Option<String>>;

    async fn is_existed(&self, key: &str) -> Result<bool>;

    /// Names of the direct children of `key`, in ascending order.
    async fn get_children_keys(&self, key: &str) -> Result<Vec<String>>;

    /// Set-or-create a persistent node, creating missing parents.
    async fn persist(&self, key: &str, value: &str) -> Result<()>;

    /// Set-or-create an ephemeral node owned by this session.
    async fn persist_ephemeral(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically create an ephemeral node owned by this session.
    /// Returns `false` when the node already exists.
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Delete a node and its subtree. Deleting a missing node is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Current time of the service clock, in epoch milliseconds.
    async fn registry_time(&self) -> Result<i64>;

    /// Start keeping the subtree under `root` in the session cache.
    async fn add_cache_data(&self, root: &str) -> Result<()>;

    /// Stop caching `root`; cached reads fall back to direct reads.
    async fn evict_cache_data(&self, root: &str);

    /// Subscribe to change events for every node in the service.
    fn watch(&self) -> broadcast::Receiver<DataEvent>;
}
