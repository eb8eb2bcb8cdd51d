use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

use crate::error::{LiteError, Result};
use crate::reg::{ChangeKind, CoordinatorRegistry, DataEvent};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// In-process coordination service shared by any number of sessions.
///
/// Cloning is cheap; all clones see the same tree.
#[derive(Clone)]
pub struct InMemoryRegistry {
    inner: Arc<Shared>,
}

struct Shared {
    tree: Mutex<Tree>,
    events: broadcast::Sender<DataEvent>,
    next_session: AtomicU64,
    clock_offset_ms: AtomicI64,
}

#[derive(Debug)]
struct ZNode {
    data: String,
    /// Owning session for ephemeral nodes.
    owner: Option<u64>,
}

#[derive(Debug, Default)]
struct SessionCache {
    roots: Vec<String>,
    data: HashMap<String, String>,
}

impl SessionCache {
    fn covers(&self, path: &str) -> bool {
        self.roots.iter().any(|root| is_under(root, path))
    }
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, ZNode>,
    sessions: HashMap<u64, SessionCache>,
}

impl Tree {
    fn upsert(&mut self, path: &str, value: &str, owner: Option<u64>) -> Vec<DataEvent> {
        let mut events = self.ensure_parents(path);
        match self.nodes.get_mut(path) {
            Some(node) => {
                node.data = value.to_string();
                events.push(DataEvent::new(path, ChangeKind::Updated, value));
            }
            None => {
                self.nodes.insert(
                    path.to_string(),
                    ZNode {
                        data: value.to_string(),
                        owner,
                    },
                );
                events.push(DataEvent::new(path, ChangeKind::Created, value));
            }
        }
        events
    }

    fn create(&mut self, path: &str, value: &str, owner: Option<u64>) -> Option<Vec<DataEvent>> {
        if self.nodes.contains_key(path) {
            return None;
        }
        Some(self.upsert(path, value, owner))
    }

    fn ensure_parents(&mut self, path: &str) -> Vec<DataEvent> {
        let mut events = Vec::new();
        for parent in ancestors(path) {
            if !self.nodes.contains_key(parent) {
                self.nodes.insert(
                    parent.to_string(),
                    ZNode {
                        data: String::new(),
                        owner: None,
                    },
                );
                events.push(DataEvent::new(parent, ChangeKind::Created, ""));
            }
        }
        events
    }

    fn remove_subtree(&mut self, path: &str) -> Vec<DataEvent> {
        let doomed: Vec<String> = self
            .nodes
            .keys()
            .filter(|key| is_under(path, key))
            .cloned()
            .collect();
        // Deepest first, so children are reported before their parent.
        doomed
            .into_iter()
            .rev()
            .filter_map(|key| {
                self.nodes
                    .remove(&key)
                    .map(|node| DataEvent::new(key, ChangeKind::Removed, node.data))
            })
            .collect()
    }

    fn expire(&mut self, session: u64) -> Vec<DataEvent> {
        self.sessions.remove(&session);
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session))
            .map(|(key, _)| key.clone())
            .collect();
        owned
            .iter()
            .flat_map(|key| self.remove_subtree(key))
            .collect()
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| &key[prefix.len()..])
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    fn apply_to_caches(&mut self, events: &[DataEvent]) {
        for cache in self.sessions.values_mut() {
            for event in events {
                if !cache.covers(&event.path) {
                    continue;
                }
                match event.kind {
                    ChangeKind::Created | ChangeKind::Updated => {
                        cache.data.insert(event.path.clone(), event.data.clone());
                    }
                    ChangeKind::Removed => {
                        cache.data.remove(&event.path);
                    }
                }
            }
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                tree: Mutex::new(Tree::default()),
                events,
                next_session: AtomicU64::new(1),
                clock_offset_ms: AtomicI64::new(0),
            }),
        }
    }

    /// Open a new client session.
    pub async fn connect(&self) -> RegistrySession {
        let id = self.inner.next_session.fetch_add(1, Ordering::SeqCst);
        self.inner
            .tree
            .lock()
            .await
            .sessions
            .insert(id, SessionCache::default());
        tracing::debug!(session_id = id, "Registry session opened");
        RegistrySession {
            id,
            registry: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Drop every ephemeral node owned by `session`, as the service does when
    /// a client stops heart-beating.
    pub async fn expire_session(&self, session: u64) {
        let events = {
            let mut tree = self.inner.tree.lock().await;
            let events = tree.expire(session);
            tree.apply_to_caches(&events);
            events
        };
        tracing::debug!(session_id = session, removed = events.len(), "Registry session expired");
        self.publish(events);
    }

    /// Shift the service clock relative to the local clock.
    pub fn set_clock_offset_ms(&self, offset_ms: i64) {
        self.inner.clock_offset_ms.store(offset_ms, Ordering::SeqCst);
    }

    fn publish(&self, events: Vec<DataEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.inner.events.send(event);
        }
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Tree) -> (T, Vec<DataEvent>)) -> T {
        let (result, events) = {
            let mut tree = self.inner.tree.lock().await;
            let (result, events) = f(&mut tree);
            tree.apply_to_caches(&events);
            (result, events)
        };
        self.publish(events);
        result
    }
}

/// One client connection to an [`InMemoryRegistry`].
///
/// Ephemeral nodes created through a session vanish when it is closed or
/// expired; every call on a closed session fails with [`LiteError::Registry`].
pub struct RegistrySession {
    id: u64,
    registry: InMemoryRegistry,
    closed: AtomicBool,
}

impl RegistrySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> &InMemoryRegistry {
        &self.registry
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the session; its ephemeral nodes are removed.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.registry.expire_session(self.id).await;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LiteError::Registry(format!("session {} is closed", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinatorRegistry for RegistrySession {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        validate_path(key)?;
        let tree = self.registry.inner.tree.lock().await;
        if let Some(cache) = tree.sessions.get(&self.id) {
            if cache.covers(key) {
                return Ok(cache.data.get(key).cloned());
            }
        }
        Ok(tree.nodes.get(key).map(|node| node.data.clone()))
    }

    async fn get_directly(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        validate_path(key)?;
        let tree = self.registry.inner.tree.lock().await;
        Ok(tree.nodes.get(key).map(|node| node.data.clone()))
    }

    async fn is_existed(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        validate_path(key)?;
        Ok(self.registry.inner.tree.lock().await.nodes.contains_key(key))
    }

    async fn get_children_keys(&self, key: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        validate_path(key)?;
        Ok(self.registry.inner.tree.lock().await.children(key))
    }

    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        validate_path(key)?;
        self.registry
            .mutate(|tree| ((), tree.upsert(key, value, None)))
            .await;
        Ok(())
    }

    async fn persist_ephemeral(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        validate_path(key)?;
        let owner = Some(self.id);
        self.registry
            .mutate(|tree| ((), tree.upsert(key, value, owner)))
            .await;
        Ok(())
    }

    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.ensure_open()?;
        validate_path(key)?;
        let owner = Some(self.id);
        let created = self
            .registry
            .mutate(|tree| match tree.create(key, value, owner) {
                Some(events) => (true, events),
                None => (false, Vec::new()),
            })
            .await;
        Ok(created)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        validate_path(key)?;
        self.registry
            .mutate(|tree| ((), tree.remove_subtree(key)))
            .await;
        Ok(())
    }

    async fn registry_time(&self) -> Result<i64> {
        self.ensure_open()?;
        let offset = self.registry.inner.clock_offset_ms.load(Ordering::SeqCst);
        Ok(Utc::now().timestamp_millis() + offset)
    }

    async fn add_cache_data(&self, root: &str) -> Result<()> {
        self.ensure_open()?;
        validate_path(root)?;
        let mut guard = self.registry.inner.tree.lock().await;
        let tree = &mut *guard;
        let Some(cache) = tree.sessions.get_mut(&self.id) else {
            return Err(LiteError::Registry(format!("session {} is closed", self.id)));
        };
        if !cache.roots.iter().any(|r| r == root) {
            cache.roots.push(root.to_string());
        }
        for (key, node) in tree.nodes.iter().filter(|(key, _)| is_under(root, key)) {
            cache.data.insert(key.clone(), node.data.clone());
        }
        Ok(())
    }

    async fn evict_cache_data(&self, root: &str) {
        let mut tree = self.registry.inner.tree.lock().await;
        if let Some(cache) = tree.sessions.get_mut(&self.id) {
            cache.roots.retain(|r| r != root);
            let still_cached: Vec<String> = cache.roots.clone();
            cache
                .data
                .retain(|key, _| still_cached.iter().any(|r| is_under(r, key)));
        }
    }

    fn watch(&self) -> broadcast::Receiver<DataEvent> {
        self.registry.inner.events.subscribe()
    }
}

fn validate_path(path: &str) -> Result<()> {
    let valid = path.starts_with('/')
        && (path == "/" || (!path.ends_with('/') && !path.contains("//")));
    if valid {
        Ok(())
    } else {
        Err(LiteError::Registry(format!("invalid node path '{}'", path)))
    }
}

/// True if `path` is `root` itself or lies below it.
fn is_under(root: &str, path: &str) -> bool {
    root == "/" || path == root || path.starts_with(&child_prefix(root))
}

fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{}/", path)
    }
}

/// Proper ancestors of `path`, outermost first, excluding the root.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .map(move |idx| &path[..idx])
}
