//! Bookkeeping for byte buffers published under revocable URIs.
//!
//! Every buffer handed to [`ResourceManager::create`] gets exactly one owner
//! record. The returned [`ResourceHandle`] releases that record when dropped,
//! so ownership follows the handle into history entries and out again on
//! eviction. Releasing is idempotent: a record already retired by
//! [`ResourceManager::release_all`] or [`ResourceManager::release_expired`]
//! is ignored when its handle is dropped later.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

pub type ResourceId = u64;

const URI_PREFIX: &str = "blob:snapedit/";

/// Where published bytes live while their URI is valid.
pub trait ResourceBackend {
    fn publish(&mut self, id: ResourceId, bytes: Vec<u8>) -> String;
    fn revoke(&mut self, uri: &str);
    fn fetch(&self, _uri: &str) -> Option<Vec<u8>> {
        None
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    buffers: HashMap<String, Vec<u8>>,
}

impl ResourceBackend for InMemoryBackend {
    fn publish(&mut self, id: ResourceId, bytes: Vec<u8>) -> String {
        let uri = format!("{URI_PREFIX}{id}");
        self.buffers.insert(uri.clone(), bytes);
        uri
    }

    fn revoke(&mut self, uri: &str) {
        self.buffers.remove(uri);
    }

    fn fetch(&self, uri: &str) -> Option<Vec<u8>> {
        self.buffers.get(uri).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceStats {
    pub created: u64,
    pub released: u64,
    pub live: usize,
}

#[derive(Debug)]
struct ResourceRecord {
    uri: String,
    byte_len: usize,
    created_at: Instant,
}

struct Registry {
    backend: Box<dyn ResourceBackend>,
    records: BTreeMap<ResourceId, ResourceRecord>,
    next_id: ResourceId,
    created: u64,
    released: u64,
}

impl Registry {
    fn release(&mut self, id: ResourceId) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };
        self.backend.revoke(&record.uri);
        self.released = self.released.saturating_add(1);
        tracing::debug!(id, uri = %record.uri, bytes = record.byte_len, "resource released");
        true
    }
}

/// Shared, single-threaded registry of live resources.
#[derive(Clone)]
pub struct ResourceManager {
    registry: Rc<RefCell<Registry>>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::with_backend(InMemoryBackend::default())
    }

    pub fn with_backend(backend: impl ResourceBackend + 'static) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                backend: Box::new(backend),
                records: BTreeMap::new(),
                next_id: 1,
                created: 0,
                released: 0,
            })),
        }
    }

    pub fn create(&self, bytes: Vec<u8>) -> ResourceHandle {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id = registry.next_id.saturating_add(1);
        let byte_len = bytes.len();
        let uri = registry.backend.publish(id, bytes);
        registry.records.insert(
            id,
            ResourceRecord {
                uri: uri.clone(),
                byte_len,
                created_at: Instant::now(),
            },
        );
        registry.created = registry.created.saturating_add(1);
        tracing::debug!(id, %uri, bytes = byte_len, "resource created");

        ResourceHandle {
            id,
            uri,
            byte_len,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Returns whether a live record was released.
    pub fn release(&self, id: ResourceId) -> bool {
        self.registry.borrow_mut().release(id)
    }

    pub fn release_all(&self) -> usize {
        let mut registry = self.registry.borrow_mut();
        let ids = registry.records.keys().copied().collect::<Vec<_>>();
        let released = ids.into_iter().filter(|id| registry.release(*id)).count();
        if released > 0 {
            tracing::info!(released, "released all resources");
        }
        released
    }

    pub fn release_expired(&self, max_age: Duration) -> usize {
        self.release_expired_at(Instant::now(), max_age)
    }

    pub fn release_expired_at(&self, now: Instant, max_age: Duration) -> usize {
        let mut registry = self.registry.borrow_mut();
        let expired = registry
            .records
            .iter()
            .filter(|(_, record)| now.saturating_duration_since(record.created_at) > max_age)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        expired
            .into_iter()
            .filter(|id| registry.release(*id))
            .count()
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.registry.borrow().records.contains_key(&id)
    }

    pub fn fetch(&self, uri: &str) -> Option<Vec<u8>> {
        let registry = self.registry.borrow();
        if !registry.records.values().any(|record| record.uri == uri) {
            return None;
        }
        registry.backend.fetch(uri)
    }

    pub fn stats(&self) -> ResourceStats {
        let registry = self.registry.borrow();
        ResourceStats {
            created: registry.created,
            released: registry.released,
            live: registry.records.len(),
        }
    }
}

/// Owned reference to a published buffer; released exactly once on drop.
pub struct ResourceHandle {
    id: ResourceId,
    uri: String,
    byte_len: usize,
    registry: Weak<RefCell<Registry>>,
}

impl ResourceHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let borrowed = registry.try_borrow_mut();
        match borrowed {
            Ok(mut registry) => {
                registry.release(self.id);
            }
            Err(_) => {
                tracing::warn!(id = self.id, "resource registry busy; release skipped");
            }
        };
    }
}
