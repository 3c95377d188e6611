//! The canonical upload entity (§3) and its store contract (C2, §6.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Replaces the wire protocol's `-1` sentinel (§6.2, §9) with an explicit tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use whatever baseline the store itself defines.
    #[default]
    Default,
    /// Never expire.
    None,
    /// Expire after the given number of seconds.
    Seconds(u64),
}

/// The per-upload entity stored in C2, keyed by its 32-hex-digit identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub complete: bool,
    pub length: u64,
    pub defer: bool,
    pub metadata: HashMap<String, String>,
    pub file: String,
}

impl UploadRecord {
    pub fn new_deferred(file: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        Self { complete: false, length: 0, defer: true, metadata, file: file.into() }
    }

    pub fn new_fixed(file: impl Into<String>, length: u64, metadata: HashMap<String, String>) -> Self {
        Self { complete: false, length, defer: false, metadata, file: file.into() }
    }
}

/// A TTL-capable key/value mapping `id -> UploadRecord` (C2). Hosts may implement this
/// against a real store (Redis, a database, object storage metadata); the crate ships
/// [`MemoryMetadataStore`] as a working default.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<UploadRecord>;
    async fn set(&self, id: &str, record: UploadRecord, ttl: Ttl);
    async fn delete(&self, id: &str);
}

struct Entry {
    record: UploadRecord,
    expires_at: Option<Instant>,
}

/// Default in-process [`MetadataStore`], an in-memory map behind a single mutex, grounded
/// on the `Arc<Mutex<HashMap<..>>>` shape `salvo-tus`'s `MemoryLocker` uses for its own
/// per-identifier table. `Ttl::Default` is treated as "never expire" since nothing in this
/// crate gives the in-memory store its own baseline TTL to fall back to.
pub struct MemoryMetadataStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    sweep: std::sync::OnceLock<()>,
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), sweep: std::sync::OnceLock::new() }
    }

    /// Lazily spawns the background sweep task on first use. Purely an implementation
    /// detail of this default store; invisible through the `MetadataStore` trait.
    fn ensure_sweeper(&self) {
        if self.sweep.set(()).is_ok() {
            let entries = Arc::clone(&self.entries);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    let now = Instant::now();
                    let mut guard = entries.lock().await;
                    guard.retain(|_, e| e.expires_at.is_none_or(|exp| exp > now));
                }
            });
        }
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, id: &str) -> Option<UploadRecord> {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        match guard.get(id) {
            Some(entry) if entry.expires_at.is_some_and(|exp| exp <= now) => {
                guard.remove(id);
                None
            }
            Some(entry) => Some(entry.record.clone()),
            None => None,
        }
    }

    async fn set(&self, id: &str, record: UploadRecord, ttl: Ttl) {
        self.ensure_sweeper();
        let expires_at = match ttl {
            Ttl::Default | Ttl::None => None,
            Ttl::Seconds(secs) => Some(Instant::now() + Duration::from_secs(secs)),
        };
        self.entries.lock().await.insert(id.to_string(), Entry { record, expires_at });
    }

    async fn delete(&self, id: &str) {
        self.entries.lock().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> UploadRecord {
        UploadRecord::new_fixed("/tmp/x", 11, HashMap::new())
    }

    #[tokio::test]
    async fn get_set_delete_roundtrip() {
        let store = MemoryMetadataStore::new();
        assert!(store.get("a").await.is_none());
        store.set("a", rec(), Ttl::Default).await;
        assert_eq!(store.get("a").await.unwrap().length, 11);
        store.delete("a").await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn seconds_ttl_expires() {
        let store = MemoryMetadataStore::new();
        store.set("a", rec(), Ttl::Seconds(0)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn default_ttl_never_expires_without_sweep() {
        let store = MemoryMetadataStore::new();
        store.set("a", rec(), Ttl::Default).await;
        assert!(store.get("a").await.is_some());
    }
}
