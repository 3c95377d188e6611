//! Per-identifier concurrency control for the handler (§4.1.6, §5, §9).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Held for the lifetime of a critical section; dropping it releases the lock.
pub enum LockGuard {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

impl LockGuard {
    fn read(guard: OwnedRwLockReadGuard<()>) -> Self {
        LockGuard::Read(guard)
    }

    fn write(guard: OwnedRwLockWriteGuard<()>) -> Self {
        LockGuard::Write(guard)
    }
}

/// Acquires per-identifier locks spanning a handler's critical section. The post-write
/// filesize check in the append engine remains the authoritative correctness guard (§9);
/// a `Locker` that granted every lock immediately would still be safe, only more contended.
#[async_trait::async_trait]
pub trait Locker: Send + Sync {
    /// Exclusive lock, used by PATCH across record read -> offset check -> write -> completion.
    async fn write_lock(&self, id: &str) -> LockGuard;

    /// Shared lock, used by HEAD/GET.
    async fn read_lock(&self, id: &str) -> LockGuard;
}

/// Default [`Locker`], a per-identifier `RwLock` table behind a single mutex, grounded on
/// `salvo-tus`'s `MemoryLocker`.
#[derive(Clone, Default)]
pub struct MemoryLocker {
    inner: Arc<Mutex<HashMap<String, Arc<RwLock<()>>>>>,
}

impl MemoryLocker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_lock(&self, id: &str) -> Arc<RwLock<()>> {
        let mut map = self.inner.lock().await;
        map.entry(id.to_string()).or_insert_with(|| Arc::new(RwLock::new(()))).clone()
    }
}

#[async_trait::async_trait]
impl Locker for MemoryLocker {
    async fn write_lock(&self, id: &str) -> LockGuard {
        let lock = self.get_lock(id).await;
        LockGuard::write(lock.write_owned().await)
    }

    async fn read_lock(&self, id: &str) -> LockGuard {
        let lock = self.get_lock(id).await;
        LockGuard::read(lock.read_owned().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_locks_on_distinct_ids_do_not_block() {
        let locker = MemoryLocker::new();
        let _a = locker.write_lock("a").await;
        let _b = locker.write_lock("b").await;
    }

    #[tokio::test]
    async fn read_locks_on_same_id_can_coexist() {
        let locker = MemoryLocker::new();
        let _r1 = locker.read_lock("a").await;
        let _r2 = locker.read_lock("a").await;
    }

    #[tokio::test]
    async fn write_lock_is_exclusive() {
        let locker = Arc::new(MemoryLocker::new());
        let guard = locker.write_lock("a").await;

        let locker2 = locker.clone();
        let handle = tokio::spawn(async move {
            let _g = locker2.write_lock("a").await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(guard);
        handle.await.unwrap();
    }
}
