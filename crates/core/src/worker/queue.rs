//! Shared work queue and per-folder leases.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::types::PoolError;

/// Multi-producer, multi-consumer queue of job ids.
///
/// Submissions push; each worker slot pops exactly one id at a time.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    pending: Arc<AtomicUsize>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, job_id: impl Into<String>) -> Result<(), PoolError> {
        // Counted before sending so a concurrent pop never sees it below zero.
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job_id.into()).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::QueueClosed);
        }
        Ok(())
    }

    /// Wait for the next id. Cancel-safe: an id is never lost if the
    /// future is dropped.
    pub async fn pop(&self) -> Option<String> {
        let mut rx = self.rx.lock().await;
        let id = rx.recv().await?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(id)
    }

    /// Ids pushed but not yet popped.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Reader/writer leases on destination folders.
///
/// Workers hold a shared lease on their job's folder; operations that
/// rewrite a folder wholesale (playlist copy) take the exclusive lease.
#[derive(Clone, Default)]
pub struct FolderLocks {
    locks: Arc<std::sync::Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, folder: &Path) -> Arc<RwLock<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Entries nobody holds or waits on.
        locks.retain(|path, lock| path == folder || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(folder.to_path_buf()).or_default())
    }

    /// Folders currently tracked.
    pub fn tracked(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub async fn shared(&self, folder: &Path) -> OwnedRwLockReadGuard<()> {
        self.lock_for(folder).read_owned().await
    }

    pub async fn exclusive(&self, folder: &Path) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(folder).write_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new();
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        assert_eq!(queue.pending(), 2);

        assert_eq!(queue.pop().await.as_deref(), Some("a"));
        assert_eq!(queue.pop().await.as_deref(), Some("b"));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_each_id_popped_once() {
        let queue = JobQueue::new();
        for i in 0..20 {
            queue.push(format!("job-{}", i)).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Ok(Some(id)) =
                    tokio::time::timeout(Duration::from_millis(50), q.pop()).await
                {
                    got.push(id);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for h in handles {
            all.extend(h.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 20);
    }

    #[tokio::test]
    async fn test_exclusive_waits_for_shared() {
        let locks = FolderLocks::new();
        let folder = Path::new("/music/Playlists/Mix");

        let shared = locks.shared(folder).await;
        let pending =
            tokio::time::timeout(Duration::from_millis(30), locks.exclusive(folder)).await;
        assert!(pending.is_err());

        drop(shared);
        let exclusive =
            tokio::time::timeout(Duration::from_millis(30), locks.exclusive(folder)).await;
        assert!(exclusive.is_ok());
    }

    #[tokio::test]
    async fn test_shared_leases_coexist() {
        let locks = FolderLocks::new();
        let folder = Path::new("/music/A/B");
        let _a = locks.shared(folder).await;
        let b = tokio::time::timeout(Duration::from_millis(30), locks.shared(folder)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_folders_are_pruned() {
        let locks = FolderLocks::new();
        let held = locks.shared(Path::new("/music/Held")).await;
        for n in 0..10 {
            let _lease = locks.shared(Path::new(&format!("/music/Album {}", n))).await;
        }
        let _last = locks.shared(Path::new("/music/Last")).await;

        // The held folder and the current one survive.
        assert_eq!(locks.tracked(), 2);
        drop(held);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pending_never_wraps_under_concurrent_pops() {
        let queue = JobQueue::new();
        let total = 2_000;

        let consumer = {
            let q = queue.clone();
            tokio::spawn(async move {
                let mut max_seen = 0;
                for _ in 0..total {
                    q.pop().await;
                    max_seen = max_seen.max(q.pending());
                }
                max_seen
            })
        };

        for i in 0..total {
            queue.push(format!("job-{}", i)).unwrap();
            assert!(queue.pending() <= total);
        }

        let max_seen = consumer.await.unwrap();
        assert!(max_seen <= total);
        assert_eq!(queue.pending(), 0);
    }
}
