//! Per-destination write serialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per path, so two writers targeting the same
/// destination run one after the other while unrelated paths proceed in
/// parallel. Entries are dropped again once nobody holds or awaits them.
#[derive(Default)]
pub(crate) struct PathLocks {
    inner: SyncMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

pub(crate) struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub(crate) async fn lock(&self, path: &Path) -> PathGuard<'_> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(path.to_path_buf()).or_default().clone()
        };
        PathGuard {
            locks: self,
            path: path.to_path_buf(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&self.path).is_some_and(|mutex| Arc::strong_count(mutex) == 1) {
            map.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entries_are_released() {
        let locks = PathLocks::default();
        {
            let _a = locks.lock(Path::new("/x/a")).await;
            let _b = locks.lock(Path::new("/x/b")).await;
            assert_eq!(locks.len(), 2);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn same_path_is_serialized() {
        let locks = Arc::new(PathLocks::default());
        let order = Arc::new(SyncMutex::new(Vec::new()));

        let first = locks.lock(Path::new("/x/same")).await;
        let waiter = {
            let (locks, order) = (locks.clone(), order.clone());
            tokio::spawn(async move {
                let _guard = locks.lock(Path::new("/x/same")).await;
                order.lock().unwrap().push("second");
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        order.lock().unwrap().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(locks.len(), 0);
    }
}
