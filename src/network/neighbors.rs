use log::info;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The set of `host:port` peers this node gossips with.
///
/// Guarded by its own lock so discovery never waits on mining or admission.
/// Callers iterate over a copy; nothing holds the lock across network I/O.
pub struct Neighbors {
    inner: RwLock<Vec<String>>,
}

impl Default for Neighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl Neighbors {
    pub fn new() -> Neighbors {
        Neighbors {
            inner: RwLock::new(vec![]),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a freshly discovered set, dropping duplicates but keeping
    /// discovery order. Returns true when the set changed.
    pub fn replace(&self, addrs: Vec<String>) -> bool {
        let mut fresh: Vec<String> = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if !fresh.contains(&addr) {
                fresh.push(addr);
            }
        }
        let mut inner = self.write();
        if *inner == fresh {
            return false;
        }
        info!("Neighbors updated: {fresh:?}");
        *inner = fresh;
        true
    }

    pub fn add(&self, addr: impl Into<String>) {
        let addr = addr.into();
        let mut inner = self.write();
        if !inner.iter().any(|x| x == &addr) {
            inner.push(addr);
        }
    }

    pub fn get_addrs(&self) -> Vec<String> {
        self.read().to_vec()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_known(&self, addr: &str) -> bool {
        self.read().iter().any(|x| x == addr)
    }
}
