use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Listings with a mutation in flight. Busy is tracked per listing, so
/// work on one listing never blocks another.
#[derive(Clone, Default)]
pub struct BusyListings {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl BusyListings {
    pub fn try_acquire(&self, id: Uuid) -> Option<BusyGuard> {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if set.insert(id) {
            Some(BusyGuard {
                id,
                inner: self.inner.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_busy(&self, id: Uuid) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }
}

pub struct BusyGuard {
    id: Uuid,
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_per_listing() {
        let busy = BusyListings::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let guard = busy.try_acquire(a).expect("first acquire");
        assert!(busy.try_acquire(a).is_none());
        assert!(busy.try_acquire(b).is_some());
        assert!(busy.is_busy(a));

        drop(guard);
        assert!(!busy.is_busy(a));
        assert!(busy.try_acquire(a).is_some());
    }
}
