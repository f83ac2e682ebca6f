use crate::PodId;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::time::{Duration, Instant};

/// Remembers pods that have been proven protected.
///
/// Membership means "protected" until the entry expires under the cache's
/// [`Retention`]. Clones share the same underlying set, so a single cache may
/// be handed to every scan pass (and every dialect) in a session.
#[derive(Clone, Debug, Default)]
pub struct ProtectionCache(Arc<Mutex<Inner>>);

/// How long a cached protection stays valid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Retention {
    /// Entries live as long as the cache handle.
    #[default]
    Session,

    /// Entries older than the duration are treated as absent.
    Ttl(Duration),
}

/// The outcome of [`ProtectionCache::check_or_insert_with`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The pod was already cached; nothing was computed.
    Cached,

    /// The pod was not cached, the computation proved it protected, and it
    /// has been inserted.
    Inserted(T),

    /// The pod was not cached and the computation did not prove it protected.
    Absent,
}

#[derive(Debug, Default)]
struct Inner {
    retention: Retention,
    entries: HashMap<PodId, Instant>,
}

// === impl ProtectionCache ===

impl ProtectionCache {
    pub fn new(retention: Retention) -> Self {
        Self(Arc::new(Mutex::new(Inner {
            retention,
            entries: HashMap::default(),
        })))
    }

    pub fn retention(&self) -> Retention {
        self.0.lock().retention
    }

    pub fn contains(&self, id: &PodId) -> bool {
        self.0.lock().contains(id, Instant::now())
    }

    pub fn insert(&self, id: PodId) {
        self.0.lock().entries.insert(id, Instant::now());
    }

    /// Checks whether `id` is cached and, if not, runs `check` and caches the
    /// pod when it yields a value.
    ///
    /// The lookup, the computation and the insert happen under a single lock
    /// acquisition, so concurrent evaluators always observe each other's
    /// results.
    pub fn check_or_insert_with<T>(&self, id: &PodId, check: impl FnOnce() -> Option<T>) -> Lookup<T> {
        let now = Instant::now();
        let mut inner = self.0.lock();
        if inner.contains(id, now) {
            return Lookup::Cached;
        }

        match check() {
            Some(value) => {
                inner.entries.insert(id.clone(), now);
                Lookup::Inserted(value)
            }
            None => Lookup::Absent,
        }
    }

    /// Returns the number of live entries, purging expired ones.
    pub fn len(&self) -> usize {
        let mut inner = self.0.lock();
        inner.purge(Instant::now());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.lock().entries.clear();
    }
}

impl Inner {
    fn contains(&mut self, id: &PodId, now: Instant) -> bool {
        let inserted = match self.entries.get(id) {
            Some(inserted) => *inserted,
            None => return false,
        };

        match self.retention {
            Retention::Session => true,
            Retention::Ttl(ttl) if now.saturating_duration_since(inserted) < ttl => true,
            Retention::Ttl(_) => {
                self.entries.remove(id);
                false
            }
        }
    }

    fn purge(&mut self, now: Instant) {
        if let Retention::Ttl(ttl) = self.retention {
            self.entries
                .retain(|_, inserted| now.saturating_duration_since(*inserted) < ttl);
        }
    }
}
