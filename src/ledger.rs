//! Persistent-id ledger used for redelivery suppression.
//!
//! The ledger records the persistent ids of data messages already handed to
//! the consumer (or deliberately dropped). Its contents are reported to the
//! server in every login request and cleared once the server acknowledges the
//! login, after which the server is responsible for not resending them.
//!
//! Growth between logins is bounded by an optional capacity. When the ledger
//! is full the oldest id is evicted first.

use std::{
    collections::{HashSet, VecDeque},
    num::NonZeroUsize,
};

/// Ordered, duplicate-free set of persistent ids.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use pushframe::ledger::PersistentIdLedger;
///
/// let mut ledger = PersistentIdLedger::new(NonZeroUsize::new(2));
/// assert!(ledger.mark_seen("a"));
/// assert!(!ledger.mark_seen("a"));
/// ledger.mark_seen("b");
/// ledger.mark_seen("c");
/// assert!(!ledger.has_seen("a"));
/// assert_eq!(ledger.to_vec(), ["b", "c"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PersistentIdLedger {
    order: VecDeque<String>,
    index: HashSet<String>,
    capacity: Option<NonZeroUsize>,
}

impl PersistentIdLedger {
    /// Create an empty ledger. `None` disables the capacity bound.
    #[must_use]
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            order: VecDeque::new(),
            index: HashSet::new(),
            capacity,
        }
    }

    /// Create a ledger pre-seeded with ids loaded by the caller.
    ///
    /// Duplicates in `ids` are ignored; if more ids are supplied than the
    /// capacity allows only the newest are kept.
    #[must_use]
    pub fn with_ids<I, S>(capacity: Option<NonZeroUsize>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ledger = Self::new(capacity);
        for id in ids {
            ledger.mark_seen(id);
        }
        ledger
    }

    /// Whether `id` has been recorded since the last [`clear`](Self::clear).
    #[must_use]
    pub fn has_seen(&self, id: &str) -> bool { self.index.contains(id) }

    /// Record `id`. Returns `false` if it was already present.
    pub fn mark_seen(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains(&id) {
            return false;
        }
        if let Some(capacity) = self.capacity {
            while self.order.len() >= capacity.get() {
                let Some(evicted) = self.order.pop_front() else {
                    break;
                };
                log::debug!("persistent id ledger full, evicting {evicted}");
                self.index.remove(&evicted);
            }
        }
        self.index.insert(id.clone());
        self.order.push_back(id);
        true
    }

    /// Forget every recorded id.
    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }

    /// Ids in insertion order, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> { self.order.iter().cloned().collect() }

    /// Number of recorded ids.
    #[must_use]
    pub fn len(&self) -> usize { self.order.len() }

    /// Whether no ids are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Configured capacity bound.
    #[must_use]
    pub fn capacity(&self) -> Option<NonZeroUsize> { self.capacity }
}
