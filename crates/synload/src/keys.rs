//! Synonym key allocation
//!
//! Keys are handed out in strictly increasing order from a value seeded
//! once per run. The seed is read from the store but the allocator itself
//! never goes back to it.

use crate::config::KeySource;
use crate::store::{Key, StoreResult, SynonymStore};

/// First key of an empty synonym table.
pub const BASELINE_KEY: Key = 1000;

#[derive(Debug, Clone)]
pub struct KeyAllocator {
    next: Key,
    issued: usize,
}

impl KeyAllocator {
    pub fn new(first: Key) -> Self {
        Self {
            next: first,
            issued: 0,
        }
    }

    /// Start one past `max`, or at [`BASELINE_KEY`] for an empty table
    pub fn from_max(max: Option<Key>) -> Self {
        Self::new(max.map_or(BASELINE_KEY, |max| max + 1))
    }

    /// Seed from the store
    ///
    /// With `advance` false the sequence is only read, so the store is
    /// left untouched.
    pub async fn seed(store: &dyn SynonymStore, source: KeySource, advance: bool) -> StoreResult<Self> {
        let allocator = match source {
            KeySource::Sequence if advance => Self::new(store.next_sequence_key().await?),
            KeySource::Sequence => Self::new(store.peek_sequence_key().await?),
            KeySource::MaxKey => Self::from_max(store.max_synonym_key().await?),
        };
        Ok(allocator)
    }

    /// Take the next key
    pub fn next_key(&mut self) -> Key {
        let key = self.next;
        self.next += 1;
        self.issued += 1;
        key
    }

    /// Key the next call to [`Self::next_key`] returns
    pub fn peek(&self) -> Key {
        self.next
    }

    pub fn issued(&self) -> usize {
        self.issued
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    #[test]
    fn test_from_max() {
        assert_eq!(KeyAllocator::from_max(None).peek(), 1000);
        assert_eq!(KeyAllocator::from_max(Some(41_999)).peek(), 42_000);
    }

    #[tokio::test]
    async fn test_seed_preview_does_not_advance_sequence() {
        let store = MemoryStore::new().with_sequence(5000);

        let peeked = KeyAllocator::seed(&store, KeySource::Sequence, false).await.unwrap();
        assert_eq!(peeked.peek(), 5001);
        assert_eq!(store.mutation_count(), 0);

        let taken = KeyAllocator::seed(&store, KeySource::Sequence, true).await.unwrap();
        assert_eq!(taken.peek(), 5001);
        assert_eq!(store.mutation_count(), 1);
    }

    proptest! {
        #[test]
        fn keys_are_strictly_increasing(start in 0i64..1_000_000, n in 1usize..200) {
            let mut alloc = KeyAllocator::new(start);
            let keys: Vec<Key> = (0..n).map(|_| alloc.next_key()).collect();
            prop_assert_eq!(keys[0], start);
            prop_assert!(keys.windows(2).all(|w| w[1] == w[0] + 1));
            prop_assert_eq!(alloc.issued(), n);
        }
    }
}
