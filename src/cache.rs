use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use alloy_primitives::B256;

use crate::types::CachedPayload;

/// Concurrent map from parent block hash to the freshest builder payload.
///
/// Written by the HTTP submit path, read by the proposer polling path.
/// A single mutex over the whole map is sufficient here: the write rate
/// is bounded by block-build cadence, roughly one write per slot. The
/// lock is held only for the map operation itself, never across I/O.
///
/// Cloning the handle is cheap; all clones share the same map. The cache
/// is constructed once in `main` and passed explicitly to the server.
/// There is no ambient state.
#[derive(Clone, Default)]
pub struct PayloadCache {
    inner: Arc<Mutex<HashMap<B256, CachedPayload>>>,
}

impl Debug for PayloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCache")
            .field("entries", &self.inner.lock().unwrap().len())
            .finish()
    }
}

impl PayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` under `parent_hash`, overwriting any prior entry.
    ///
    /// Last write wins: two builders racing on the same parent hash leave
    /// the later submission in place, without versioning.
    pub fn put(&self, parent_hash: B256, payload: CachedPayload) {
        self.inner.lock().unwrap().insert(parent_hash, payload);
    }

    /// Fetch the current entry for `parent_hash`, if any.
    pub fn get(&self, parent_hash: &B256) -> Option<CachedPayload> {
        self.inner.lock().unwrap().get(parent_hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_utils::submit_block_request;
    use crate::types::CachedPayload;
    use alloy_primitives::U256;

    fn payload(parent: B256, value: u64) -> CachedPayload {
        submit_block_request(parent, value).into()
    }

    #[test]
    fn get_before_put_is_none() {
        let cache = PayloadCache::new();
        assert!(cache.get(&B256::from([0x01; 32])).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let cache = PayloadCache::new();
        let parent = B256::from([0x01; 32]);

        cache.put(parent, payload(parent, 100));
        cache.put(parent, payload(parent, 200));

        let got = cache.get(&parent).unwrap();
        assert_eq!(got.value, U256::from(200u64));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_puts_on_disjoint_keys_lose_nothing() {
        let cache = PayloadCache::new();
        let n = 64u8;

        let mut handles = Vec::new();
        for i in 0..n {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let parent = B256::from([i; 32]);
                cache.put(parent, payload(parent, i as u64));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), n as usize);
        for i in 0..n {
            let parent = B256::from([i; 32]);
            let got = cache.get(&parent).unwrap();
            assert_eq!(got.value, U256::from(i as u64));
            assert_eq!(got.parent_hash, parent);
        }
    }
}
