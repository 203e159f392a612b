//! Volatile in-process cache tier
//!
//! **[APA-CSH-030]** Bounded LRU keyed by normalized text. Reads never
//! await: the critical section is a single mutex over the map and the
//! recency queue. Eviction is lazy: the queue may hold stale entries which
//! are skipped when their sequence number no longer matches the map.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use vnap_common::models::AddressResult;

struct Inner {
    map: HashMap<String, (AddressResult, u64)>,
    queue: VecDeque<(String, u64)>,
    seq: u64,
    capacity: usize,
}

pub struct L1Cache {
    inner: Mutex<Inner>,
}

impl L1Cache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                queue: VecDeque::new(),
                seq: 0,
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<AddressResult> {
        let mut inner = self.inner.lock().expect("l1 cache poisoned");
        inner.seq += 1;
        let seq = inner.seq;
        if let Some((result, entry_seq)) = inner.map.get_mut(key) {
            *entry_seq = seq;
            let result = result.clone();
            inner.queue.push_back((key.to_string(), seq));
            Some(result)
        } else {
            None
        }
    }

    pub fn insert(&self, key: &str, value: AddressResult) {
        let mut inner = self.inner.lock().expect("l1 cache poisoned");
        inner.seq += 1;
        let seq = inner.seq;
        inner.map.insert(key.to_string(), (value, seq));
        inner.queue.push_back((key.to_string(), seq));

        while inner.map.len() > inner.capacity {
            let Some((old_key, old_seq)) = inner.queue.pop_front() else {
                break;
            };
            let current = inner.map.get(&old_key).map(|(_, s)| *s);
            if current == Some(old_seq) {
                inner.map.remove(&old_key);
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("l1 cache poisoned");
        inner.map.clear();
        inner.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("l1 cache poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
