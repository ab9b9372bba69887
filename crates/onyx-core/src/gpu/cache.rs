// Copyright 2025 the Onyx Engine authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A frame-aged cache of GPU objects keyed by 64-bit info hashes.
//!
//! Four instances live on the device: renderpasses, pipelines, framebuffers,
//! and descriptor sets. Hits and inserts stamp `last_frame_used`; entries
//! untouched for the device's age limit are evicted into the release list at
//! end-of-frame. The stored key confirms a hash match, so a 64-bit collision
//! degrades to a miss instead of returning the wrong object.

use std::collections::HashMap;

/// One cached object plus its aging stamp.
#[derive(Debug)]
pub(crate) struct CacheSlot<K, I> {
    /// The full key the hash was computed from.
    pub key: K,
    /// The cached object.
    pub id: I,
    /// Frame count at last hit or insert.
    pub last_frame_used: u64,
}

/// A hash-keyed, frame-aged object cache.
#[derive(Debug)]
pub(crate) struct ResourceCache<K, I> {
    slots: HashMap<u64, CacheSlot<K, I>>,
}

impl<K, I: Copy> ResourceCache<K, I> {
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    /// Looks up `hash`, confirming with `key_eq`, and stamps the entry on a
    /// hit.
    pub fn get(&mut self, hash: u64, key_eq: impl Fn(&K) -> bool, now: u64) -> Option<I> {
        match self.slots.get_mut(&hash) {
            Some(slot) if key_eq(&slot.key) => {
                slot.last_frame_used = now;
                Some(slot.id)
            }
            _ => None,
        }
    }

    /// Inserts a freshly created object. An existing colliding entry is
    /// returned so the caller can route it to the release list.
    pub fn insert(&mut self, hash: u64, key: K, id: I, now: u64) -> Option<I> {
        self.slots
            .insert(hash, CacheSlot { key, id, last_frame_used: now })
            .map(|old| old.id)
    }

    /// Removes and returns every entry whose last use is older than
    /// `min_frame`.
    pub fn evict_older_than(&mut self, min_frame: u64) -> Vec<I> {
        let mut evicted = Vec::new();
        self.slots.retain(|_, slot| {
            if slot.last_frame_used < min_frame {
                evicted.push(slot.id);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Removes every entry matching `predicate` and returns the objects.
    pub fn evict_matching(&mut self, predicate: impl Fn(&K) -> bool) -> Vec<I> {
        let mut evicted = Vec::new();
        self.slots.retain(|_, slot| {
            if predicate(&slot.key) {
                evicted.push(slot.id);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Drains every entry, returning the objects.
    pub fn drain_all(&mut self) -> Vec<I> {
        self.slots.drain().map(|(_, slot)| slot.id).collect()
    }

    /// `true` when some entry holds `id`.
    pub fn contains_id(&self, id: I) -> bool
    where
        I: PartialEq,
    {
        self.slots.values().any(|slot| slot.id == id)
    }

    /// Number of cached entries.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_updates_age_and_survives_eviction() {
        let mut cache: ResourceCache<u32, usize> = ResourceCache::new();
        cache.insert(1, 10, 100, 0);
        cache.insert(2, 20, 200, 0);

        // Touch entry 1 at frame 50; entry 2 stays at frame 0.
        assert_eq!(cache.get(1, |k| *k == 10, 50), Some(100));

        let evicted = cache.evict_older_than(10);
        assert_eq!(evicted, vec![200]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn collision_with_different_key_is_a_miss() {
        let mut cache: ResourceCache<u32, usize> = ResourceCache::new();
        cache.insert(7, 10, 100, 0);
        assert_eq!(cache.get(7, |k| *k == 99, 1), None);
    }

    #[test]
    fn insert_over_collision_returns_old_id() {
        let mut cache: ResourceCache<u32, usize> = ResourceCache::new();
        cache.insert(7, 10, 100, 0);
        let displaced = cache.insert(7, 11, 101, 1);
        assert_eq!(displaced, Some(100));
        assert_eq!(cache.get(7, |k| *k == 11, 2), Some(101));
    }

    #[test]
    fn evict_matching_filters_by_key() {
        let mut cache: ResourceCache<u32, usize> = ResourceCache::new();
        cache.insert(1, 10, 100, 0);
        cache.insert(2, 20, 200, 0);
        let evicted = cache.evict_matching(|k| *k == 20);
        assert_eq!(evicted, vec![200]);
        assert!(cache.contains_id(100));
        assert!(!cache.contains_id(200));
    }
}
