//! A fixed-capacity Swiss Tables-inspired map with non-greedy placement.
//!
//! Capacity is chosen at construction and never changes: there is no resize,
//! no rehash, and no removal. In exchange, insertion keeps a δ-fraction of
//! slots spare and bounds every probe sequence by a group count derived from
//! δ, so lookups stay short even near the insertion cap.

use core::hash::{BuildHasher, Hash};
use std::mem::MaybeUninit;

use crate::group::{self, BitMask, Group, GROUP_SIZE};
use crate::metadata::{self, Metadata};
use crate::probe;
use crate::{make_hash, BuildError, DefaultHashBuilder};

/// Spare-capacity fraction used by [`Map::with_capacity`].
pub const DEFAULT_DELTA: f64 = 0.1;

/// Load factor above which the non-greedy pass widens its window.
const HIGH_LOAD: f64 = 0.8;
/// Groups inspected by the non-greedy pass at low load.
const WINDOW_LOW: usize = 4;
/// Groups inspected by the non-greedy pass at high load.
const WINDOW_HIGH: usize = 8;
/// Upper bound on empty-slot candidates collected per insert.
const MAX_CANDIDATES: usize = 128;

/// An empty slot recorded by the non-greedy pass.
#[derive(Clone, Copy, Default)]
struct Candidate {
    group: usize,
    offset: usize,
    slot: usize,
}

pub struct Map<K, V, S: BuildHasher = DefaultHashBuilder> {
    hasher: S,
    /// XORed into every user hash before indexing.
    salt: u64,
    n_items: usize,
    max_inserts: usize,
    max_probe_limit: usize,
    total_groups: usize,
    max_group_used: usize,
    /// Safety: we maintain the following invariant:
    /// `self.storage[i]` is initialized whenever
    /// `metadata::is_occupied(self.metadata[i])`.
    storage: Box<[MaybeUninit<(K, V)>]>,
    metadata: Box<[Metadata]>,
}

impl<K, V> Map<K, V> {
    /// Builds a map with the given capacity and the default spare-capacity
    /// fraction.
    pub fn with_capacity(capacity: usize) -> Result<Self, BuildError> {
        Self::with_capacity_and_delta(capacity, DEFAULT_DELTA)
    }

    /// Builds a map keeping at least a `delta` fraction of slots empty.
    pub fn with_capacity_and_delta(capacity: usize, delta: f64) -> Result<Self, BuildError> {
        Self::with_capacity_and_hasher(capacity, delta, DefaultHashBuilder::default())
    }
}

impl<K, V, S: BuildHasher> Map<K, V, S> {
    /// Builds a map that hashes keys with `hasher`.
    ///
    /// Fails if `capacity` is zero or `delta` lies outside `(0, 1)`.
    pub fn with_capacity_and_hasher(
        capacity: usize,
        delta: f64,
        hasher: S,
    ) -> Result<Self, BuildError> {
        if capacity == 0 {
            return Err(BuildError::ZeroCapacity);
        }
        if !(delta > 0.0 && delta < 1.0) {
            return Err(BuildError::InvalidDelta(delta));
        }

        let storage = Box::new_uninit_slice(capacity);
        let metadata = vec![metadata::EMPTY; capacity].into_boxed_slice();
        let max_probe_limit = probe::max_probe_limit(capacity, delta);

        Ok(Self {
            hasher,
            salt: fastrand::u64(..),
            n_items: 0,
            max_inserts: probe::max_inserts(capacity, delta),
            max_probe_limit,
            total_groups: probe::total_groups(capacity, max_probe_limit),
            max_group_used: 0,
            storage,
            metadata,
        })
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.n_items as f64 / self.capacity() as f64
    }

    /// Insertion cap: `capacity - floor(delta * capacity)`.
    pub fn max_inserts(&self) -> usize {
        self.max_inserts
    }

    /// Highest group index any successful insertion has placed a key at.
    pub fn max_group_used(&self) -> usize {
        self.max_group_used
    }

    /// Per-key probe-length cap in slots, derived from δ.
    pub fn max_probe_limit(&self) -> usize {
        self.max_probe_limit
    }

    /// Worst-case probe offset reached so far, in slots.
    pub fn max_probe_used(&self) -> usize {
        self.max_group_used * GROUP_SIZE + (GROUP_SIZE - 1)
    }
}

impl<K, V, S: BuildHasher> Drop for Map<K, V, S> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<(K, V)>() {
            for (i, &m) in self.metadata.iter().enumerate() {
                if metadata::is_occupied(m) {
                    // SAFETY: occupied slots hold initialized entries.
                    unsafe { self.storage[i].assume_init_drop() };
                }
            }
        }
    }
}

impl<K, V, S> Clone for Map<K, V, S>
where
    K: Clone + PartialEq + Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        let mut other = Self {
            hasher: self.hasher.clone(),
            salt: self.salt,
            n_items: 0,
            max_inserts: self.max_inserts,
            max_probe_limit: self.max_probe_limit,
            total_groups: self.total_groups,
            max_group_used: self.max_group_used,
            storage: Box::new_uninit_slice(self.capacity()),
            metadata: vec![metadata::EMPTY; self.capacity()].into_boxed_slice(),
        };

        for (i, &m) in self.metadata.iter().enumerate() {
            if metadata::is_occupied(m) {
                // SAFETY: occupied slots hold initialized entries.
                let (k, v) = unsafe { self.storage[i].assume_init_ref() };
                other.storage[i].write((k.clone(), v.clone()));

                // Important: only update the metadata after we successfully
                // clone! If cloning panics, then updating the metadata before
                // cloning leads to a read of uninitialized memory when
                // `other` is dropped.
                other.metadata[i] = m;
                other.n_items += 1;
            }
        }
        other
    }
}

impl<K, V, S> Map<K, V, S>
where
    K: PartialEq + Eq + Hash,
    S: BuildHasher,
{
    fn hash_and_tag(&self, k: &K) -> (u64, Metadata) {
        let hash = make_hash(&self.hasher, k) ^ self.salt;
        (hash, metadata::encode(hash))
    }

    /// Slot index of `offset` within the group starting at `base`.
    #[inline]
    fn slot(&self, base: usize, offset: usize) -> usize {
        (base + offset) % self.capacity()
    }

    /// Produces the `(empty, matches)` masks for the group starting at
    /// `base`. Contiguous groups take a single 16-byte load; groups that
    /// straddle the end of the array are scanned a slot at a time.
    fn scan(&self, base: usize, tag: Metadata) -> (BitMask, BitMask) {
        if probe::is_contiguous(base, self.capacity()) {
            // SAFETY: `base + GROUP_SIZE <= metadata.len()`, so the 16-byte
            // read stays inside the allocation.
            let group = unsafe { Group::load(self.metadata.as_ptr().add(base)) };
            (group.match_empty(), group.match_byte(tag))
        } else {
            group::wrapping_scan(&self.metadata, base, tag)
        }
    }

    /// Key-confirms every fingerprint match in the group.
    fn find_in_group(&self, base: usize, matches: BitMask, k: &K) -> Option<usize> {
        for offset in matches {
            let index = self.slot(base, offset);
            // SAFETY: a fingerprint match implies the slot is occupied, so
            // the entry is initialized.
            let (kk, _) = unsafe { self.storage[index].assume_init_ref() };
            if kk == k {
                return Some(index);
            }
        }
        None
    }

    /// Walks the probe sequence for `k`, consulting at most
    /// `max_group_used + 1` groups.
    ///
    /// Exiting on the first empty slot is sound: insertion places every key
    /// at the earliest empty slot of its probe sequence reachable at the
    /// time, and slots never revert to empty, so an empty slot ahead of the
    /// key proves the key absent.
    fn probe_find(&self, k: &K) -> Option<usize> {
        let (hash, tag) = self.hash_and_tag(k);

        for group in 0..=self.max_group_used {
            let base = probe::group_base(hash, group, self.capacity());
            let (empty, matches) = self.scan(base, tag);
            if let Some(index) = self.find_in_group(base, matches, k) {
                return Some(index);
            }
            if empty.any() {
                return None;
            }
        }
        None
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        let index = self.probe_find(k)?;
        // SAFETY: `probe_find` only returns occupied slots.
        let (_, v) = unsafe { self.storage[index].assume_init_ref() };
        Some(v)
    }

    pub fn get_mut(&mut self, k: &K) -> Option<&mut V> {
        let index = self.probe_find(k)?;
        // SAFETY: `probe_find` only returns occupied slots.
        let (_, v) = unsafe { self.storage[index].assume_init_mut() };
        Some(v)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.probe_find(k).is_some()
    }

    /// Inserts `(k, v)`, overwriting the value if `k` is already present.
    ///
    /// Returns `false` without mutating the map once the item count has
    /// reached [`max_inserts`](Self::max_inserts) (the cap is checked before
    /// the key is looked up, so at-cap updates of existing keys are refused
    /// too), or if the probe sequence is exhausted without finding a slot.
    pub fn insert(&mut self, k: K, v: V) -> bool {
        if self.n_items >= self.max_inserts {
            return false;
        }

        let (hash, tag) = self.hash_and_tag(&k);

        // Greedy pass over the home group: overwrite a present key, or take
        // the lowest empty slot. A placement here never raises
        // `max_group_used`.
        let base = probe::group_base(hash, 0, self.capacity());
        let (empty, matches) = self.scan(base, tag);
        if let Some(index) = self.find_in_group(base, matches, &k) {
            self.replace_value(index, v);
            return true;
        }
        if let Some(offset) = empty.first_set() {
            let index = self.slot(base, offset);
            self.place(index, tag, k, v);
            return true;
        }

        // The home group is fully occupied: collect empty slots across the
        // next few groups and take the earliest in probe order.
        let window = self.window_groups();
        let mut candidates = [Candidate::default(); MAX_CANDIDATES];
        let mut n_candidates = 0;

        for group in 1..window {
            let base = probe::group_base(hash, group, self.capacity());
            let (empty, matches) = self.scan(base, tag);
            if let Some(index) = self.find_in_group(base, matches, &k) {
                self.replace_value(index, v);
                return true;
            }
            for offset in empty {
                if n_candidates == MAX_CANDIDATES {
                    break;
                }
                candidates[n_candidates] = Candidate {
                    group,
                    offset,
                    slot: self.slot(base, offset),
                };
                n_candidates += 1;
            }
        }

        if let Some(best) = candidates[..n_candidates]
            .iter()
            .min_by_key(|c| (c.group, c.offset))
        {
            let (group, slot) = (best.group, best.slot);
            self.place(slot, tag, k, v);
            self.max_group_used = self.max_group_used.max(group);
            return true;
        }

        self.insert_fallback(hash, tag, window, k, v)
    }

    /// Slot-by-slot sweep of the groups past the non-greedy window.
    fn insert_fallback(&mut self, hash: u64, tag: Metadata, window: usize, k: K, v: V) -> bool {
        for group in window..self.total_groups {
            let base = probe::group_base(hash, group, self.capacity());
            for offset in 0..GROUP_SIZE {
                let index = self.slot(base, offset);
                let m = self.metadata[index];
                if metadata::is_empty(m) {
                    self.place(index, tag, k, v);
                    self.max_group_used = self.max_group_used.max(group);
                    return true;
                }
                if m == tag {
                    // SAFETY: the slot is occupied, so the entry is
                    // initialized.
                    let (kk, _) = unsafe { self.storage[index].assume_init_ref() };
                    if *kk == k {
                        self.replace_value(index, v);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Returns the value for `k`, inserting a default value first if the key
    /// is absent.
    ///
    /// Returns `None` when the key is absent and the insert is refused
    /// (size cap or probe exhaustion). Present keys are always returned,
    /// even at the cap.
    pub fn get_or_insert_default(&mut self, k: K) -> Option<&mut V>
    where
        K: Clone,
        V: Default,
    {
        if !self.contains_key(&k) {
            self.insert(k.clone(), V::default());
        }
        self.get_mut(&k)
    }

    fn window_groups(&self) -> usize {
        let window = if self.load_factor() > HIGH_LOAD {
            WINDOW_HIGH
        } else {
            WINDOW_LOW
        };
        window.min(self.total_groups)
    }

    fn place(&mut self, index: usize, tag: Metadata, k: K, v: V) {
        self.metadata[index] = tag;
        self.storage[index].write((k, v));
        self.n_items += 1;
    }

    fn replace_value(&mut self, index: usize, v: V) {
        // SAFETY: callers only pass indices of occupied slots.
        let (_, vv) = unsafe { self.storage[index].assume_init_mut() };
        *vv = v;
    }
}
