// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to cache kernels.
//!
//! Generating a kernel needs an FFT, but there are only as many distinct
//! kernels as there are distinct (snapped) w values, which is usually far
//! fewer than the number of visibilities. The cache here hashes the fixed
//! kernel parameters and snaps w to a multiple of a step, and only generates
//! kernels it hasn't seen (or has since evicted).

use std::sync::{Arc, Mutex, RwLock};

use crossbeam_utils::atomic::AtomicCell;
use indexmap::IndexMap;
use log::trace;

use super::{w_kernel, Kernel, KernelError, KernelParams};
use crate::imaging::fft::CentredFft2;

/// What's in our kernel cache.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub struct KernelKey {
    pub params_hash: u64,
    pub w_bucket: i64,
}

/// A kernel, or a placeholder for one that's being generated.
struct Slot {
    kernel: Mutex<Option<Arc<Kernel>>>,
    last_used: AtomicCell<u64>,
}

/// A least-recently-used cache of kernels.
///
/// Each key maps to a slot that is filled once. Hits only take a read lock on
/// the map and stamp the slot with the current time; misses take the write
/// lock just long enough to insert an empty slot (evicting the stalest one if
/// the cache is full). Kernels are generated with only their own slot locked,
/// so kernels for different w are made in parallel, and concurrent requests
/// for the same key always get the same kernel object.
pub struct KernelCache {
    params: KernelParams,
    params_hash: u64,
    w_step: f64,
    capacity: usize,
    fft: CentredFft2,
    kernels: RwLock<IndexMap<KernelKey, Arc<Slot>>>,
    clock: AtomicCell<u64>,

    num_computed: AtomicCell<usize>,
    num_hits: AtomicCell<usize>,
    num_evictions: AtomicCell<usize>,
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("params", &self.params)
            .field("w_step", &self.w_step)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl KernelCache {
    /// Make a new, empty cache. `w_step` defaults to
    /// [`KernelCache::default_w_step`].
    pub fn new(
        params: KernelParams,
        w_step: Option<f64>,
        capacity: usize,
    ) -> Result<KernelCache, KernelError> {
        let w_step = w_step.unwrap_or_else(|| Self::default_w_step(params.theta, params.qpx));
        if !(w_step.is_finite() && w_step > 0.0) {
            return Err(KernelError::InvalidWStep(w_step));
        }
        if capacity == 0 {
            return Err(KernelError::ZeroCapacity);
        }

        Ok(KernelCache {
            params,
            params_hash: params.hash(),
            w_step,
            capacity,
            fft: CentredFft2::new(params.oversampled_size()),
            kernels: RwLock::new(IndexMap::new()),
            clock: AtomicCell::new(0),
            num_computed: AtomicCell::new(0),
            num_hits: AtomicCell::new(0),
            num_evictions: AtomicCell::new(0),
        })
    }

    /// Make a new cache large enough to hold a kernel for every w bucket in
    /// `[-w_max, w_max]`, unless a capacity is given.
    pub fn for_w_max(
        params: KernelParams,
        w_max: f64,
        w_step: Option<f64>,
        capacity: Option<usize>,
    ) -> Result<KernelCache, KernelError> {
        let step = w_step.unwrap_or_else(|| Self::default_w_step(params.theta, params.qpx));
        if !(step.is_finite() && step > 0.0) {
            return Err(KernelError::InvalidWStep(step));
        }
        let capacity = capacity.unwrap_or_else(|| Self::default_capacity(w_max, step));
        Self::new(params, Some(step), capacity)
    }

    /// Snapping w to multiples of this keeps the phase error of the w-term
    /// within one oversampled cell.
    pub fn default_w_step(theta: f64, qpx: usize) -> f64 {
        1.0 / (theta * qpx as f64)
    }

    /// One kernel per bucket in `[-w_max, w_max]`, including the zero bucket.
    pub fn default_capacity(w_max: f64, w_step: f64) -> usize {
        let buckets = (w_max.abs() / w_step).ceil();
        if buckets.is_finite() {
            (buckets as usize).saturating_mul(2).saturating_add(1)
        } else {
            1
        }
    }

    /// Get the cache key for `w`.
    pub fn key(&self, w: f64) -> Result<KernelKey, KernelError> {
        if !w.is_finite() {
            return Err(KernelError::NonFiniteW(w));
        }
        Ok(KernelKey {
            params_hash: self.params_hash,
            w_bucket: (w / self.w_step).round() as i64,
        })
    }

    /// Give kernel parameters and a w, and retrieve the kernel for the bucket
    /// `w` falls into. If the kernel wasn't already in the cache, it is
    /// generated at the bucket's central w and inserted, possibly evicting the
    /// least-recently-used kernel.
    pub fn get(&self, params: &KernelParams, w: f64) -> Result<Arc<Kernel>, KernelError> {
        let params_hash = params.hash();
        if params_hash != self.params_hash {
            return Err(KernelError::ParamsMismatch {
                expected: self.params_hash,
                got: params_hash,
            });
        }
        let key = self.key(w)?;
        let now = self.clock.fetch_add(1);

        let existing = self.kernels.read().unwrap().get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self.insert_slot(key, now),
        };
        slot.last_used.store(now);

        let mut guard = slot.kernel.lock().unwrap();
        if let Some(kernel) = guard.as_ref() {
            self.num_hits.fetch_add(1);
            return Ok(Arc::clone(kernel));
        }

        // If we hit this part of the code, the kernel was not in the cache.
        match w_kernel(&self.params, key.w_bucket as f64 * self.w_step, &self.fft) {
            Ok(kernel) => {
                let kernel = Arc::new(kernel);
                self.num_computed.fetch_add(1);
                trace!("Generated kernel for w = {}", kernel.w());
                *guard = Some(Arc::clone(&kernel));
                Ok(kernel)
            }
            Err(e) => {
                drop(guard);
                let mut kernels = self.kernels.write().unwrap();
                if kernels.get(&key).map_or(false, |s| Arc::ptr_eq(s, &slot)) {
                    kernels.swap_remove(&key);
                }
                Err(e)
            }
        }
    }

    /// Get the slot for `key`, inserting an empty one if there isn't one yet.
    fn insert_slot(&self, key: KernelKey, now: u64) -> Arc<Slot> {
        let mut kernels = self.kernels.write().unwrap();
        // Another thread may have got here first.
        if let Some(slot) = kernels.get(&key) {
            return Arc::clone(slot);
        }

        if kernels.len() >= self.capacity {
            let stalest = kernels
                .values()
                .enumerate()
                .min_by_key(|(_, slot)| slot.last_used.load())
                .map(|(i, _)| i);
            if let Some((evicted, _)) = stalest.and_then(|i| kernels.swap_remove_index(i)) {
                trace!("Evicted kernel for w bucket {}", evicted.w_bucket);
                self.num_evictions.fetch_add(1);
            }
        }
        let slot = Arc::new(Slot {
            kernel: Mutex::new(None),
            last_used: AtomicCell::new(now),
        });
        kernels.insert(key, Arc::clone(&slot));
        slot
    }

    /// Generate a kernel for exactly `w` with this cache's parameters and FFT
    /// plan, without looking in or adding to the cache.
    pub fn generate(&self, w: f64) -> Result<Kernel, KernelError> {
        w_kernel(&self.params, w, &self.fft)
    }

    /// Is the kernel for `w` currently cached? This doesn't count as a use.
    pub fn contains(&self, w: f64) -> bool {
        let slot = match self.key(w) {
            Ok(key) => self.kernels.read().unwrap().get(&key).cloned(),
            Err(_) => None,
        };
        slot.map_or(false, |slot| slot.kernel.lock().unwrap().is_some())
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    pub fn w_step(&self) -> f64 {
        self.w_step
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many kernels have been generated (including regenerations after
    /// evictions)?
    pub fn num_computed(&self) -> usize {
        self.num_computed.load()
    }

    pub fn num_hits(&self) -> usize {
        self.num_hits.load()
    }

    pub fn num_evictions(&self) -> usize {
        self.num_evictions.load()
    }

    /// Get the size of the cache.
    pub fn len(&self) -> usize {
        self.kernels.read().unwrap().len()
    }

    /// Is the cache empty?
    pub fn is_empty(&self) -> bool {
        self.kernels.read().unwrap().is_empty()
    }

    /// Clear the cache. The counters are left alone.
    pub fn clear(&self) {
        self.kernels.write().unwrap().clear()
    }
}
