//! Per-view snapshot cache.
//!
//! Each invalidation bumps a generation counter. A value computed under an
//! older generation is discarded on `put`, so a slow rebuild can't overwrite
//! a newer invalidation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

#[derive(Debug)]
pub struct ViewCache<T> {
    generation: Arc<AtomicU64>,
    slot: Arc<RwLock<Slot<T>>>,
}

impl<T> Clone for ViewCache<T> {
    fn clone(&self) -> Self {
        Self {
            generation: Arc::clone(&self.generation),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ViewCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ViewCache<T> {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            slot: Arc::new(RwLock::new(Slot {
                generation: 0,
                value: None,
            })),
        }
    }

    /// Current generation; pass it back to [`ViewCache::put`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.value = None;
    }

    /// Store `value` if nothing was invalidated since `generation` was read.
    pub fn put(&self, generation: u64, value: T) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if generation != self.generation() {
            return false;
        }
        slot.generation = generation;
        slot.value = Some(value);
        true
    }
}

impl<T: Clone> ViewCache<T> {
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        if slot.generation != self.generation() {
            return None;
        }
        slot.value.clone()
    }
}
