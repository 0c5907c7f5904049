// src/services/header_pool.rs

//! Header profile assignment per worker slot.
//!
//! Each slot keeps presenting the same profile until it is rotated, which
//! happens after a failed request. Rotation walks a fixed ring of profiles
//! starting from the slot's own position.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::HeaderProfile;

#[derive(Debug, Default)]
struct Assignments {
    /// Next ring index handed to a slot seen for the first time
    cursor: usize,
    /// Current ring index of each slot
    slots: HashMap<usize, usize>,
}

/// Ring of header profiles with sticky per-slot assignment.
#[derive(Debug)]
pub struct HeaderPool {
    profiles: Vec<Arc<HeaderProfile>>,
    assignments: Mutex<Assignments>,
}

impl HeaderPool {
    /// Build a pool. An empty list is replaced by the default profile.
    pub fn new(profiles: Vec<HeaderProfile>) -> Self {
        let mut profiles: Vec<Arc<HeaderProfile>> = profiles.into_iter().map(Arc::new).collect();
        if profiles.is_empty() {
            profiles.push(Arc::new(HeaderProfile::default()));
        }
        Self {
            profiles,
            assignments: Mutex::new(Assignments::default()),
        }
    }

    /// Number of distinct profiles (at least one).
    pub fn count(&self) -> usize {
        self.profiles.len()
    }

    /// Profile currently assigned to `slot`, assigning the next one in the
    /// ring on first use.
    pub fn assign(&self, slot: usize) -> Arc<HeaderProfile> {
        let n = self.profiles.len();
        let mut state = self.lock();
        let index = match state.slots.get(&slot) {
            Some(&index) => index,
            None => {
                let index = state.cursor % n;
                state.cursor = (index + 1) % n;
                state.slots.insert(slot, index);
                log::debug!("Assigned header profile {} to worker {}", index, slot);
                index
            }
        };
        Arc::clone(&self.profiles[index])
    }

    /// Move `slot` to the next profile in the ring and return it.
    pub fn rotate(&self, slot: usize) -> Arc<HeaderProfile> {
        let n = self.profiles.len();
        let mut state = self.lock();
        let next = match state.slots.get(&slot) {
            Some(&index) => (index + 1) % n,
            None => {
                let index = state.cursor % n;
                state.cursor = (index + 1) % n;
                index
            }
        };
        state.slots.insert(slot, next);
        log::debug!("Rotated worker {} to header profile {}", slot, next);
        Arc::clone(&self.profiles[next])
    }

    fn lock(&self) -> MutexGuard<'_, Assignments> {
        // Assignment state is a pair of indices; a panic elsewhere cannot
        // leave it half-written.
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
