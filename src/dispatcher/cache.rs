//! Session-cache token shared by concurrent send attempts.
//!
//! The token and a generation counter sit behind one lock. Every attempt
//! snapshots both; a response may only store a new token if no `clear`
//! happened since its snapshot, so a response that raced an identity switch
//! cannot resurrect a token for the previous identity.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Slot {
    token: Option<Arc<str>>,
    generation: u64,
}

/// Holder of the optional session-cache token.
#[derive(Debug, Default)]
pub struct SessionCache {
    slot: Mutex<Slot>,
}

/// Token and generation observed at the start of one attempt.
#[derive(Clone, Debug)]
pub(crate) struct CacheSnapshot {
    pub(crate) token: Option<Arc<str>>,
    pub(crate) generation: u64,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<Arc<str>> {
        self.slot.lock().token.clone()
    }

    pub(crate) fn snapshot(&self) -> CacheSnapshot {
        let slot = self.slot.lock();
        CacheSnapshot {
            token: slot.token.clone(),
            generation: slot.generation,
        }
    }

    /// Store `token` unless the cache was cleared after `generation` was read.
    ///
    /// Returns whether the token was stored.
    pub(crate) fn store(&self, token: &str, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.token = Some(Arc::from(token));
        true
    }

    /// Drop the token and invalidate every outstanding snapshot.
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.token = None;
        slot.generation = slot.generation.wrapping_add(1);
    }
}
