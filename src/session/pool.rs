//! In-process session pool.
//!
//! # Responsibilities
//! - Keep idle sessions per key for reuse
//! - Bound concurrent checkouts per key
//! - Build fresh sessions through a factory when none are idle
//!
//! # Design Decisions
//! - `DashMap` of key → mutex-guarded slot; the mutex is never held while
//!   the factory runs
//! - A reload release drops the session; the next acquire builds a new one
//! - A key whose first build fails leaves no slot behind

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{PoolError, Session, SessionPool};

/// Builds a new session for a key.
pub type SessionFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Session>, PoolError> + Send + Sync>;

#[derive(Default)]
struct Slot {
    idle: Vec<Box<dyn Session>>,
    checked_out: usize,
}

pub struct LocalSessionPool {
    slots: DashMap<String, Mutex<Slot>>,
    factory: SessionFactory,
    max_per_key: usize,
}

impl LocalSessionPool {
    pub fn new(factory: SessionFactory, max_per_key: usize) -> Self {
        Self { slots: DashMap::new(), factory, max_per_key }
    }

    /// Idle sessions currently kept for `key`.
    pub fn idle_count(&self, key: &str) -> usize {
        self.peek(key, |slot| slot.idle.len())
    }

    /// Sessions currently checked out for `key`.
    pub fn checked_out(&self, key: &str) -> usize {
        self.peek(key, |slot| slot.checked_out)
    }

    /// Number of keys with a slot.
    pub fn key_count(&self) -> usize {
        self.slots.len()
    }

    fn peek(&self, key: &str, f: impl FnOnce(&Slot) -> usize) -> usize {
        let Some(entry) = self.slots.get(key) else {
            return 0;
        };
        let slot = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&slot)
    }

    fn with_slot<R>(&self, key: &str, f: impl FnOnce(&mut Slot) -> R) -> R {
        let entry = self.slots.entry(key.to_string()).or_default();
        let mut slot = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut slot)
    }

    /// Drop the slot for `key` if nothing is idle or checked out.
    fn forget_if_unused(&self, key: &str) {
        self.slots.remove_if(key, |_, slot| {
            let slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.checked_out == 0 && slot.idle.is_empty()
        });
    }
}

impl SessionPool for LocalSessionPool {
    fn acquire(&self, key: &str) -> Result<Box<dyn Session>, PoolError> {
        let reused = self.with_slot(key, |slot| {
            if let Some(session) = slot.idle.pop() {
                slot.checked_out += 1;
                return Ok(Some(session));
            }
            if slot.checked_out >= self.max_per_key {
                return Err(PoolError::Exhausted);
            }
            // reserve the checkout before building outside the lock
            slot.checked_out += 1;
            Ok(None)
        })?;

        if let Some(session) = reused {
            return Ok(session);
        }

        debug!(key = %key, "Creating session");
        match (self.factory)(key) {
            Ok(session) => Ok(session),
            Err(e) => {
                self.with_slot(key, |slot| slot.checked_out = slot.checked_out.saturating_sub(1));
                self.forget_if_unused(key);
                warn!(key = %key, error = %e, "Session creation failed");
                Err(e)
            }
        }
    }

    fn release(&self, key: &str, session: Box<dyn Session>, reload: bool) {
        self.with_slot(key, |slot| {
            slot.checked_out = slot.checked_out.saturating_sub(1);
            if !reload {
                slot.idle.push(session);
            }
        });
    }
}
