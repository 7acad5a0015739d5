//! # Single-Flight Call Coordinator
//!
//! Purpose: Collapse concurrent identical requests on one handle into a single
//! request to the remote store, handing its result to every caller.
//!
//! ## Design Principles
//! 1. **One Request Per Wave**: The first caller for a signature runs the
//!    request; callers arriving while it is in flight wait for its result.
//! 2. **Condition-Variable Waits**: Waiters sleep on a `Condvar` until the
//!    result is published; nobody polls.
//! 3. **Immutable Fan-Out**: Each waiter receives its own clone of the result,
//!    so `T` should be cheap to clone (`Bytes`, `Arc`, integers).
//! 4. **Independent Waves**: The record is removed before the result is
//!    published; later callers start a fresh request.
//!
//! ## State per signature
//!
//! ```text
//! absent ──run()──▶ in-flight ──request returns──▶ resolved-broadcasting ──▶ absent
//!                      ▲   │
//!            run() joins   └── waiters += 1, wait on condvar
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use rtypes_common::{RtError, RtResult};

/// Deduplicates concurrent calls keyed by a signature string.
pub struct Group<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

struct Call<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

struct Slot<T> {
    result: Option<RtResult<T>>,
    waiters: usize,
}

impl<T> Default for Group<T> {
    fn default() -> Self {
        Group {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Group<T> {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `request` unless a call with the same `signature` is already in
    /// flight, in which case this blocks and returns that call's result.
    ///
    /// **Logic**:
    /// 1. Under the map lock, either join the existing record or insert a new one.
    /// 2. The inserting caller runs `request` without holding any lock.
    /// 3. It removes the record, then publishes the result and wakes waiters.
    pub fn run<F>(&self, signature: &str, request: F) -> RtResult<T>
    where
        F: FnOnce() -> RtResult<T>,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(signature) {
                let existing = Arc::clone(existing);
                existing.slot.lock().waiters += 1;
                drop(calls);
                return existing.wait();
            }
            let call = Arc::new(Call::new());
            calls.insert(signature.to_owned(), Arc::clone(&call));
            call
        };

        debug!(signature, "single-flight wave started");
        let mut leader = Leader {
            group: self,
            signature,
            call: &call,
            published: false,
        };
        let result = request();
        leader.publish(result.clone());
        result
    }

    /// Callers currently waiting on the in-flight call for `signature`.
    pub fn waiters(&self, signature: &str) -> usize {
        let calls = self.calls.lock();
        calls.get(signature).map_or(0, |call| call.slot.lock().waiters)
    }

    /// Callers waiting on any in-flight call in this group.
    pub fn total_waiters(&self) -> usize {
        let calls = self.calls.lock();
        calls.values().map(|call| call.slot.lock().waiters).sum()
    }

    /// Number of signatures with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Call {
            slot: Mutex::new(Slot {
                result: None,
                waiters: 0,
            }),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> RtResult<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(result) = &slot.result {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

/// Publishes the wave's result; on unwind, publishes `CallAbandoned` instead
/// so waiters are never left blocked.
struct Leader<'a, T> {
    group: &'a Group<T>,
    signature: &'a str,
    call: &'a Arc<Call<T>>,
    published: bool,
}

impl<T> Leader<'_, T> {
    fn publish(&mut self, result: RtResult<T>) {
        self.published = true;
        // Lock order is map then slot, matching the join path in `run`.
        self.group.calls.lock().remove(self.signature);

        let mut slot = self.call.slot.lock();
        let waiters = slot.waiters;
        let failed = result.is_err();
        slot.result = Some(result);
        drop(slot);
        self.call.done.notify_all();

        debug!(signature = self.signature, waiters, failed, "single-flight wave resolved");
    }
}

impl<T> Drop for Leader<'_, T> {
    fn drop(&mut self) {
        if !self.published {
            self.publish(Err(RtError::CallAbandoned));
        }
    }
}
