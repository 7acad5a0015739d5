//! # Remote Set
//!
//! Purpose: Unordered unique-membership operations on a set stored at one
//! key. Membership is decided by the server; the handle never caches it.

use std::sync::Arc;

use bytes::Bytes;

use rtypes_common::{RtError, RtResult};

use crate::connection::Connection;
use crate::key::{Key, Keyed};
use crate::singleflight::Group;

/// Handle to a remote set.
pub struct Set {
    key: Key,
    counts: Group<u64>,
    snapshots: Group<Vec<Bytes>>,
}

impl Set {
    /// Creates a handle for the set at `name`. No I/O happens.
    pub fn new(conn: Arc<dyn Connection>, name: impl Into<String>) -> Self {
        Set {
            key: Key::new(conn, name),
            counts: Group::new(),
            snapshots: Group::new(),
        }
    }

    /// SADD. Returns how many of `values` were not already members.
    pub fn add<V: AsRef<[u8]>>(&self, values: &[V]) -> RtResult<u64> {
        self.write(b"SADD", values)
    }

    /// SREM. Returns how many of `values` were members and got removed.
    pub fn remove<V: AsRef<[u8]>>(&self, values: &[V]) -> RtResult<u64> {
        self.write(b"SREM", values)
    }

    /// SCARD. Number of members, 0 for a missing key. Concurrent calls share
    /// one request.
    pub fn cardinality(&self) -> RtResult<u64> {
        self.counts
            .run("SCARD", || self.key.command(b"SCARD", &[])?.into_u64())
    }

    /// SISMEMBER.
    pub fn is_member(&self, value: impl AsRef<[u8]>) -> RtResult<bool> {
        self.key.command(b"SISMEMBER", &[value.as_ref()])?.into_bool()
    }

    /// SMEMBERS. All members in server order. Concurrent calls share one
    /// request.
    pub fn members(&self) -> RtResult<Vec<Bytes>> {
        self.snapshots.run("SMEMBERS", || {
            self.key.command(b"SMEMBERS", &[])?.into_bulk_array()
        })
    }

    /// Callers currently blocked on another caller's coalesced read.
    #[doc(hidden)]
    pub fn coalesced_waiters(&self) -> usize {
        self.counts.total_waiters() + self.snapshots.total_waiters()
    }

    fn write<V: AsRef<[u8]>>(&self, verb: &[u8], values: &[V]) -> RtResult<u64> {
        if values.is_empty() {
            return Err(RtError::Argument("set update needs at least one value"));
        }
        let values: Vec<&[u8]> = values.iter().map(AsRef::as_ref).collect();
        self.key.command(verb, &values)?.into_u64()
    }
}

impl Keyed for Set {
    fn key(&self) -> &Key {
        &self.key
    }
}
