//! # Remote List
//!
//! Purpose: Ordered-sequence operations on a list stored at one key.
//!
//! ## Design Principles
//! 1. **Mutations Run Once**: Pushes, pops, and inserts always issue their own
//!    request, in the order the caller made them.
//! 2. **Coalesced Reads**: `range` and `length` go through a single-flight
//!    group; identical concurrent reads share one reply.
//! 3. **Seconds for Blocking Pops**: Blocking timeouts must be whole seconds;
//!    zero blocks until an element arrives.
//!
//! ## Notes
//! - Blocking pops widen the socket read timeout for their own wait, so a
//!   server-side timeout comes back as `Ok(None)` rather than an I/O error.
//! - A blocking pop holds the shared connection until the server replies.
//!   Give a waiting consumer its own connection if other callers must keep
//!   issuing commands meanwhile.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use rtypes_common::{whole_seconds, RtError, RtResult};

use crate::connection::Connection;
use crate::key::{Key, Keyed};
use crate::resp::IntArg;
use crate::singleflight::Group;

/// Where `insert` places the new value relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
}

impl Position {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Position::Before => b"BEFORE",
            Position::After => b"AFTER",
        }
    }
}

/// Handle to a remote list.
pub struct List {
    key: Key,
    ranges: Group<Vec<Bytes>>,
    lengths: Group<u64>,
}

impl List {
    /// Creates a handle for the list at `name`. No I/O happens.
    pub fn new(conn: Arc<dyn Connection>, name: impl Into<String>) -> Self {
        List {
            key: Key::new(conn, name),
            ranges: Group::new(),
            lengths: Group::new(),
        }
    }

    /// LPUSH. Prepends `values` in order, so the last value ends up first.
    /// Returns the new length.
    pub fn left_push<V: AsRef<[u8]>>(&self, values: &[V]) -> RtResult<u64> {
        self.push(b"LPUSH", values)
    }

    /// RPUSH. Appends `values` in order. Returns the new length.
    pub fn right_push<V: AsRef<[u8]>>(&self, values: &[V]) -> RtResult<u64> {
        self.push(b"RPUSH", values)
    }

    /// LPUSHX. Prepends only if the list exists; returns 0 otherwise.
    pub fn left_push_x(&self, value: impl AsRef<[u8]>) -> RtResult<u64> {
        self.key.command(b"LPUSHX", &[value.as_ref()])?.into_u64()
    }

    /// RPUSHX. Appends only if the list exists; returns 0 otherwise.
    pub fn right_push_x(&self, value: impl AsRef<[u8]>) -> RtResult<u64> {
        self.key.command(b"RPUSHX", &[value.as_ref()])?.into_u64()
    }

    /// LPOP. `None` when the list is empty or missing.
    pub fn left_pop(&self) -> RtResult<Option<Bytes>> {
        self.key.command(b"LPOP", &[])?.into_bulk()
    }

    /// RPOP. `None` when the list is empty or missing.
    pub fn right_pop(&self) -> RtResult<Option<Bytes>> {
        self.key.command(b"RPOP", &[])?.into_bulk()
    }

    /// BLPOP. Waits up to `timeout` (whole seconds, zero for no limit) for
    /// an element; `None` when the server times out.
    pub fn blocking_left_pop(&self, timeout: Duration) -> RtResult<Option<Bytes>> {
        let secs = IntArg::from(whole_seconds(timeout)?);
        self.key
            .blocking_command(b"BLPOP", &[secs.as_bytes()], timeout)?
            .into_popped()
    }

    /// BRPOP. Same as `blocking_left_pop`, from the tail.
    pub fn blocking_right_pop(&self, timeout: Duration) -> RtResult<Option<Bytes>> {
        let secs = IntArg::from(whole_seconds(timeout)?);
        self.key
            .blocking_command(b"BRPOP", &[secs.as_bytes()], timeout)?
            .into_popped()
    }

    /// RPOPLPUSH. Moves the tail of this list to the head of `destination`
    /// and returns it. `destination` may be this list.
    pub fn right_pop_left_push(&self, destination: &List) -> RtResult<Option<Bytes>> {
        let dest = destination.name();
        self.key.command(b"RPOPLPUSH", &[dest.as_bytes()])?.into_bulk()
    }

    /// BRPOPLPUSH. Blocking form of `right_pop_left_push`.
    pub fn blocking_right_pop_left_push(
        &self,
        destination: &List,
        timeout: Duration,
    ) -> RtResult<Option<Bytes>> {
        let secs = IntArg::from(whole_seconds(timeout)?);
        let dest = destination.name();
        self.key
            .blocking_command(b"BRPOPLPUSH", &[dest.as_bytes(), secs.as_bytes()], timeout)?
            .into_bulk()
    }

    /// LRANGE. Elements from `start` to `stop` inclusive; negative indices
    /// count from the tail, so `range(0, -1)` is the whole list.
    ///
    /// Concurrent calls with the same bounds share one request.
    pub fn range(&self, start: i64, stop: i64) -> RtResult<Vec<Bytes>> {
        let signature = format!("LRANGE:{start}:{stop}");
        self.ranges.run(&signature, || {
            let (start, stop) = (IntArg::from(start), IntArg::from(stop));
            self.key
                .command(b"LRANGE", &[start.as_bytes(), stop.as_bytes()])?
                .into_bulk_array()
        })
    }

    /// LINDEX. `None` when `index` is out of range.
    pub fn index(&self, index: i64) -> RtResult<Option<Bytes>> {
        let index = IntArg::from(index);
        self.key.command(b"LINDEX", &[index.as_bytes()])?.into_bulk()
    }

    /// LINSERT. Inserts `value` next to the first occurrence of `pivot`.
    ///
    /// Returns the new length, -1 when `pivot` is absent, or 0 when the list
    /// does not exist.
    pub fn insert(
        &self,
        position: Position,
        pivot: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> RtResult<i64> {
        self.key
            .command(
                b"LINSERT",
                &[position.as_bytes(), pivot.as_ref(), value.as_ref()],
            )?
            .into_i64()
    }

    /// LLEN. Concurrent calls share one request.
    pub fn length(&self) -> RtResult<u64> {
        self.lengths
            .run("LLEN", || self.key.command(b"LLEN", &[])?.into_u64())
    }

    /// LSET. Replaces the element at `index`; out-of-range indices are a
    /// server error.
    pub fn set(&self, index: i64, value: impl AsRef<[u8]>) -> RtResult<()> {
        let index = IntArg::from(index);
        self.key
            .command(b"LSET", &[index.as_bytes(), value.as_ref()])?
            .into_ok()
    }

    /// LREM. Removes occurrences of `value`: the first `count` from the head
    /// when positive, from the tail when negative, all when zero. Returns how
    /// many were removed.
    pub fn remove(&self, count: i64, value: impl AsRef<[u8]>) -> RtResult<u64> {
        let count = IntArg::from(count);
        self.key
            .command(b"LREM", &[count.as_bytes(), value.as_ref()])?
            .into_u64()
    }

    /// LTRIM. Keeps only the elements from `start` to `stop` inclusive.
    pub fn trim(&self, start: i64, stop: i64) -> RtResult<()> {
        let (start, stop) = (IntArg::from(start), IntArg::from(stop));
        self.key
            .command(b"LTRIM", &[start.as_bytes(), stop.as_bytes()])?
            .into_ok()
    }

    /// Callers currently blocked on another caller's coalesced read.
    #[doc(hidden)]
    pub fn coalesced_waiters(&self) -> usize {
        self.ranges.total_waiters() + self.lengths.total_waiters()
    }

    fn push<V: AsRef<[u8]>>(&self, verb: &[u8], values: &[V]) -> RtResult<u64> {
        if values.is_empty() {
            return Err(RtError::Argument("push needs at least one value"));
        }
        let values: Vec<&[u8]> = values.iter().map(AsRef::as_ref).collect();
        self.key.command(verb, &values)?.into_u64()
    }
}

impl Keyed for List {
    fn key(&self) -> &Key {
        &self.key
    }
}
