//! # Remote HyperLogLog
//!
//! Purpose: Probabilistic unique counting backed by the server's HyperLogLog
//! commands. Registers and estimates live entirely on the server.
//!
//! ## Design Principles
//! 1. **Adds Always Run**: `add` is a mutation and is never coalesced.
//! 2. **Coalesced Count**: `count` takes no arguments, so one fixed signature
//!    per handle collapses every concurrent call.
//! 3. **Coalesced Merge**: `merge` keys its wave on the destination and the
//!    other source, so only identical merges share a request and every caller
//!    gets the same new handle.

use std::sync::Arc;

use rtypes_common::{RtError, RtResult};

use crate::connection::Connection;
use crate::key::{Key, Keyed};
use crate::singleflight::Group;

const COUNT_SIGNATURE: &str = "PFCOUNT";

/// Handle to a remote HyperLogLog.
pub struct HyperLogLog {
    key: Key,
    counts: Group<u64>,
    merges: Group<Arc<HyperLogLog>>,
}

impl HyperLogLog {
    /// Creates a handle for the HyperLogLog at `name`. No I/O happens.
    pub fn new(conn: Arc<dyn Connection>, name: impl Into<String>) -> Self {
        HyperLogLog {
            key: Key::new(conn, name),
            counts: Group::new(),
            merges: Group::new(),
        }
    }

    /// PFADD. True when at least one internal register changed, i.e. at
    /// least one item was probably new.
    pub fn add<V: AsRef<[u8]>>(&self, items: &[V]) -> RtResult<bool> {
        if items.is_empty() {
            return Err(RtError::Argument("add needs at least one item"));
        }
        let items: Vec<&[u8]> = items.iter().map(AsRef::as_ref).collect();
        self.key.command(b"PFADD", &items)?.into_bool()
    }

    /// PFCOUNT. Estimated number of unique items, 0 for a missing key.
    pub fn count(&self) -> RtResult<u64> {
        self.counts.run(COUNT_SIGNATURE, || {
            self.key.command(b"PFCOUNT", &[])?.into_u64()
        })
    }

    /// PFMERGE. Writes the union of this HyperLogLog and `other` to `name`
    /// and returns a handle to it on the same connection.
    pub fn merge(&self, name: &str, other: &HyperLogLog) -> RtResult<Arc<HyperLogLog>> {
        let other_name = other.name();
        let signature = merge_signature(name, &other_name);
        self.merges.run(&signature, || {
            let source = self.name();
            self.key
                .connection()
                .exec(&[
                    b"PFMERGE",
                    name.as_bytes(),
                    source.as_bytes(),
                    other_name.as_bytes(),
                ])?
                .into_ok()?;
            Ok(Arc::new(HyperLogLog::new(
                Arc::clone(self.key.connection()),
                name,
            )))
        })
    }

    /// Callers currently blocked on another caller's coalesced read or merge.
    #[doc(hidden)]
    pub fn coalesced_waiters(&self) -> usize {
        self.counts.total_waiters() + self.merges.total_waiters()
    }
}

/// Length-prefixes the destination so `("a:b", "c")` and `("a", "b:c")`
/// never share a wave.
fn merge_signature(destination: &str, other: &str) -> String {
    format!("PFMERGE:{}:{destination}:{other}", destination.len())
}

impl Keyed for HyperLogLog {
    fn key(&self) -> &Key {
        &self.key
    }
}
