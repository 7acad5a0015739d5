//! # Key Handle
//!
//! Purpose: Lifecycle operations every remote type supports (existence,
//! deletion, expiry, rename), independent of the value stored at the key.
//!
//! ## Design Principles
//! 1. **Composition**: `List`, `Set`, and `HyperLogLog` each hold a `Key` and
//!    expose it through `Keyed`; there is no type hierarchy.
//! 2. **Quantize Before I/O**: Expiry durations are validated before a command
//!    is built, so lossy durations never reach the server.
//! 3. **Rename Tracks Success**: The local name follows the remote key only
//!    after the server confirms the rename.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use rtypes_common::{whole_millis, Expiry, RtError, RtResult};

use crate::connection::Connection;
use crate::resp::{IntArg, RespValue};

/// TTL state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Base capability shared by every typed handle.
pub trait Keyed {
    /// The underlying key handle.
    fn key(&self) -> &Key;

    /// Current name of the key in the remote store.
    fn name(&self) -> String {
        self.key().name()
    }
}

/// Handle to one named key in the remote store.
pub struct Key {
    conn: Arc<dyn Connection>,
    name: RwLock<String>,
}

impl Key {
    /// Creates a handle for `name` on the shared connection. No I/O happens.
    pub fn new(conn: Arc<dyn Connection>, name: impl Into<String>) -> Self {
        Key {
            conn,
            name: RwLock::new(name.into()),
        }
    }

    /// Current key name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Shared connection this handle issues commands on.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Issues `verb name extra...` and returns the raw reply.
    pub(crate) fn command(&self, verb: &[u8], extra: &[&[u8]]) -> RtResult<RespValue> {
        let name = self.name();
        self.conn.exec(&key_args(verb, &name, extra))
    }

    /// Like `command`, for commands the server may hold for up to `wait`.
    pub(crate) fn blocking_command(
        &self,
        verb: &[u8],
        extra: &[&[u8]],
        wait: Duration,
    ) -> RtResult<RespValue> {
        let name = self.name();
        self.conn.exec_blocking(&key_args(verb, &name, extra), wait)
    }

    /// EXISTS. True when the key is present.
    pub fn exists(&self) -> RtResult<bool> {
        self.command(b"EXISTS", &[])?.into_bool()
    }

    /// DEL. True when a key was removed.
    pub fn delete(&self) -> RtResult<bool> {
        self.command(b"DEL", &[])?.into_bool()
    }

    /// Sets a timeout after which the server deletes the key.
    ///
    /// Whole-second durations are sent with EXPIRE, whole-millisecond ones with
    /// PEXPIRE. Anything finer fails with `PrecisionLoss` before any I/O.
    /// Returns true when the key exists and the timeout was set.
    pub fn expire(&self, timeout: Duration) -> RtResult<bool> {
        match Expiry::from_duration(timeout)? {
            Expiry::Seconds(secs) => {
                let secs = IntArg::from(secs);
                self.command(b"EXPIRE", &[secs.as_bytes()])?.into_bool()
            }
            Expiry::Milliseconds(millis) => {
                let millis = IntArg::from(millis);
                self.command(b"PEXPIRE", &[millis.as_bytes()])?.into_bool()
            }
        }
    }

    /// PEXPIRE. Like `expire`, but always millisecond precision.
    pub fn pexpire(&self, timeout: Duration) -> RtResult<bool> {
        let millis = IntArg::from(whole_millis(timeout)?);
        self.command(b"PEXPIRE", &[millis.as_bytes()])?.into_bool()
    }

    /// PERSIST. True when a timeout existed and was removed.
    pub fn persist(&self) -> RtResult<bool> {
        self.command(b"PERSIST", &[])?.into_bool()
    }

    /// PTTL. Remaining time to live at millisecond precision.
    pub fn ttl(&self) -> RtResult<KeyTtl> {
        match self.command(b"PTTL", &[])?.into_i64()? {
            -2 => Ok(KeyTtl::Missing),
            -1 => Ok(KeyTtl::NoExpiry),
            millis if millis >= 0 => Ok(KeyTtl::ExpiresIn(Duration::from_millis(millis as u64))),
            _ => Err(RtError::UnexpectedResponse("TTL of -2, -1, or >= 0")),
        }
    }

    /// RENAME. Overwrites `new_name` if it exists; fails if this key does not.
    pub fn rename(&self, new_name: &str) -> RtResult<()> {
        // Hold the write lock so no command is built with a stale name.
        let mut name = self.name.write();
        self.conn
            .exec(&[b"RENAME", name.as_bytes(), new_name.as_bytes()])?
            .into_ok()?;
        debug!(from = name.as_str(), to = new_name, "renamed key");
        *name = new_name.to_string();
        Ok(())
    }

    /// RENAMENX. Renames only when `new_name` does not exist yet; returns
    /// whether the rename happened.
    pub fn rename_nx(&self, new_name: &str) -> RtResult<bool> {
        let mut name = self.name.write();
        let renamed = self
            .conn
            .exec(&[b"RENAMENX", name.as_bytes(), new_name.as_bytes()])?
            .into_bool()?;
        if renamed {
            debug!(from = name.as_str(), to = new_name, "renamed key");
            *name = new_name.to_string();
        }
        Ok(renamed)
    }
}

fn key_args<'a>(verb: &'a [u8], name: &'a str, extra: &[&'a [u8]]) -> Vec<&'a [u8]> {
    let mut args: Vec<&[u8]> = Vec::with_capacity(extra.len() + 2);
    args.push(verb);
    args.push(name.as_bytes());
    args.extend_from_slice(extra);
    args
}

impl Keyed for Key {
    fn key(&self) -> &Key {
        self
    }
}
