//! # RemoteTypes Client
//!
//! Purpose: Expose lists, sets, and HyperLogLogs stored in a Redis-compatible
//! server as local typed handles sharing one blocking connection.
//!
//! ## Design Principles
//! 1. **Composition**: Every handle wraps a `Key`; `Keyed` exposes it.
//! 2. **Single-Flight Reads**: Identical concurrent reads on one handle share
//!    a single request (`singleflight::Group`).
//! 3. **Exact Durations**: Expiry and blocking timeouts are quantized without
//!    rounding; lossy durations fail before any I/O.
//! 4. **Protocol Clarity**: RESP2 is encoded and parsed explicitly.
//!
//! ## Example
//!
//! ```no_run
//! use rtypes_client::{Client, Keyed};
//!
//! # fn main() -> rtypes_client::RtResult<()> {
//! let client = Client::from_env()?;
//! let visitors = client.hyperloglog("visitors");
//! visitors.add(&["alice", "bob"])?;
//! println!("{} ~ {}", visitors.name(), visitors.count()?);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod hyperloglog;
mod key;
mod list;
mod resp;
mod set;
pub mod singleflight;

pub use client::Client;
pub use config::{ClientConfig, ADDR_ENV, DEFAULT_ADDR};
pub use connection::{Connection, TcpConnection};
pub use hyperloglog::HyperLogLog;
pub use key::{Key, KeyTtl, Keyed};
pub use list::{List, Position};
pub use resp::{IntArg, RespValue};
pub use rtypes_common::{Expiry, Granularity, RtError, RtResult};
pub use set::Set;
