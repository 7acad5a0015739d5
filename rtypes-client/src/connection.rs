//! # Shared Connection
//!
//! Purpose: Carry one request/reply exchange at a time to the remote store
//! over a single TCP stream shared by every handle.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: Handles talk to `dyn Connection`, so tests can
//!    substitute scripted replies for the TCP stream.
//! 2. **Serialized Wire**: A mutex guards the stream; requests from concurrent
//!    callers never interleave on the wire.
//! 3. **Fail Fast**: A transport failure marks the stream broken instead of
//!    reading a half-consumed reply on the next call.
//! 4. **Buffer Reuse**: The stream keeps its own encode/parse buffers.
//! 5. **Server-Timed Blocking**: Blocking commands widen the socket read
//!    timeout so only the server decides when a wait ends.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use rtypes_common::{RtError, RtResult};

use crate::config::ClientConfig;
use crate::resp::{encode_command, read_response, RespValue};

/// A blocking request/reply channel to the remote store.
///
/// `args[0]` is the command verb; the rest are its ordered arguments.
/// Implementations must serialize concurrent callers.
pub trait Connection: Send + Sync {
    fn exec(&self, args: &[&[u8]]) -> RtResult<RespValue>;

    /// Runs a command the server may hold for up to `wait` before replying
    /// (zero means indefinitely), such as BLPOP.
    ///
    /// Socket read timeouts must not cut the server's own wait short.
    fn exec_blocking(&self, args: &[&[u8]], wait: Duration) -> RtResult<RespValue> {
        let _ = wait;
        self.exec(args)
    }
}

/// Single TCP connection with reusable buffers.
pub struct TcpConnection {
    addr: SocketAddr,
    read_timeout: Option<Duration>,
    wire: Mutex<Wire>,
}

struct Wire {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
    // Cleared after any IO/protocol failure; the stream may hold a partial reply.
    healthy: bool,
}

impl TcpConnection {
    /// Dials the configured endpoint.
    pub fn connect(config: &ClientConfig) -> RtResult<Self> {
        let (stream, addr) = connect_stream(config)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        debug!(%addr, "connected");

        Ok(TcpConnection {
            addr,
            read_timeout: config.read_timeout(),
            wire: Mutex::new(Wire {
                reader: BufReader::new(stream),
                line_buf: Vec::with_capacity(128),
                write_buf: Vec::with_capacity(256),
                healthy: true,
            }),
        })
    }

    /// Address the stream is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    fn exec_locked(&self, wire: &mut Wire, args: &[&[u8]]) -> RtResult<RespValue> {
        if !wire.healthy {
            return Err(RtError::ConnectionBroken);
        }
        if let Some(verb) = args.first() {
            trace!(command = %String::from_utf8_lossy(verb), args = args.len() - 1, "exec");
        }

        let response = wire.roundtrip(args);
        if let Err(err) = &response {
            if err.is_transport() {
                debug!(addr = %self.addr, error = %err, "connection marked broken");
                wire.healthy = false;
            }
        }
        response
    }
}

impl Connection for TcpConnection {
    fn exec(&self, args: &[&[u8]]) -> RtResult<RespValue> {
        let mut wire = self.wire.lock();
        self.exec_locked(&mut wire, args)
    }

    fn exec_blocking(&self, args: &[&[u8]], wait: Duration) -> RtResult<RespValue> {
        let Some(configured) = self.read_timeout else {
            return self.exec(args);
        };
        // Zero waits forever server-side; otherwise the configured timeout
        // becomes a grace period on top of the server's wait.
        let extended = if wait.is_zero() {
            None
        } else {
            Some(wait.saturating_add(configured))
        };

        let mut wire = self.wire.lock();
        if !wire.healthy {
            return Err(RtError::ConnectionBroken);
        }
        if let Err(err) = wire.reader.get_ref().set_read_timeout(extended) {
            wire.healthy = false;
            return Err(err.into());
        }
        let response = self.exec_locked(&mut wire, args);
        if let Err(err) = wire.reader.get_ref().set_read_timeout(Some(configured)) {
            debug!(addr = %self.addr, error = %err, "connection marked broken");
            wire.healthy = false;
            return Err(err.into());
        }
        response
    }
}

impl Wire {
    fn roundtrip(&mut self, args: &[&[u8]]) -> RtResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(config: &ClientConfig) -> RtResult<(TcpStream, SocketAddr)> {
    let addrs: Vec<SocketAddr> = config
        .addr
        .to_socket_addrs()
        .map_err(|_| RtError::InvalidAddress(config.addr.clone()))?
        .collect();
    if addrs.is_empty() {
        return Err(RtError::InvalidAddress(config.addr.clone()));
    }

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok((stream, addr)),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.map_or_else(|| RtError::InvalidAddress(config.addr.clone()), RtError::from))
}
