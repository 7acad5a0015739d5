//! # Client Facade
//!
//! Purpose: Open the shared connection from configuration and hand out typed
//! handles that all issue commands over it.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides connection setup and RESP details.
//! 2. **Shared, Not Owned**: Handles hold an `Arc` to the connection; dropping
//!    the client does not invalidate handles already created.
//! 3. **One Connection**: No pooling. Callers needing parallel blocking pops
//!    create a second `Client`.

use std::sync::Arc;

use bytes::Bytes;

use rtypes_common::{RtError, RtResult};

use crate::config::ClientConfig;
use crate::connection::{Connection, TcpConnection};
use crate::hyperloglog::HyperLogLog;
use crate::key::Key;
use crate::list::List;
use crate::resp::RespValue;
use crate::set::Set;

/// Entry point: one connection, many handles.
#[derive(Clone)]
pub struct Client {
    conn: Arc<dyn Connection>,
}

impl Client {
    /// Connects to `addr` with default timeouts.
    pub fn connect(addr: impl Into<String>) -> RtResult<Self> {
        Self::with_config(ClientConfig::with_addr(addr))
    }

    /// Connects to the endpoint named by `RTYPES_ADDR`, or the default.
    pub fn from_env() -> RtResult<Self> {
        Self::with_config(ClientConfig::from_env())
    }

    /// Connects with a custom configuration.
    pub fn with_config(config: ClientConfig) -> RtResult<Self> {
        let conn = TcpConnection::connect(&config)?;
        Ok(Client {
            conn: Arc::new(conn),
        })
    }

    /// Wraps an existing connection, e.g. a scripted one in tests.
    pub fn from_connection(conn: Arc<dyn Connection>) -> Self {
        Client { conn }
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Untyped handle for key lifecycle operations.
    pub fn key(&self, name: impl Into<String>) -> Key {
        Key::new(Arc::clone(&self.conn), name)
    }

    pub fn list(&self, name: impl Into<String>) -> List {
        List::new(Arc::clone(&self.conn), name)
    }

    pub fn set(&self, name: impl Into<String>) -> Set {
        Set::new(Arc::clone(&self.conn), name)
    }

    pub fn hyperloglog(&self, name: impl Into<String>) -> HyperLogLog {
        HyperLogLog::new(Arc::clone(&self.conn), name)
    }

    /// Pings the server. Returns the raw reply payload.
    pub fn ping(&self, payload: Option<&[u8]>) -> RtResult<Bytes> {
        let response = match payload {
            Some(data) => self.conn.exec(&[b"PING", data])?,
            None => self.conn.exec(&[b"PING"])?,
        };
        match response.into_result()? {
            RespValue::Simple(text) => Ok(Bytes::from(text)),
            RespValue::Bulk(Some(data)) => Ok(data),
            _ => Err(RtError::UnexpectedResponse("PONG or echoed payload")),
        }
    }
}
