//! # Client Configuration
//!
//! The endpoint comes from one value, `RTYPES_ADDR`, falling back to
//! `127.0.0.1:6379`. Socket timeouts are optional and expressed in
//! milliseconds so the JSON form stays readable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rtypes_common::{RtError, RtResult};

/// Environment variable selecting the remote endpoint.
pub const ADDR_ENV: &str = "RTYPES_ADDR";

/// Endpoint used when neither the environment nor the caller names one.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Configuration for the shared TCP connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address as host:port, e.g. "127.0.0.1:6379" or "redis:6379".
    pub addr: String,
    /// Optional TCP read timeout. Blocking pops extend it by their own wait,
    /// and lift it entirely for a zero (indefinite) wait.
    pub read_timeout_ms: Option<u64>,
    /// Optional TCP write timeout.
    pub write_timeout_ms: Option<u64>,
    /// Optional TCP connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: DEFAULT_ADDR.to_string(),
            read_timeout_ms: None,
            write_timeout_ms: None,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `addr`.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        }
    }

    /// Default configuration, with the address taken from `RTYPES_ADDR` when set.
    pub fn from_env() -> Self {
        match std::env::var(ADDR_ENV) {
            Ok(addr) if !addr.trim().is_empty() => ClientConfig::with_addr(addr.trim()),
            _ => ClientConfig::default(),
        }
    }

    /// Parses a JSON document; absent fields keep their defaults.
    ///
    /// Parse failures keep serde_json's message, including line and column.
    pub fn from_json(json: &str) -> RtResult<Self> {
        serde_json::from_str(json).map_err(|err| RtError::Config(err.to_string()))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}
