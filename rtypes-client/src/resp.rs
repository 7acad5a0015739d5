//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and parse server replies, then convert
//! replies into the shapes each command promises.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are raw bytes, kept as `Bytes` so replies
//!    can be shared between coalesced callers without copying.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use std::io::BufRead;

use bytes::Bytes;

use rtypes_common::{RtError, RtResult};

/// Largest bulk string accepted from the server (`proto-max-bulk-len`, 512 MiB).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Bytes>),
    /// *... arrays, with None for the null array (blocking pop timeouts).
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Maps an error reply to `RtError::Remote`, passing anything else through.
    pub fn into_result(self) -> RtResult<RespValue> {
        match self {
            RespValue::Error(message) => Err(remote_error(message)),
            other => Ok(other),
        }
    }

    /// Accepts a `+OK` style status reply.
    pub fn into_ok(self) -> RtResult<()> {
        match self.into_result()? {
            RespValue::Simple(_) => Ok(()),
            _ => Err(RtError::UnexpectedResponse("status reply")),
        }
    }

    /// Integer reply interpreted as a boolean flag.
    pub fn into_bool(self) -> RtResult<bool> {
        match self.into_result()? {
            RespValue::Integer(value) => Ok(value != 0),
            _ => Err(RtError::UnexpectedResponse("integer reply")),
        }
    }

    /// Integer reply, signed.
    pub fn into_i64(self) -> RtResult<i64> {
        match self.into_result()? {
            RespValue::Integer(value) => Ok(value),
            _ => Err(RtError::UnexpectedResponse("integer reply")),
        }
    }

    /// Integer reply that must not be negative.
    pub fn into_u64(self) -> RtResult<u64> {
        match self.into_result()? {
            RespValue::Integer(value) if value >= 0 => Ok(value as u64),
            _ => Err(RtError::UnexpectedResponse("non-negative integer reply")),
        }
    }

    /// Bulk string reply; `None` for the null bulk string.
    pub fn into_bulk(self) -> RtResult<Option<Bytes>> {
        match self.into_result()? {
            RespValue::Bulk(data) => Ok(data),
            RespValue::Array(None) => Ok(None),
            _ => Err(RtError::UnexpectedResponse("bulk reply")),
        }
    }

    /// Array of bulk strings. A null array decodes as empty.
    pub fn into_bulk_array(self) -> RtResult<Vec<Bytes>> {
        match self.into_result()? {
            RespValue::Array(None) => Ok(Vec::new()),
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(data)) => Ok(data),
                    _ => Err(RtError::UnexpectedResponse("array of bulk strings")),
                })
                .collect(),
            _ => Err(RtError::UnexpectedResponse("array reply")),
        }
    }

    /// `[key, value]` reply of BLPOP/BRPOP; `None` when the server timed out.
    pub fn into_popped(self) -> RtResult<Option<Bytes>> {
        match self.into_result()? {
            RespValue::Array(None) => Ok(None),
            RespValue::Array(Some(items)) => {
                let mut items = items.into_iter();
                match (items.next(), items.next(), items.next()) {
                    (Some(RespValue::Bulk(Some(_))), Some(RespValue::Bulk(Some(value))), None) => {
                        Ok(Some(value))
                    }
                    _ => Err(RtError::UnexpectedResponse("[key, value] pair")),
                }
            }
            _ => Err(RtError::UnexpectedResponse("[key, value] pair")),
        }
    }
}

fn remote_error(message: Vec<u8>) -> RtError {
    RtError::Remote(String::from_utf8_lossy(&message).into_owned())
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one RESP value from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> RtResult<RespValue> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(RtError::Protocol("empty reply line"));
    }

    match line_buf[0] {
        b'+' => Ok(RespValue::Simple(line_buf[1..].to_vec())),
        b'-' => Ok(RespValue::Error(line_buf[1..].to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_bulk_len(reader, len, line_buf)
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_array_len(reader, len, line_buf)
        }
        _ => Err(RtError::Protocol("unknown reply type")),
    }
}

fn parse_bulk_len<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> RtResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }
    // The length comes from the peer; never allocate more than the server may send.
    if len > MAX_BULK_LEN {
        return Err(RtError::Protocol("bulk length exceeds limit"));
    }
    let len = len as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(RtError::Protocol("bulk string missing CRLF"));
    }

    line_buf.clear();
    Ok(RespValue::Bulk(Some(Bytes::from(data))))
}

fn parse_array_len<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> RtResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Array(None));
    }

    // Cap the preallocation; the length comes from the peer.
    let mut items = Vec::with_capacity((len as usize).min(1024));
    for _ in 0..len {
        items.push(read_response(reader, line_buf)?);
    }
    Ok(RespValue::Array(Some(items)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> RtResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(RtError::Protocol("connection closed by server"));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(RtError::Protocol("reply line missing CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> RtResult<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(RtError::Protocol("empty integer"));
    }

    // Accumulate toward the sign so i64::MIN parses without overflow.
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RtError::Protocol("invalid integer"));
        }
        let digit = i64::from(b - b'0');
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or(RtError::Protocol("integer out of range"))?;
    }
    Ok(value)
}

fn push_usize(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(IntArg::from(value as u64).as_bytes());
}

/// Decimal rendering of an integer command argument.
///
/// Digits live in a small stack buffer so numeric arguments stay
/// allocation-free.
#[derive(Clone, Copy)]
pub struct IntArg {
    buf: [u8; 20],
    start: usize,
}

impl IntArg {
    /// Digits as a byte slice suitable for `encode_command`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    fn render(negative: bool, mut magnitude: u64) -> Self {
        let mut buf = [0u8; 20];
        let mut start = buf.len();
        loop {
            start -= 1;
            buf[start] = b'0' + (magnitude % 10) as u8;
            magnitude /= 10;
            if magnitude == 0 {
                break;
            }
        }
        if negative {
            start -= 1;
            buf[start] = b'-';
        }
        IntArg { buf, start }
    }
}

impl From<u64> for IntArg {
    fn from(value: u64) -> Self {
        IntArg::render(false, value)
    }
}

impl From<i64> for IntArg {
    fn from(value: i64) -> Self {
        IntArg::render(value < 0, value.unsigned_abs())
    }
}
