#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use rtypes_client::{Client, ClientConfig, Connection, RespValue, RtResult};

type Handler = dyn Fn(&[Vec<u8>]) -> RtResult<RespValue> + Send + Sync;

/// In-process connection that records every command and answers from a closure.
///
/// Unlike `TcpConnection` it does not serialize callers, so a handler can
/// block one request while others arrive.
pub struct ScriptedConnection {
    handler: Box<Handler>,
    log: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl ScriptedConnection {
    pub fn new(
        handler: impl Fn(&[Vec<u8>]) -> RtResult<RespValue> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(ScriptedConnection {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Commands seen so far, rendered as strings.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.log
            .lock()
            .iter()
            .map(|args| {
                args.iter()
                    .map(|arg| String::from_utf8_lossy(arg).into_owned())
                    .collect()
            })
            .collect()
    }

    /// How many commands used `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|args| args.first().map(|v| v.as_slice()) == Some(verb.as_bytes()))
            .count()
    }

    pub fn client(self: &Arc<Self>) -> Client {
        let conn: Arc<dyn Connection> = self.clone();
        Client::from_connection(conn)
    }
}

impl Connection for ScriptedConnection {
    fn exec(&self, args: &[&[u8]]) -> RtResult<RespValue> {
        let owned: Vec<Vec<u8>> = args.iter().map(|arg| arg.to_vec()).collect();
        self.log.lock().push(owned.clone());
        (self.handler)(&owned)
    }
}

/// Holds scripted replies until the test opens it.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Gate::default())
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

/// Runs `call` on `callers` threads while `gate` holds the leader's request,
/// opening it once the other callers are parked on the coalesced wave
/// (`waiting() == callers - 1`).
pub fn run_coalesced<T: Send>(
    callers: usize,
    gate: &Gate,
    waiting: impl Fn() -> usize,
    call: impl Fn() -> RtResult<T> + Sync,
) -> Vec<RtResult<T>> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let call = &call;
                scope.spawn(move || call())
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(5);
        while waiting() < callers - 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let joined = waiting();
        // Open before asserting so no thread is left parked on the gate.
        gate.open();
        assert_eq!(joined, callers - 1, "callers never joined one wave");

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

pub fn ok() -> RtResult<RespValue> {
    Ok(RespValue::Simple(b"OK".to_vec()))
}

pub fn int(value: i64) -> RtResult<RespValue> {
    Ok(RespValue::Integer(value))
}

pub fn bulk(data: &str) -> RtResult<RespValue> {
    Ok(RespValue::Bulk(Some(Bytes::copy_from_slice(data.as_bytes()))))
}

pub fn nil() -> RtResult<RespValue> {
    Ok(RespValue::Bulk(None))
}

pub fn array(items: &[&str]) -> RtResult<RespValue> {
    Ok(RespValue::Array(Some(
        items
            .iter()
            .map(|item| RespValue::Bulk(Some(Bytes::copy_from_slice(item.as_bytes()))))
            .collect(),
    )))
}

pub fn server_error(message: &str) -> RtResult<RespValue> {
    Ok(RespValue::Error(message.as_bytes().to_vec()))
}

pub fn strings(values: &[Bytes]) -> Vec<String> {
    values
        .iter()
        .map(|value| String::from_utf8_lossy(value).into_owned())
        .collect()
}

/// Key name unique to this process and call, so parallel tests never share keys.
pub fn unique_key(prefix: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or(0);
    format!(
        "rtypes-test:{prefix}:{}:{nanos}:{}",
        process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

/// Routes `tracing` output through the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock RESP2 server: accepts one connection and hands `expected_commands`
/// parsed commands to `handler`, which writes raw replies.
pub fn spawn_server(
    expected_commands: usize,
    handler: fn(usize, Vec<Vec<u8>>, &mut TcpStream),
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    addr
}

pub fn client_with_addr(addr: String) -> Client {
    client_with_read_timeout(addr, 5_000)
}

pub fn client_with_read_timeout(addr: String, read_timeout_ms: u64) -> Client {
    let config = ClientConfig {
        addr,
        read_timeout_ms: Some(read_timeout_ms),
        write_timeout_ms: Some(1_000),
        connect_timeout_ms: Some(1_000),
    };
    Client::with_config(config).expect("client")
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "length"))
}

pub fn write_raw(stream: &mut TcpStream, raw: &[u8]) {
    let _ = stream.write_all(raw);
    let _ = stream.flush();
}

pub fn write_simple(stream: &mut TcpStream, msg: &str) {
    write_raw(stream, format!("+{msg}\r\n").as_bytes());
}

pub fn write_error(stream: &mut TcpStream, msg: &str) {
    write_raw(stream, format!("-{msg}\r\n").as_bytes());
}

pub fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let mut buf = format!("${}\r\n", data.len()).into_bytes();
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    write_raw(stream, &buf);
}

pub fn write_integer(stream: &mut TcpStream, value: i64) {
    write_raw(stream, format!(":{value}\r\n").as_bytes());
}

pub fn write_bulk_array(stream: &mut TcpStream, items: &[&[u8]]) {
    let mut buf = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        buf.extend_from_slice(format!("${}\r\n", item.len()).as_bytes());
        buf.extend_from_slice(item);
        buf.extend_from_slice(b"\r\n");
    }
    write_raw(stream, &buf);
}
