mod support;

use std::thread;
use std::time::{Duration, Instant};

use rtypes_client::{Client, Keyed, RtError};

use support::{
    client_with_addr, client_with_read_timeout, init_tracing, spawn_server, strings, write_bulk,
    write_bulk_array, write_error, write_integer, write_raw, write_simple,
};

#[test]
fn ping_roundtrip() {
    init_tracing();
    let addr = spawn_server(2, |idx, args, stream| match idx {
        0 => {
            assert_eq!(args, vec![b"PING".to_vec()]);
            write_simple(stream, "PONG");
        }
        1 => {
            assert_eq!(args, vec![b"PING".to_vec(), b"hello".to_vec()]);
            write_bulk(stream, b"hello");
        }
        _ => {}
    });

    let client = client_with_addr(addr);
    assert_eq!(client.ping(None).unwrap().as_ref(), b"PONG");
    assert_eq!(client.ping(Some(b"hello".as_slice())).unwrap().as_ref(), b"hello");
}

#[test]
fn list_commands_over_tcp() {
    init_tracing();
    let addr = spawn_server(3, |idx, args, stream| match idx {
        0 => {
            assert_eq!(args[0], b"RPUSH");
            write_integer(stream, (args.len() - 2) as i64);
        }
        1 => {
            assert_eq!(args, vec![b"LRANGE".to_vec(), b"jobs".to_vec(), b"0".to_vec(), b"-1".to_vec()]);
            write_bulk_array(stream, &[b"a", b"b", b"c"]);
        }
        2 => {
            assert_eq!(args[0], b"LLEN");
            write_integer(stream, 3);
        }
        _ => {}
    });

    let client = client_with_addr(addr);
    let jobs = client.list("jobs");
    assert_eq!(jobs.right_push(&["a", "b", "c"]).unwrap(), 3);
    assert_eq!(strings(&jobs.range(0, -1).unwrap()), vec!["a", "b", "c"]);
    assert_eq!(jobs.length().unwrap(), 3);
}

#[test]
fn server_error_keeps_connection_usable() {
    init_tracing();
    let addr = spawn_server(2, |idx, _args, stream| match idx {
        0 => write_error(stream, "WRONGTYPE Operation against a key holding the wrong kind of value"),
        1 => write_integer(stream, 2),
        _ => {}
    });

    let client = client_with_addr(addr);
    let tags = client.set("tags");
    let err = tags.cardinality().unwrap_err();
    assert!(err.is_remote());
    assert!(!err.is_transport());
    assert_eq!(tags.cardinality().unwrap(), 2);
}

#[test]
fn blocking_pop_waits_for_reply() {
    init_tracing();
    let addr = spawn_server(2, |idx, args, stream| match idx {
        0 => {
            assert_eq!(args, vec![b"BLPOP".to_vec(), b"jobs".to_vec(), b"1".to_vec()]);
            thread::sleep(Duration::from_millis(200));
            write_bulk_array(stream, &[b"jobs", b"payload"]);
        }
        1 => {
            assert_eq!(args[0], b"BRPOP");
            write_raw(stream, b"*-1\r\n");
        }
        _ => {}
    });

    let client = client_with_addr(addr);
    let jobs = client.list("jobs");
    let started = Instant::now();
    let value = jobs.blocking_left_pop(Duration::from_secs(1)).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(value.as_deref(), Some(b"payload".as_slice()));
    assert_eq!(jobs.blocking_right_pop(Duration::from_secs(1)).unwrap(), None);
}

#[test]
fn blocking_pops_outlast_the_socket_read_timeout() {
    init_tracing();
    let addr = spawn_server(5, |idx, args, stream| {
        thread::sleep(Duration::from_millis(300));
        match idx {
            0 => {
                assert_eq!(args[2], b"1");
                write_bulk_array(stream, &[b"jobs", b"first"]);
            }
            1 => {
                assert_eq!(args[2], b"0");
                write_bulk_array(stream, &[b"jobs", b"second"]);
            }
            2 => write_raw(stream, b"*-1\r\n"),
            3 => write_raw(stream, b"$-1\r\n"),
            // Ordinary commands still honor the configured timeout.
            _ => write_integer(stream, 1),
        }
    });

    let client = client_with_read_timeout(addr, 100);
    let jobs = client.list("jobs");
    let other = client.list("other");

    let first = jobs.blocking_left_pop(Duration::from_secs(1)).unwrap();
    assert_eq!(first.as_deref(), Some(b"first".as_slice()));
    let second = jobs.blocking_right_pop(Duration::ZERO).unwrap();
    assert_eq!(second.as_deref(), Some(b"second".as_slice()));
    assert_eq!(jobs.blocking_left_pop(Duration::from_secs(1)).unwrap(), None);
    assert_eq!(
        jobs.blocking_right_pop_left_push(&other, Duration::from_secs(1))
            .unwrap(),
        None
    );

    let err = jobs.key().exists().unwrap_err();
    assert!(matches!(err, RtError::Io(_)), "unexpected error: {err:?}");
}

#[test]
fn merge_over_tcp_returns_destination_handle() {
    init_tracing();
    let addr = spawn_server(2, |idx, args, stream| match idx {
        0 => {
            assert_eq!(
                args,
                vec![b"PFMERGE".to_vec(), b"all".to_vec(), b"mon".to_vec(), b"tue".to_vec()]
            );
            write_simple(stream, "OK");
        }
        1 => {
            assert_eq!(args, vec![b"PFCOUNT".to_vec(), b"all".to_vec()]);
            write_integer(stream, 5);
        }
        _ => {}
    });

    let client = client_with_addr(addr);
    let monday = client.hyperloglog("mon");
    let tuesday = client.hyperloglog("tue");
    let all = monday.merge("all", &tuesday).unwrap();
    assert_eq!(all.name(), "all");
    assert_eq!(all.count().unwrap(), 5);
}

#[test]
fn closed_connection_fails_fast() {
    init_tracing();
    // Reads one command and hangs up without replying.
    let addr = spawn_server(1, |_, _, _| {});

    let client = client_with_addr(addr);
    let key = client.key("gone");
    let err = key.exists().unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err:?}");
    assert!(matches!(key.exists(), Err(RtError::ConnectionBroken)));
}

#[test]
fn unresolvable_address_is_rejected() {
    let err = Client::connect("not an address").err().unwrap();
    assert!(matches!(err, RtError::InvalidAddress(_)));
}
