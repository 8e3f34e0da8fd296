//! Server Tests
//!
//! A real server on a loopback port, driven by a plain blocking socket.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dax::protocol::{
    encode, read_message, write_message, Message, Operation, Status, HEADER_SIZE,
};
use dax::{Config, Engine, Result, Server, ServerHandle};

struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    thread: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        let config = Config::builder()
            .listen_addr("127.0.0.1:0")
            .poll_interval_ms(50)
            .build();
        let mut server = Server::bind(config, Arc::new(Engine::new())).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            handle,
            thread: Some(thread),
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    fn stop(mut self) -> Result<()> {
        self.handle.shutdown();
        self.thread.take().unwrap().join().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.handle.shutdown();
            let _ = thread.join();
        }
    }
}

fn roundtrip(stream: &mut TcpStream, request: Message) -> Message {
    write_message(stream, &request).unwrap();
    read_message(stream).unwrap()
}

// =============================================================================
// Request Handling
// =============================================================================

#[test]
fn test_add_get_delete_cycle() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let reply = roundtrip(&mut stream, Message::add(b"k1".to_vec(), b"abc".to_vec()));
    assert_eq!(reply.operation, Operation::Response);
    assert_eq!(reply.status, Some(Status::Ok));
    assert_eq!(reply.key, b"k1");

    let reply = roundtrip(&mut stream, Message::get(b"k1".to_vec()));
    assert_eq!(reply, Message::ok(b"k1".to_vec(), b"abc".to_vec()));

    let reply = roundtrip(&mut stream, Message::remove(b"k1".to_vec()));
    assert_eq!(reply.status, Some(Status::Ok));

    let reply = roundtrip(&mut stream, Message::get(b"k1".to_vec()));
    assert_eq!(reply, Message::not_found(b"k1".to_vec()));

    let reply = roundtrip(&mut stream, Message::remove(b"k1".to_vec()));
    assert_eq!(reply.status, Some(Status::NotFound));

    server.stop().unwrap();
}

#[test]
fn test_heartbeat_echoes_token() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let reply = roundtrip(&mut stream, Message::heartbeat());
    assert_eq!(reply.status, Some(Status::Ok));
    assert_eq!(reply.key, b"heartbeat");
}

#[test]
fn test_get_all() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let reply = roundtrip(&mut stream, Message::get(b"ALL".to_vec()));
    assert_eq!(reply, Message::not_found(b"ALL".to_vec()));

    roundtrip(&mut stream, Message::add(b"b".to_vec(), b"2".to_vec()));
    roundtrip(&mut stream, Message::add(b"a".to_vec(), b"1".to_vec()));

    let reply = roundtrip(&mut stream, Message::get(b"all".to_vec()));
    assert_eq!(reply.status, Some(Status::Ok));
    assert_eq!(reply.key, b"all");
    assert_eq!(reply.value, b"a: 1\nb: 2");
}

#[test]
fn test_entries_are_shared_across_connections() {
    let server = TestServer::start();
    let mut writer = server.connect();
    let mut reader = server.connect();

    roundtrip(&mut writer, Message::add(b"shared".to_vec(), b"yes".to_vec()));

    let reply = roundtrip(&mut reader, Message::get(b"shared".to_vec()));
    assert_eq!(reply.value, b"yes");
}

#[test]
fn test_unknown_opcode_keeps_connection_open() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let request = Message::request(Operation::Unknown(0x09), b"k".to_vec(), Vec::new());
    let reply = roundtrip(&mut stream, request);
    assert_eq!(reply.operation, Operation::Error);
    assert_eq!(reply.status, Some(Status::Error));
    assert_eq!(reply.key, b"k");
    assert!(reply.value_str().contains("0x09"));

    let reply = roundtrip(&mut stream, Message::heartbeat());
    assert_eq!(reply.status, Some(Status::Ok));
}

// =============================================================================
// Framing
// =============================================================================

#[test]
fn test_pipelined_requests_answered_in_order() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let mut batch = Vec::new();
    for request in [
        Message::add(b"p".to_vec(), b"1".to_vec()),
        Message::get(b"p".to_vec()),
        Message::remove(b"p".to_vec()),
        Message::get(b"p".to_vec()),
    ] {
        batch.extend_from_slice(&encode(&request).unwrap());
    }
    stream.write_all(&batch).unwrap();

    assert_eq!(read_message(&mut stream).unwrap().status, Some(Status::Ok));
    assert_eq!(read_message(&mut stream).unwrap().value, b"1");
    assert_eq!(read_message(&mut stream).unwrap().status, Some(Status::Ok));
    assert_eq!(
        read_message(&mut stream).unwrap().status,
        Some(Status::NotFound)
    );
}

#[test]
fn test_frame_split_across_writes() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let encoded = encode(&Message::add(b"split".to_vec(), b"value".to_vec())).unwrap();
    stream.write_all(&encoded[..HEADER_SIZE - 3]).unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(&encoded[HEADER_SIZE - 3..HEADER_SIZE + 2]).unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(&encoded[HEADER_SIZE + 2..]).unwrap();

    let reply = read_message(&mut stream).unwrap();
    assert_eq!(reply.status, Some(Status::Ok));
    assert_eq!(reply.key, b"split");
}

#[test]
fn test_bad_magic_closes_connection() {
    let server = TestServer::start();
    let mut stream = server.connect();

    stream.write_all(b"ADD k v\r\n0000000").unwrap();

    // The server may send an ERROR frame before hanging up
    let mut rest = Vec::new();
    match stream.read_to_end(&mut rest) {
        Ok(_) => {}
        Err(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
    }
    if !rest.is_empty() {
        let reply = read_message(&mut rest.as_slice()).unwrap();
        assert_eq!(reply.operation, Operation::Error);
    }

    // Other clients are unaffected
    let mut other = server.connect();
    let reply = roundtrip(&mut other, Message::heartbeat());
    assert_eq!(reply.status, Some(Status::Ok));
}

#[test]
fn test_shutdown_stops_run() {
    let server = TestServer::start();
    let _idle = server.connect();

    server.stop().unwrap();
}
