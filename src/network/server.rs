//! TCP Server
//!
//! Single-threaded readiness loop over the listener and every accepted
//! connection. Requests on a connection are executed and answered in the
//! order their frames complete.
//!
//! Each turn a connection gets at most `reads_per_turn` reads. One that
//! still has data afterwards stays in the backlog and is served again on
//! the next turn, ahead of any wait for new readiness.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{DaxError, Result};
use crate::protocol::Message;

use super::connection::{Connection, ReadOutcome};
use super::Transport;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

/// TCP server for Dax
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection<TcpStream>>,
    /// Connections to serve: newly readable or left over from the last turn
    backlog: HashSet<Token>,
    next_token: usize,
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

/// Thread-safe handle for stopping a running server
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ServerHandle {
    /// Signal the server to stop after the current event batch
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            tracing::warn!("Failed to wake server loop: {}", e);
        }
    }
}

impl Server {
    /// Bind the listener described by `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let addr = resolve(&config.listen_addr)?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            config,
            engine,
            poll,
            listener,
            connections: HashMap::new(),
            backlog: HashSet::new(),
            next_token: FIRST_CONNECTION,
            shutdown: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for stopping the server from another thread
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Number of open client connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(1024);
        tracing::info!("Cache server listening on {}", self.local_addr()?);

        while !self.shutdown.load(Ordering::Acquire) {
            let timeout = if self.backlog.is_empty() {
                self.config.poll_interval()
            } else {
                Duration::ZERO
            };

            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    WAKER => {}
                    token => {
                        self.backlog.insert(token);
                    }
                }
            }

            let ready: Vec<Token> = self.backlog.drain().collect();
            for token in ready {
                self.connection_ready(token);
            }
        }

        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close(token);
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Accept every pending connection
    fn accept(&mut self) {
        loop {
            let (mut stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    return;
                }
            };

            if self.connections.len() >= self.config.max_connections {
                tracing::warn!(
                    "Rejecting {}: {} connections open",
                    addr,
                    self.connections.len()
                );
                continue;
            }

            // Disable Nagle's algorithm for low latency
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
            }

            let token = Token(self.next_token);
            self.next_token += 1;

            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, token, Interest::READABLE)
            {
                tracing::warn!("Failed to register {}: {}", addr, e);
                continue;
            }

            tracing::debug!("Accepted connection from {}", addr);
            self.connections
                .insert(token, Connection::new(stream, &self.config));
        }
    }

    /// Give a readable connection its turn, answering what it sent
    fn connection_ready(&mut self, token: Token) {
        let outcome = match self.connections.get_mut(&token) {
            Some(conn) => serve(conn, &self.engine, self.config.reads_per_turn),
            None => return,
        };

        match outcome {
            Ok(Served::Drained) => {}
            Ok(Served::Pending) => {
                self.backlog.insert(token);
            }
            Ok(Served::Closed) => self.close(token),
            Err(e) => {
                if let Some(conn) = self.connections.get_mut(&token) {
                    if e.is_disconnect() {
                        tracing::debug!("Client {} disconnected: {}", conn.peer_addr(), e);
                    } else {
                        tracing::warn!("Closing connection with {}: {}", conn.peer_addr(), e);
                    }
                    if let DaxError::Protocol(ref violation) = e {
                        // Best effort; the stream is abandoned either way
                        let _ = conn.send(&Message::error(Vec::new(), &violation.to_string()));
                    }
                }
                self.close(token);
            }
        }
    }

    fn close(&mut self, token: Token) {
        self.backlog.remove(&token);
        if let Some(mut conn) = self.connections.remove(&token) {
            tracing::debug!("Closing connection with {}", conn.peer_addr());
            let _ = self.poll.registry().deregister(conn.stream_mut());
            conn.close();
        }
    }
}

/// Where a connection stands after its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Served {
    /// Nothing left to read until the next readiness event
    Drained,

    /// The read budget ran out first
    Pending,

    /// The peer is gone
    Closed,
}

/// Read and answer requests for at most `budget` reads
fn serve<S: Transport>(conn: &mut Connection<S>, engine: &Engine, budget: usize) -> Result<Served> {
    for _ in 0..budget.max(1) {
        match conn.read_batch()? {
            ReadOutcome::Messages(messages) => {
                for request in messages {
                    tracing::trace!("Received from {}: {}", conn.peer_addr(), request);
                    let response = engine.handle(request);
                    respond(conn, &response)?;
                }
            }
            ReadOutcome::Drained => return Ok(Served::Drained),
            ReadOutcome::Closed => return Ok(Served::Closed),
        }
    }
    Ok(Served::Pending)
}

/// Send a reply, substituting an ERROR frame if the reply cannot be framed
fn respond<S: Transport>(conn: &mut Connection<S>, response: &Message) -> Result<()> {
    match conn.send(response) {
        Err(DaxError::Protocol(e)) => {
            tracing::warn!("Reply to {} not sendable: {}", conn.peer_addr(), e);
            conn.send(&Message::error(
                response.key.clone(),
                &format!("Server error: {}", e),
            ))
        }
        other => other,
    }
}

pub(crate) fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| DaxError::Config(format!("address '{}' did not resolve", addr)))
}
