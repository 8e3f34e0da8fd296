//! Client event loop
//!
//! Owns the socket. Caller threads never touch it: they queue requests on
//! a channel and wake the loop. Once the link is up the loop registers each
//! continuation with the correlator and writes its frame, in channel order.
//! Responses are routed to the correlator as they decode.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use mio::event::Event;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

use crate::config::Config;
use crate::error::{DaxError, Result};
use crate::network::{Connection, ReadOutcome};

use super::reconnect::{Decision, Reconnect};
use super::{Request, Shared};

const SOCKET: Token = Token(0);
pub(crate) const WAKER: Token = Token(1);

/// The client's single connection
enum Link {
    Down,
    Connecting {
        conn: Connection<TcpStream>,
        started: Instant,
    },
    Up(Connection<TcpStream>),
}

pub(crate) struct EventLoop {
    config: Config,
    addr: SocketAddr,
    poll: Poll,
    outbound: Receiver<Request>,
    shared: Arc<Shared>,
    reconnect: Reconnect,
    link: Link,
}

impl EventLoop {
    pub(crate) fn new(
        config: Config,
        addr: SocketAddr,
        poll: Poll,
        outbound: Receiver<Request>,
        shared: Arc<Shared>,
    ) -> Self {
        let reconnect = Reconnect::new(config.reconnect);
        Self {
            config,
            addr,
            poll,
            outbound,
            shared,
            reconnect,
            link: Link::Down,
        }
    }

    /// Run until shut down or until reconnecting is abandoned
    pub(crate) fn run(mut self) -> Result<()> {
        let result = self.drive();

        self.shared.running.store(false, Ordering::Release);
        self.drop_link();
        let failed = match &result {
            Err(DaxError::GaveUp { attempts }) => {
                let attempts = *attempts;
                self.fail_outstanding(|| DaxError::GaveUp { attempts })
            }
            _ => self.fail_outstanding(|| DaxError::ClientStopped),
        };
        if failed > 0 {
            tracing::debug!("{} requests abandoned at shutdown", failed);
        }

        result
    }

    fn drive(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(64);

        let now = Instant::now();
        self.reconnect.begin(now);
        self.open(now);

        while self.shared.running.load(Ordering::Acquire) {
            let timeout = self.maintain_link(Instant::now())?;

            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                if event.token() == SOCKET {
                    self.socket_ready(event);
                }
            }

            self.flush_outbound();
        }

        Ok(())
    }

    /// Check connect timeouts and backoff; returns how long to wait for I/O
    fn maintain_link(&mut self, now: Instant) -> Result<Duration> {
        let interval = self.config.poll_interval();

        if let Link::Connecting { started, .. } = &self.link {
            let elapsed = now.saturating_duration_since(*started);
            let limit = self.config.connect_timeout();
            if elapsed < limit {
                return Ok(interval.min(limit - elapsed));
            }
            tracing::warn!("Connect to {} timed out", self.addr);
            self.connect_failed();
        }

        if let Link::Up(_) = self.link {
            return Ok(interval);
        }

        match self.reconnect.poll(now) {
            Decision::Connect { attempt } => {
                tracing::warn!(
                    "Connection lost. Reconnection attempt {} of {}",
                    attempt,
                    self.config.reconnect.max_attempts
                );
                self.open(now);
                Ok(interval)
            }
            Decision::Wait(delay) => Ok(interval.min(delay)),
            Decision::Idle => Ok(interval),
            Decision::GiveUp => {
                self.publish_state();
                let attempts = self.reconnect.attempts();
                tracing::error!("Maximum retry attempts reached ({}). Giving up.", attempts);
                Err(DaxError::GaveUp { attempts })
            }
        }
    }

    /// Start a non-blocking connect
    fn open(&mut self, now: Instant) {
        self.drop_link();

        let mut stream = match TcpStream::connect(self.addr) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Connection attempt failed: {}", e);
                self.reconnect.on_failure();
                self.publish_state();
                return;
            }
        };

        if let Err(e) = self.poll.registry().register(
            &mut stream,
            SOCKET,
            Interest::READABLE | Interest::WRITABLE,
        ) {
            tracing::warn!("Failed to register socket: {}", e);
            self.reconnect.on_failure();
            self.publish_state();
            return;
        }

        tracing::debug!("Attempting to connect to {}", self.addr);
        self.link = Link::Connecting {
            conn: Connection::new(stream, &self.config),
            started: now,
        };
        self.publish_state();
    }

    fn socket_ready(&mut self, event: &Event) {
        if let Link::Connecting { conn, .. } = &mut self.link {
            match connect_result(conn.stream()) {
                Ok(true) => self.connected(),
                Ok(false) => return,
                Err(e) => {
                    tracing::warn!("Failed to establish connection: {}", e);
                    self.connect_failed();
                    return;
                }
            }
        }

        if event.is_readable() || event.is_read_closed() || event.is_error() {
            self.receive();
        }
    }

    /// Promote a finished connect to an established link
    fn connected(&mut self) {
        let Link::Connecting { mut conn, .. } = std::mem::replace(&mut self.link, Link::Down)
        else {
            return;
        };

        if let Err(e) = self
            .poll
            .registry()
            .reregister(conn.stream_mut(), SOCKET, Interest::READABLE)
        {
            tracing::warn!("Failed to reregister socket: {}", e);
            let _ = self.poll.registry().deregister(conn.stream_mut());
            conn.close();
            self.reconnect.on_failure();
            self.publish_state();
            return;
        }

        if let Err(e) = conn.stream().set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY: {}", e);
        }

        tracing::info!("Connected to cache server at {}", self.addr);
        self.link = Link::Up(conn);
        self.reconnect.on_connected();
        self.publish_state();
    }

    /// Drain the socket, handing each response to the correlator
    fn receive(&mut self) {
        let Link::Up(conn) = &mut self.link else {
            return;
        };

        let failure = loop {
            match conn.read_batch() {
                Ok(ReadOutcome::Messages(messages)) => {
                    for message in messages {
                        tracing::trace!("Received response: {}", message);
                        let token = message.token();
                        self.shared.correlator.resolve(&token, message);
                    }
                }
                Ok(ReadOutcome::Drained) => return,
                Ok(ReadOutcome::Closed) => break DaxError::Disconnected,
                Err(e) => break e,
            }
        };

        self.disconnected(failure);
    }

    /// Register and write every queued request while the link is up
    fn flush_outbound(&mut self) {
        let Link::Up(conn) = &mut self.link else {
            return;
        };

        let failure = loop {
            let Ok(request) = self.outbound.try_recv() else {
                return;
            };
            self.shared
                .correlator
                .register(request.token, request.continuation);
            if let Err(e) = conn.write_frame(&request.frame) {
                break e;
            }
        };

        self.disconnected(failure);
    }

    /// An established link dropped
    fn disconnected(&mut self, cause: DaxError) {
        tracing::warn!("Error talking to server: {}", cause);
        self.drop_link();

        let failed = self.fail_outstanding(|| DaxError::Disconnected);
        if failed > 0 {
            tracing::debug!("{} pending requests failed", failed);
        }

        self.reconnect.on_failure();
        self.publish_state();
    }

    /// Fail registered requests, then the ones still waiting to be written
    fn fail_outstanding(&self, cause: impl Fn() -> DaxError) -> usize {
        let mut failed = self.shared.correlator.fail_all(&cause);
        for request in self.outbound.try_iter() {
            (request.continuation)(Err(cause()));
            failed += 1;
        }
        failed
    }

    /// A connect attempt did not complete
    fn connect_failed(&mut self) {
        self.drop_link();
        self.reconnect.on_failure();
        self.publish_state();
    }

    fn drop_link(&mut self) {
        match std::mem::replace(&mut self.link, Link::Down) {
            Link::Down => {}
            Link::Connecting { mut conn, .. } | Link::Up(mut conn) => {
                let _ = self.poll.registry().deregister(conn.stream_mut());
                conn.close();
            }
        }
    }

    fn publish_state(&self) {
        *self.shared.state.lock() = self.reconnect.state();
    }
}

/// Whether a pending non-blocking connect has completed
fn connect_result(stream: &TcpStream) -> Result<bool> {
    if let Some(e) = stream.take_error()? {
        return Err(e.into());
    }
    match stream.peer_addr() {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotConnected => Ok(false),
        Err(e) => Err(e.into()),
    }
}

