//! Client Module
//!
//! Asynchronous cache client. A background thread runs the event loop and
//! owns the connection; every request returns a [`Reply`] that completes
//! when the matching response arrives, the link drops, or the client stops.
//!
//! ## Request Flow
//! ```text
//! caller ── (token, frame, continuation) ──▶ channel ──▶ event loop
//! event loop ── register ──▶ Correlator, then frame ──▶ socket
//! socket ──▶ event loop ── decode ──▶ Correlator::resolve ──▶ Reply
//! ```

mod correlator;
mod event_loop;
mod reconnect;
pub mod shell;

pub use correlator::{Continuation, Correlator};
pub use reconnect::{Decision, LinkState, Reconnect};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendError, Sender, TryRecvError};
use mio::{Poll, Waker};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{DaxError, Result};
use crate::network::resolve;
use crate::protocol::{encode, Message, Operation, Status};

use event_loop::{EventLoop, WAKER};

/// A request on its way to the event loop
///
/// The continuation travels with its frame and is registered by the loop
/// right before the frame is written, so continuations for one token queue
/// up in wire order.
pub(crate) struct Request {
    pub(crate) token: String,
    pub(crate) frame: Bytes,
    pub(crate) continuation: Continuation,
}

/// State shared between caller threads and the event loop
pub(crate) struct Shared {
    pub(crate) correlator: Correlator,
    pub(crate) outbound: Sender<Request>,
    pub(crate) waker: Waker,
    pub(crate) running: AtomicBool,
    pub(crate) state: Mutex<LinkState>,
}

/// Pending outcome of one request
#[must_use = "a reply does nothing unless waited on"]
pub struct Reply<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Reply<T> {
    fn channel() -> (Sender<Result<T>>, Self) {
        let (tx, rx) = channel::bounded(1);
        (tx, Self { rx })
    }

    /// Block until the request completes
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(DaxError::ClientStopped))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(DaxError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(DaxError::ClientStopped),
        }
    }

    /// The outcome, if it has already arrived
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(DaxError::ClientStopped)),
        }
    }
}

/// Handle to a running cache client
pub struct Client {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Client {
    /// Start the event loop and begin connecting to `config.server_addr`
    ///
    /// Returns once the loop thread is running; the connection itself is
    /// established in the background.
    pub fn start(config: Config) -> Result<Self> {
        let addr = resolve(&config.server_addr)?;
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER)?;
        let (outbound, requests) = channel::unbounded();

        let shared = Arc::new(Shared {
            correlator: Correlator::new(),
            outbound,
            waker,
            running: AtomicBool::new(true),
            state: Mutex::new(LinkState::Connecting),
        });

        let event_loop = EventLoop::new(config, addr, poll, requests, Arc::clone(&shared));
        let thread = thread::Builder::new()
            .name("dax-client".to_string())
            .spawn(move || event_loop.run())?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Store `value` under `key`; resolves to whether the server accepted it
    pub fn add(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Reply<bool> {
        self.submit(Message::add(key.into(), value.into()), expect_flag)
    }

    /// Look up `key`; resolves to `None` when the server has no entry
    pub fn get(&self, key: impl Into<Vec<u8>>) -> Reply<Option<Vec<u8>>> {
        self.submit(Message::get(key.into()), expect_value)
    }

    /// Remove `key`; resolves to whether an entry was removed
    pub fn delete(&self, key: impl Into<Vec<u8>>) -> Reply<bool> {
        self.submit(Message::remove(key.into()), expect_flag)
    }

    /// Check the server is answering
    pub fn heartbeat(&self) -> Reply<bool> {
        self.submit(Message::heartbeat(), expect_alive)
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        *self.shared.state.lock()
    }

    /// Whether the event loop is still running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Ask the event loop to stop; pending requests fail
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        if let Err(e) = self.shared.waker.wake() {
            tracing::warn!("Failed to wake client loop: {}", e);
        }
    }

    /// Wait for the event loop to exit, returning why it stopped
    ///
    /// Only the first call observes the loop's result.
    pub fn join(&self) -> Result<()> {
        let Some(thread) = self.thread.lock().take() else {
            return Ok(());
        };
        thread.join().unwrap_or(Err(DaxError::ClientStopped))
    }

    fn submit<T: Send + 'static>(
        &self,
        message: Message,
        interpret: fn(Message) -> Result<T>,
    ) -> Reply<T> {
        let (tx, reply) = Reply::channel();

        if !self.is_running() {
            let _ = tx.send(Err(DaxError::ClientStopped));
            return reply;
        }

        let frame = match encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = tx.send(Err(e.into()));
                return reply;
            }
        };

        tracing::trace!("Sending request: {}", message);
        let request = Request {
            token: message.token(),
            frame,
            continuation: Box::new(move |outcome: Result<Message>| {
                let _ = tx.send(outcome.and_then(interpret));
            }),
        };

        // A request left in the channel when the loop exits is dropped with
        // it, which the reply reports as ClientStopped
        if let Err(SendError(request)) = self.shared.outbound.send(request) {
            (request.continuation)(Err(DaxError::ClientStopped));
            return reply;
        }
        if let Err(e) = self.shared.waker.wake() {
            tracing::warn!("Failed to wake client loop: {}", e);
        }

        reply
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
        let _ = self.join();
    }
}

/// ADD and REMOVE: OK means it happened, NOT_FOUND means it did not
fn expect_flag(response: Message) -> Result<bool> {
    match (response.operation, response.status) {
        (Operation::Response, Some(Status::Ok)) => Ok(true),
        (Operation::Response, Some(Status::NotFound)) => Ok(false),
        _ => unexpected(response),
    }
}

/// GET: OK carries the value, NOT_FOUND means no entry
fn expect_value(response: Message) -> Result<Option<Vec<u8>>> {
    match (response.operation, response.status) {
        (Operation::Response, Some(Status::Ok)) => Ok(Some(response.value)),
        (Operation::Response, Some(Status::NotFound)) => Ok(None),
        _ => unexpected(response),
    }
}

/// HEARTBEAT: any OK reply means the server is alive
fn expect_alive(response: Message) -> Result<bool> {
    match (response.operation, response.status) {
        (Operation::Response | Operation::Heartbeat, Some(Status::Ok)) => Ok(true),
        _ => unexpected(response),
    }
}

fn unexpected<T>(response: Message) -> Result<T> {
    if response.operation == Operation::Error || response.status == Some(Status::Error) {
        return Err(DaxError::Remote(response.value_str().into_owned()));
    }
    Err(DaxError::UnexpectedResponse(response.to_string()))
}
