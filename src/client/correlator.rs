//! Pending-request correlation
//!
//! Matches each response frame to the request that caused it. The
//! correlation token is the request key as text (`heartbeat` for
//! heartbeats), which the server echoes back in its reply.
//!
//! Several requests may be outstanding for the same token, e.g. two GETs of
//! one key. They are queued per token and resolved first-in first-out, which
//! matches the order the server answers them in on a single connection.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::error::{DaxError, Result};
use crate::protocol::Message;

/// Callback completing one request
pub type Continuation = Box<dyn FnOnce(Result<Message>) + Send>;

/// Outstanding requests, keyed by correlation token
///
/// Registration happens on caller threads, resolution on the event loop.
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<String, VecDeque<Continuation>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a continuation behind any others waiting on `token`
    pub fn register(&self, token: impl Into<String>, continuation: Continuation) {
        self.pending
            .lock()
            .entry(token.into())
            .or_default()
            .push_back(continuation);
    }

    /// Complete the oldest continuation waiting on `token`
    ///
    /// Returns `false` when nothing was waiting; the response is then an
    /// orphan and is only logged.
    pub fn resolve(&self, token: &str, message: Message) -> bool {
        let continuation = {
            let mut pending = self.pending.lock();
            let next = pending.get_mut(token).and_then(|queue| queue.pop_front());
            if pending.get(token).is_some_and(|queue| queue.is_empty()) {
                pending.remove(token);
            }
            next
        };

        // Run outside the lock so a continuation may submit new requests
        match continuation {
            Some(continuation) => {
                continuation(Ok(message));
                true
            }
            None => {
                tracing::warn!("Received response with no pending request: {}", message);
                false
            }
        }
    }

    /// Fail every outstanding request, returning how many there were
    pub fn fail_all(&self, error: impl Fn() -> DaxError) -> usize {
        let drained: Vec<Continuation> = {
            let mut pending = self.pending.lock();
            pending.drain().flat_map(|(_, queue)| queue).collect()
        };

        let count = drained.len();
        for continuation in drained {
            continuation(Err(error()));
        }
        count
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.pending.lock().values().map(|queue| queue.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
