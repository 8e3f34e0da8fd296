//! Network Module
//!
//! Non-blocking TCP plumbing shared by the server and the client.
//!
//! ## Architecture
//! - One thread per endpoint runs a `mio` readiness loop
//! - Each connection owns a reassembly buffer
//! - Writes are flushed inline before the loop moves on

mod transport;
mod connection;
mod server;

pub use transport::Transport;
pub use connection::{Connection, ReadOutcome};
pub use server::{Server, ServerHandle};

pub(crate) use server::resolve;
