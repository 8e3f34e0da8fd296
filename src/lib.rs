//! # Dax
//!
//! A networked in-memory key-value cache with:
//! - A length-prefixed binary frame protocol
//! - Stream reassembly of split and pipelined frames
//! - A single-threaded readiness-driven server
//! - An asynchronous client with request correlation and reconnect backoff
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐          ┌──────────────────────────────┐
//! │            Client            │          │            Server            │
//! │  caller ──▶ Correlator       │          │  mio Poll (listener + conns) │
//! │     │          ▲             │  frames  │              │               │
//! │     ▼          │ resolve     │◀────────▶│       FrameBuffer            │
//! │  event loop (mio) + Reconnect│   TCP    │              ▼               │
//! └──────────────────────────────┘          │   Engine (RwLock<HashMap>)   │
//!                                           └──────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod engine;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DaxError, Result};
pub use config::{Config, ReconnectPolicy};
pub use engine::Engine;
pub use network::{Server, ServerHandle};
pub use client::{Client, Reply};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Dax
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
