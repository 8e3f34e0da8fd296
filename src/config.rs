//! Configuration for Dax
//!
//! Centralized configuration with sensible defaults, shared by the
//! server and the client.

use std::time::Duration;

use crate::protocol::{HEADER_SIZE, MAX_KEY_SIZE, MAX_VALUE_SIZE};

/// Main configuration for a Dax endpoint
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// Address the client connects to
    pub server_addr: String,

    /// Give up on a pending connect after this long (milliseconds)
    pub connect_timeout_ms: u64,

    /// Reconnect backoff policy
    pub reconnect: ReconnectPolicy,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Steady-state size of each connection's reassembly buffer (in bytes)
    pub read_buffer_size: usize,

    /// Largest frame a connection will reassemble (in bytes)
    pub max_frame_size: usize,

    /// Upper bound on flushing one frame to a congested socket (milliseconds)
    pub write_timeout_ms: u64,

    /// Bounded readiness wait of the event loops (milliseconds)
    pub poll_interval_ms: u64,

    /// Reads the server gives one connection before moving to the next
    pub reads_per_turn: usize,

    // -------------------------------------------------------------------------
    // Application Boundary
    // -------------------------------------------------------------------------
    /// Keys typed at the prompt are padded/truncated to this many bytes
    pub key_width: usize,

    /// Values typed at the prompt are truncated to this many bytes
    pub max_value_bytes: usize,
}

/// Exponential backoff policy for the client's reconnect controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Delay ceiling after doubling
    pub max_delay: Duration,

    /// Failed attempts tolerated before giving up
    pub max_attempts: u32,

    /// Lower bound of the random factor applied to each new delay
    pub jitter_min: f64,

    /// Upper bound of the random factor applied to each new delay
    pub jitter_max: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            jitter_min: 0.8,
            jitter_max: 1.2,
        }
    }
}

impl ReconnectPolicy {
    /// Same policy with jitter disabled
    pub fn without_jitter(self) -> Self {
        Self {
            jitter_min: 1.0,
            jitter_max: 1.0,
            ..self
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            server_addr: "127.0.0.1:8080".to_string(),
            connect_timeout_ms: 5000,
            reconnect: ReconnectPolicy::default(),
            read_buffer_size: 1024 * 1024, // 1 MB
            max_frame_size: HEADER_SIZE + MAX_KEY_SIZE + MAX_VALUE_SIZE,
            write_timeout_ms: 5000,
            poll_interval_ms: 1000,
            reads_per_turn: 16,
            key_width: 4,
            max_value_bytes: 2096,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the address the client connects to
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the reconnect backoff policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Set the steady reassembly buffer size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the largest accepted frame (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the readiness wait (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the per-connection read budget of one server loop turn
    pub fn reads_per_turn(mut self, reads: usize) -> Self {
        self.config.reads_per_turn = reads;
        self
    }

    /// Set the fixed key width used at the prompt
    pub fn key_width(mut self, width: usize) -> Self {
        self.config.key_width = width;
        self
    }

    /// Set the value cap used at the prompt
    pub fn max_value_bytes(mut self, bytes: usize) -> Self {
        self.config.max_value_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
