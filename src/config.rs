//! Connection configuration.
//!
//! All values are fixed when the connection is opened; nothing here is
//! mutable at runtime.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use duplex_pipe::ConnectionConfig;
//!
//! let config = ConnectionConfig::new()
//!     .with_capacity(64)
//!     .with_heartbeat_interval(Duration::from_secs(10))
//!     .with_heartbeat_payload(b"ping".to_vec());
//! ```
//!
//! The type also deserializes from any serde format. Durations are expressed
//! in milliseconds and every field is optional:
//!
//! ```json
//! { "inbound_capacity": 256, "heartbeat_interval_ms": 2000 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default capacity of each buffer, in payloads.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default interval between heartbeat frames.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Default heartbeat payload.
pub const DEFAULT_HEARTBEAT_PAYLOAD: &[u8] = b"heartbeat";

/// Default upper bound on the transport close call.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Constructor-time parameters of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the inbound buffer (transport → application).
    pub inbound_capacity: usize,

    /// Capacity of the outbound buffer (application → transport).
    pub outbound_capacity: usize,

    /// Interval between heartbeat frames.
    #[serde(rename = "heartbeat_interval_ms", with = "duration_ms")]
    pub heartbeat_interval: Duration,

    /// Payload enqueued on every heartbeat tick.
    pub heartbeat_payload: Vec<u8>,

    /// Upper bound on the transport close call during teardown.
    #[serde(rename = "close_timeout_ms", with = "duration_ms")]
    pub close_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: DEFAULT_CAPACITY,
            outbound_capacity: DEFAULT_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_payload: DEFAULT_HEARTBEAT_PAYLOAD.to_vec(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity of both buffers.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self.outbound_capacity = capacity;
        self
    }

    /// Sets the inbound buffer capacity.
    #[inline]
    #[must_use]
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Sets the outbound buffer capacity.
    #[inline]
    #[must_use]
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the heartbeat payload.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.heartbeat_payload = payload.into();
        self
    }

    /// Sets the transport close timeout.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a capacity, the heartbeat interval or the
    /// close timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.inbound_capacity == 0 {
            return Err(Error::config("inbound capacity must be greater than zero"));
        }
        if self.outbound_capacity == 0 {
            return Err(Error::config("outbound capacity must be greater than zero"));
        }
        validate_interval(self.heartbeat_interval)?;
        if self.close_timeout.is_zero() {
            return Err(Error::config("close timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Rejects a zero heartbeat interval.
pub(crate) fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::config("heartbeat interval must be greater than zero"));
    }
    Ok(())
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
