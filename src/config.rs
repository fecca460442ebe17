//! Transport configuration

use crate::protocol::constants::{MAX_MESSAGE_LENGTH, MAX_STARTUP_PACKET_LENGTH};
use crate::{Error, Result};
use serde::Deserialize;

/// Default read buffer capacity (8 KiB)
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 8192;

/// Transport configuration
///
/// Limits applied while framing inbound packets. Use `TransportConfig::builder()`
/// to override individual values, or deserialize it from any serde format
/// (missing fields fall back to their defaults).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest accepted frontend message, length field included
    pub max_message_size: usize,
    /// Largest accepted startup packet, length field included
    pub max_startup_packet_size: usize,
    /// Initial capacity of the read buffer
    pub read_buffer_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_LENGTH,
            max_startup_packet_size: MAX_STARTUP_PACKET_LENGTH,
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
        }
    }
}

impl TransportConfig {
    /// Create a builder starting from the defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use pg_transport::TransportConfig;
    ///
    /// let config = TransportConfig::builder()
    ///     .max_message_size(16 * 1024 * 1024)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_message_size, 16 * 1024 * 1024);
    /// ```
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check that every limit is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size < 4 {
            return Err(Error::Config(format!(
                "max_message_size must be at least 4, got {}",
                self.max_message_size
            )));
        }
        if self.max_startup_packet_size < 8 {
            return Err(Error::Config(format!(
                "max_startup_packet_size must be at least 8, got {}",
                self.max_startup_packet_size
            )));
        }
        if self.read_buffer_capacity == 0 {
            return Err(Error::Config("read_buffer_capacity must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for `TransportConfig`
#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set the largest accepted frontend message
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the largest accepted startup packet
    pub fn max_startup_packet_size(mut self, size: usize) -> Self {
        self.config.max_startup_packet_size = size;
        self
    }

    /// Set the initial read buffer capacity
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<TransportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
