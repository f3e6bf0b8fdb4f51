use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineSettings;
use crate::error::PingError;
use crate::packet::{DEFAULT_PAYLOAD_LEN, ICMP_HEADER_LEN};
use crate::socket::{SocketOptions, DEFAULT_RECV_TIMEOUT, MIN_RECV_TIMEOUT};

/// Largest ICMP payload that fits in a single IPv4 datagram.
pub const MAX_PAYLOAD_LEN: usize = 65_507 - ICMP_HEADER_LEN;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    pub count: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub payload_size: usize,
    pub ttl: Option<u32>,
    pub tos: Option<u8>,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 4,
            interval: Duration::from_secs(1),
            timeout: DEFAULT_RECV_TIMEOUT,
            payload_size: DEFAULT_PAYLOAD_LEN,
            ttl: None,
            tos: None,
        }
    }
}

impl PingConfig {
    pub fn validate(&self) -> Result<(), PingError> {
        if self.count == 0 {
            return Err(PingError::Config("count must be > 0".to_string()));
        }
        if self.timeout < MIN_RECV_TIMEOUT {
            return Err(PingError::Config(format!(
                "timeout must be at least {MIN_RECV_TIMEOUT:?}"
            )));
        }
        if self.payload_size > MAX_PAYLOAD_LEN {
            return Err(PingError::Config(format!(
                "payload size {} exceeds {MAX_PAYLOAD_LEN}",
                self.payload_size
            )));
        }
        if let Some(ttl) = self.ttl {
            if !(1..=255).contains(&ttl) {
                return Err(PingError::Config(format!("ttl {ttl} out of range 1-255")));
            }
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            count: self.count,
            interval: self.interval,
            payload_len: self.payload_size,
        }
    }

    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            recv_timeout: self.timeout,
            ttl: self.ttl,
            tos: self.tos,
        }
    }
}
