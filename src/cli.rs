use std::time::Duration;

use clap::Parser;

use crate::config::PingConfig;
use crate::packet::DEFAULT_PAYLOAD_LEN;

#[derive(Debug, Parser)]
#[command(name = "rping", version, about = "Send ICMP Echo Requests to a host")]
pub struct Args {
    /// Number of echo requests to send
    #[arg(short = 'c', long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Seconds to wait between probes
    #[arg(short = 'i', long, default_value_t = 1.0)]
    pub interval: f64,

    /// Seconds to wait for each reply
    #[arg(short = 'W', long, default_value_t = 1.0)]
    pub timeout: f64,

    /// Payload bytes per request; packets are padded to at least 64 bytes
    #[arg(short = 's', long = "size", default_value_t = DEFAULT_PAYLOAD_LEN)]
    pub payload_size: usize,

    /// IP time-to-live for outgoing requests
    #[arg(short = 't', long)]
    pub ttl: Option<u32>,

    /// IP type-of-service byte for outgoing requests
    #[arg(short = 'Q', long)]
    pub tos: Option<u8>,

    /// Print the session report as JSON
    #[arg(long)]
    pub json: bool,

    pub host: String,
}

impl Args {
    pub fn config(&self) -> PingConfig {
        PingConfig {
            count: self.count,
            interval: secs(self.interval),
            timeout: secs(self.timeout),
            payload_size: self.payload_size,
            ttl: self.ttl,
            tos: self.tos,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
