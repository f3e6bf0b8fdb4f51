//! ICMP Echo probing over a raw IPv4 socket.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod packet;
pub mod report;
pub mod resolve;
pub mod socket;
pub mod stats;

pub use checksum::checksum;
pub use config::PingConfig;
pub use engine::{
    session_identifier, EngineSettings, ProbeEngine, ProbeOutcome, ProbeResult, SessionReport,
};
pub use error::PingError;
pub use packet::{decode_reply, encode_echo_request, EchoReply, EchoRequest, ParseError};
pub use resolve::{resolve, Target};
pub use socket::{IcmpSocket, RecvError, SocketOptions, Transport};
pub use stats::{RttSummary, SessionStats, Summary};
