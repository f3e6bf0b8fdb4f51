//! The probe engine: one strictly sequential ping session.
//!
//! Each probe goes `Built -> Sent -> {Received, TimedOut, SendFailed}`.
//! Exactly one receive call is made per probe, so a probe never waits longer
//! than the transport's receive timeout.

use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Serialize;

use crate::error::PingError;
use crate::packet::{
    decode_reply, encode_echo_request, DEFAULT_PAYLOAD_LEN, ICMP_HEADER_LEN, MIN_PACKET_LEN,
};
use crate::resolve::Target;
use crate::socket::{recv_buffer_len, RecvError, Transport};
use crate::stats::{SessionStats, Summary};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success {
        rtt_ms: f64,
        ttl: u8,
        reply_bytes: usize,
    },
    /// No matching reply within the receive timeout. Foreign or malformed
    /// datagrams end up here too.
    Timeout,
    TransportError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// 1-based probe slot.
    pub sequence: u32,
    /// Sequence number carried by the accepted reply. May differ from
    /// `sequence` when a late reply to an earlier probe is accepted.
    pub reply_sequence: Option<u16>,
    pub from: Option<Ipv4Addr>,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    fn lost(sequence: u32, outcome: ProbeOutcome) -> Self {
        Self {
            sequence,
            reply_sequence: None,
            from: None,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Success { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub count: u32,
    /// Pause after each probe before the next one starts.
    pub interval: Duration,
    pub payload_len: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            count: 4,
            interval: Duration::from_secs(1),
            payload_len: DEFAULT_PAYLOAD_LEN,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub target: Target,
    pub identifier: u16,
    pub results: Vec<ProbeResult>,
    pub summary: Summary,
    /// Set when the session stopped on a stop request.
    pub interrupted: bool,
    /// Set when a send failed and the remaining probes were skipped.
    #[serde(skip)]
    pub send_error: Option<PingError>,
}

impl SessionReport {
    /// Folds a send failure into an error for callers that only care about
    /// success or failure.
    pub fn into_result(self) -> Result<Self, PingError> {
        match self.send_error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Identifier used to tell our replies from other pingers on the host.
pub fn session_identifier() -> u16 {
    (std::process::id() & 0xffff) as u16
}

pub struct ProbeEngine<T: Transport> {
    transport: T,
    target: Target,
    identifier: u16,
    settings: EngineSettings,
    stop: Option<Arc<AtomicBool>>,
}

impl<T: Transport> ProbeEngine<T> {
    pub fn new(transport: T, target: Target, settings: EngineSettings) -> Self {
        Self {
            transport,
            target,
            identifier: session_identifier(),
            settings,
            stop: None,
        }
    }

    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    /// The flag is checked between probes, never while one is in flight.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map_or(false, |stop| stop.load(Ordering::Relaxed))
    }

    /// Runs probes `1..=count`, calling `on_probe` as each one resolves.
    pub fn run<F>(&mut self, mut on_probe: F) -> SessionReport
    where
        F: FnMut(&ProbeResult),
    {
        let payload = vec![0u8; self.settings.payload_len];
        let packet_len = (ICMP_HEADER_LEN + payload.len()).max(MIN_PACKET_LEN);
        let mut buf = vec![0u8; recv_buffer_len(packet_len)];
        let mut stats = SessionStats::new();
        let mut results = Vec::with_capacity(self.settings.count as usize);
        let mut send_error = None;
        let mut interrupted = false;

        let started = Instant::now();
        for sequence in 1..=self.settings.count {
            if self.stop_requested() {
                debug!("stop requested before probe {sequence}");
                interrupted = true;
                break;
            }

            let result = match self.probe(sequence, &payload, &mut buf) {
                Ok(result) => result,
                Err(err) => {
                    warn!("send of icmp_seq {sequence} failed: {err}");
                    let result =
                        ProbeResult::lost(sequence, ProbeOutcome::TransportError(err.to_string()));
                    send_error = Some(PingError::Send(err));
                    result
                }
            };

            stats.record(&result.outcome);
            on_probe(&result);
            results.push(result);

            if send_error.is_some() {
                break;
            }
            if sequence == self.settings.count || self.settings.interval.is_zero() {
                continue;
            }
            if self.stop_requested() {
                debug!("stop requested after probe {sequence}");
                interrupted = true;
                break;
            }
            thread::sleep(self.settings.interval);
        }
        let elapsed = started.elapsed();

        SessionReport {
            target: self.target.clone(),
            identifier: self.identifier,
            results,
            summary: stats.summary(elapsed),
            interrupted,
            send_error,
        }
    }

    /// One full probe. `Err` means the send itself failed.
    fn probe(&mut self, sequence: u32, payload: &[u8], buf: &mut [u8]) -> io::Result<ProbeResult> {
        // The wire field is 16 bits; slots past 65535 wrap.
        let packet = encode_echo_request(self.identifier, sequence as u16, payload);

        let sent_at = Instant::now();
        self.transport.send_to(self.target.addr, &packet)?;

        let received = self.transport.recv_from(buf);
        let rtt = sent_at.elapsed();

        let (from, len) = match received {
            Ok(received) => received,
            Err(RecvError::Timeout) => {
                return Ok(ProbeResult::lost(sequence, ProbeOutcome::Timeout));
            }
            Err(RecvError::Io(err)) => {
                warn!("recvfrom failed for icmp_seq {sequence}: {err}");
                return Ok(ProbeResult::lost(
                    sequence,
                    ProbeOutcome::TransportError(err.to_string()),
                ));
            }
        };

        let reply = match decode_reply(&buf[..len]) {
            Ok(reply) => reply,
            Err(err) => {
                debug!("discarding {len}-byte datagram from {from}: {err}");
                return Ok(ProbeResult::lost(sequence, ProbeOutcome::Timeout));
            }
        };

        if !reply.is_reply_for(self.identifier) {
            debug!(
                "discarding icmp type={} id={:#06x} from {from}, not ours",
                reply.icmp_type, reply.identifier
            );
            return Ok(ProbeResult::lost(sequence, ProbeOutcome::Timeout));
        }
        if u32::from(reply.sequence) != sequence & 0xffff {
            debug!(
                "accepting reply for icmp_seq {} in slot {sequence}",
                reply.sequence
            );
        }

        Ok(ProbeResult {
            sequence,
            reply_sequence: Some(reply.sequence),
            from: Some(from),
            outcome: ProbeOutcome::Success {
                rtt_ms: rtt.as_secs_f64() * 1000.0,
                ttl: reply.ttl,
                reply_bytes: reply.icmp_len,
            },
        })
    }
}
