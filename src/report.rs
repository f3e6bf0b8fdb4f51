//! Console rendering in the classic ping(8) format.

use crate::engine::{ProbeOutcome, ProbeResult};
use crate::resolve::Target;
use crate::stats::Summary;

pub fn banner(target: &Target, payload_size: usize) -> String {
    format!(
        "PING {} ({}): {} data bytes",
        target.host, target.addr, payload_size
    )
}

pub fn probe_line(target: &Target, result: &ProbeResult) -> String {
    match &result.outcome {
        ProbeOutcome::Success {
            rtt_ms,
            ttl,
            reply_bytes,
        } => format!(
            "{} bytes from {}: icmp_seq={} ttl={} time={:.3} ms",
            reply_bytes,
            result.from.unwrap_or(target.addr),
            result.reply_sequence.map_or(result.sequence, u32::from),
            ttl,
            rtt_ms
        ),
        ProbeOutcome::Timeout => format!("Request timeout for icmp_seq {}", result.sequence),
        ProbeOutcome::TransportError(err) => {
            format!("icmp_seq {}: {}", result.sequence, err)
        }
    }
}

pub fn summary_block(target: &Target, summary: &Summary) -> String {
    let mut out = format!(
        "\n--- {} ping statistics ---\n{} packets transmitted, {} packets received, {:.1}% packet loss, time {:.0}ms",
        target.host, summary.transmitted, summary.received, summary.loss_pct, summary.elapsed_ms
    );
    if let Some(rtt) = &summary.rtt {
        out.push_str(&format!(
            "\nround-trip min/avg/max/stddev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            rtt.min, rtt.avg, rtt.max, rtt.stddev
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::RttSummary;
    use std::net::Ipv4Addr;

    fn target() -> Target {
        Target::new("example.test", Ipv4Addr::new(192, 0, 2, 1))
    }

    #[test]
    fn success_line() {
        let result = ProbeResult {
            sequence: 2,
            reply_sequence: Some(2),
            from: Some(Ipv4Addr::new(192, 0, 2, 1)),
            outcome: ProbeOutcome::Success {
                rtt_ms: 12.3456,
                ttl: 57,
                reply_bytes: 64,
            },
        };
        assert_eq!(
            probe_line(&target(), &result),
            "64 bytes from 192.0.2.1: icmp_seq=2 ttl=57 time=12.346 ms"
        );
    }

    #[test]
    fn timeout_line() {
        let result = ProbeResult {
            sequence: 3,
            reply_sequence: None,
            from: None,
            outcome: ProbeOutcome::Timeout,
        };
        assert_eq!(
            probe_line(&target(), &result),
            "Request timeout for icmp_seq 3"
        );
    }

    #[test]
    fn summary_without_replies_omits_rtt() {
        let summary = Summary {
            transmitted: 2,
            received: 0,
            loss_pct: 100.0,
            elapsed_ms: 2001.4,
            rtt: None,
        };
        let text = summary_block(&target(), &summary);
        assert!(text.contains("--- example.test ping statistics ---"));
        assert!(text.contains("2 packets transmitted, 0 packets received, 100.0% packet loss"));
        assert!(!text.contains("round-trip"));
    }

    #[test]
    fn summary_with_replies() {
        let summary = Summary {
            transmitted: 3,
            received: 3,
            loss_pct: 0.0,
            elapsed_ms: 2000.0,
            rtt: Some(RttSummary {
                min: 10.0,
                avg: 20.0,
                max: 30.0,
                stddev: 8.16496580927726,
            }),
        };
        let text = summary_block(&target(), &summary);
        assert!(text.ends_with("round-trip min/avg/max/stddev = 10.000/20.000/30.000/8.165 ms"));
    }
}
