use std::time::Duration;

use serde::Serialize;

use crate::engine::ProbeOutcome;

/// Running counters for one session. Derived figures are computed on demand
/// in [`SessionStats::summary`].
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    sent: u32,
    received: u32,
    rtts: Vec<f64>,
    min: f64,
    max: f64,
    sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RttSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub transmitted: u32,
    pub received: u32,
    pub loss_pct: f64,
    pub elapsed_ms: f64,
    /// Absent when nothing was received.
    pub rtt: Option<RttSummary>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.sent += 1;
        if let ProbeOutcome::Success { rtt_ms, .. } = *outcome {
            self.record_rtt(rtt_ms);
        }
    }

    fn record_rtt(&mut self, rtt_ms: f64) {
        if self.received == 0 {
            self.min = rtt_ms;
            self.max = rtt_ms;
        } else {
            self.min = self.min.min(rtt_ms);
            self.max = self.max.max(rtt_ms);
        }
        self.received += 1;
        self.sum += rtt_ms;
        self.rtts.push(rtt_ms);
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn rtts(&self) -> &[f64] {
        &self.rtts
    }

    pub fn loss_pct(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        f64::from(self.sent - self.received) * 100.0 / f64::from(self.sent)
    }

    pub fn rtt_summary(&self) -> Option<RttSummary> {
        if self.received == 0 {
            return None;
        }
        let n = f64::from(self.received);
        let avg = self.sum / n;
        // Population variance, as ping(8) reports it.
        let variance = self.rtts.iter().map(|x| (x - avg) * (x - avg)).sum::<f64>() / n;
        Some(RttSummary {
            min: self.min,
            avg,
            max: self.max,
            stddev: variance.sqrt(),
        })
    }

    pub fn summary(&self, elapsed: Duration) -> Summary {
        Summary {
            transmitted: self.sent,
            received: self.received,
            loss_pct: self.loss_pct(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            rtt: self.rtt_summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(rtt_ms: f64) -> ProbeOutcome {
        ProbeOutcome::Success {
            rtt_ms,
            ttl: 64,
            reply_bytes: 64,
        }
    }

    #[test]
    fn empty_session_has_no_loss_and_no_rtt() {
        let stats = SessionStats::new();
        let summary = stats.summary(Duration::ZERO);
        assert_eq!(summary.transmitted, 0);
        assert_eq!(summary.received, 0);
        assert_eq!(summary.loss_pct, 0.0);
        assert!(summary.rtt.is_none());
    }

    #[test]
    fn rtt_figures_for_three_samples() {
        let mut stats = SessionStats::new();
        for rtt in [20.0, 10.0, 30.0] {
            stats.record(&success(rtt));
        }

        let rtt = stats.rtt_summary().expect("three successes");
        assert_eq!(rtt.min, 10.0);
        assert_eq!(rtt.max, 30.0);
        assert!((rtt.avg - 20.0).abs() < 1e-9);
        assert!((rtt.stddev - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!((rtt.stddev - 8.165).abs() < 1e-3);
        assert_eq!(stats.rtts(), &[20.0, 10.0, 30.0]);
    }

    #[test]
    fn losses_count_as_sent_only() {
        let mut stats = SessionStats::new();
        stats.record(&success(5.0));
        stats.record(&ProbeOutcome::Timeout);
        stats.record(&ProbeOutcome::TransportError("boom".into()));
        stats.record(&ProbeOutcome::Timeout);

        assert_eq!(stats.sent(), 4);
        assert_eq!(stats.received(), 1);
        assert_eq!(stats.loss_pct(), 75.0);

        let rtt = stats.rtt_summary().expect("one success");
        assert_eq!(rtt.min, 5.0);
        assert_eq!(rtt.max, 5.0);
        assert_eq!(rtt.stddev, 0.0);
    }

    #[test]
    fn all_lost_is_full_loss() {
        let mut stats = SessionStats::new();
        for _ in 0..3 {
            stats.record(&ProbeOutcome::Timeout);
        }
        let summary = stats.summary(Duration::from_millis(1500));
        assert_eq!(summary.loss_pct, 100.0);
        assert_eq!(summary.elapsed_ms, 1500.0);
        assert!(summary.rtt.is_none());
    }
}
