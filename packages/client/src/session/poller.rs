//! Poll bookkeeping and round-trip-time estimation.
//!
//! Every poll carries a strictly increasing `commandId`. The matching
//! `poll-result` yields one RTT sample, folded into an SRTT.

use std::{collections::BTreeMap, time::Duration};

use tokio::time::Instant;

use crate::config::PollWindow;

/// Gain of the exponential moving average (classic TCP estimator)
const SRTT_GAIN: f64 = 1.0 / 8.0;

/// Shortest gap between two poll ticks, whatever the settings say
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A poll awaiting its `poll-result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRecord {
    pub poll_number: u64,
    /// Unix timestamp (milliseconds)
    pub time_sent: i64,
}

/// Correlation data for the next poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollTicket {
    pub command_id: u64,
    /// One-way latency estimate (SRTT / 2), in milliseconds
    pub latency: f64,
}

/// Smoothed round-trip time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SrttEstimator {
    srtt: Option<f64>,
}

impl SrttEstimator {
    /// Current estimate in milliseconds; zero before the first sample
    pub fn value(&self) -> f64 {
        self.srtt.unwrap_or(0.0)
    }

    pub fn has_sample(&self) -> bool {
        self.srtt.is_some()
    }

    /// Fold one sample in. The first sample seeds the estimate.
    pub fn update(&mut self, sample: f64) {
        let sample = sample.max(0.0);
        self.srtt = Some(match self.srtt {
            Some(srtt) => srtt + SRTT_GAIN * (sample - srtt),
            None => sample,
        });
    }
}

/// Unacknowledged polls of one session and the SRTT they feed
#[derive(Debug, Clone)]
pub struct PollTracker {
    next_poll_number: u64,
    unacked: BTreeMap<u64, PollRecord>,
    srtt: SrttEstimator,
    window: PollWindow,
}

impl PollTracker {
    pub fn new(window: PollWindow) -> Self {
        Self {
            next_poll_number: 1,
            unacked: BTreeMap::new(),
            srtt: SrttEstimator::default(),
            window,
        }
    }

    /// Correlation data for the poll about to be sent
    pub fn next_ticket(&self) -> PollTicket {
        PollTicket {
            command_id: self.next_poll_number,
            latency: self.srtt.value() / 2.0,
        }
    }

    /// Record a sent poll and move on to the next poll number.
    ///
    /// Evicts records beyond the window so a relay that never answers cannot
    /// grow the map without bound.
    pub fn record(&mut self, ticket: PollTicket, time_sent: i64) {
        self.unacked.insert(
            ticket.command_id,
            PollRecord {
                poll_number: ticket.command_id,
                time_sent,
            },
        );
        self.advance_past(ticket.command_id);
        self.evict(time_sent);
    }

    /// Burn a ticket whose poll never left
    pub fn skip(&mut self, ticket: PollTicket) {
        self.advance_past(ticket.command_id);
    }

    /// Match a `poll-result` against the pending polls.
    ///
    /// Returns the RTT sample, or `None` for an unknown or expired id, in which
    /// case the SRTT is left untouched.
    pub fn acknowledge(&mut self, command_id: u64, now: i64) -> Option<f64> {
        let record = self.unacked.remove(&command_id)?;
        let sample = (now - record.time_sent).max(0) as f64;
        self.srtt.update(sample);
        Some(sample)
    }

    /// Forget every pending poll; the poll number keeps counting
    pub fn clear_unacked(&mut self) {
        self.unacked.clear();
    }

    pub fn srtt(&self) -> f64 {
        self.srtt.value()
    }

    pub fn unacked(&self) -> impl Iterator<Item = &PollRecord> {
        self.unacked.values()
    }

    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    pub fn next_poll_number(&self) -> u64 {
        self.next_poll_number
    }

    fn advance_past(&mut self, command_id: u64) {
        self.next_poll_number = self.next_poll_number.max(command_id + 1);
    }

    fn evict(&mut self, now: i64) {
        let max_age = self.window.max_age.as_millis() as i64;
        let before = self.unacked.len();
        self.unacked
            .retain(|_, record| now - record.time_sent <= max_age);
        while self.unacked.len() > self.window.max_pending {
            self.unacked.pop_first();
        }
        let evicted = before - self.unacked.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} unacknowledged polls", evicted);
        }
    }
}

/// Cancelable repeating schedule of poll ticks.
///
/// The interval is supplied at every reschedule, so a changed setting takes
/// effect from the next tick on.
#[derive(Debug, Default)]
pub struct Poller {
    next_deadline: Option<Instant>,
}

impl Poller {
    /// Start ticking; the first tick is due immediately
    pub fn start(&mut self, now: Instant) {
        self.next_deadline = Some(now);
    }

    /// Stop ticking. Safe to call repeatedly; returns whether it was running.
    pub fn cancel(&mut self) -> bool {
        self.next_deadline.take().is_some()
    }

    /// Schedule the next tick `interval` after `now`, unless canceled.
    ///
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn reschedule(&mut self, now: Instant, interval: Duration) {
        if self.next_deadline.is_some() {
            self.next_deadline = Some(now + interval.max(MIN_POLL_INTERVAL));
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_deadline.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }
}
