//! Peer connection lifecycle state and the exponential-backoff reconnect
//! schedule: initial 1s, cap 30s, full jitter.

use std::time::{Duration, Instant};

use rand::Rng;

const INITIAL: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnState {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 }
}

/// Full-jitter exponential backoff: `rand(0, min(cap, initial * 2^attempt))`,
/// the standard AWS "full jitter" formula.
pub fn next_backoff(attempt: u32) -> Duration {
    let exp = INITIAL.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let bound = exp.min(CAP);
    let millis = bound.as_millis().max(1) as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}

/// Tracks one peer's connection state across reconnect attempts.
#[derive(Debug)]
pub struct PeerBackoff {
    state:       PeerConnState,
    next_attempt_at: Instant
}

impl PeerBackoff {
    pub fn new() -> Self {
        Self { state: PeerConnState::Disconnected, next_attempt_at: Instant::now() }
    }

    pub fn state(&self) -> PeerConnState {
        self.state
    }

    pub fn mark_connected(&mut self) {
        self.state = PeerConnState::Connected;
    }

    /// Called when a stream fails or a dial attempt errors. Schedules the
    /// next reconnect attempt and returns the delay to wait.
    pub fn mark_disconnected(&mut self) -> Duration {
        let attempt = match self.state {
            PeerConnState::Reconnecting { attempt } => attempt + 1,
            _ => 0
        };
        let delay = next_backoff(attempt);
        self.state = PeerConnState::Reconnecting { attempt };
        self.next_attempt_at = Instant::now() + delay;
        delay
    }

    pub fn ready_to_retry(&self) -> bool {
        Instant::now() >= self.next_attempt_at
    }
}

impl Default for PeerBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap() {
        for attempt in 0..20 {
            assert!(next_backoff(attempt) <= CAP);
        }
    }

    #[test]
    fn mark_disconnected_advances_attempt_counter() {
        let mut backoff = PeerBackoff::new();
        backoff.mark_disconnected();
        assert_eq!(backoff.state(), PeerConnState::Reconnecting { attempt: 0 });
        backoff.mark_disconnected();
        assert_eq!(backoff.state(), PeerConnState::Reconnecting { attempt: 1 });
    }

    #[test]
    fn mark_connected_resets_state() {
        let mut backoff = PeerBackoff::new();
        backoff.mark_disconnected();
        backoff.mark_connected();
        assert_eq!(backoff.state(), PeerConnState::Connected);
    }
}
