//! Per-connection, per-opcode sliding-window rate limiting.
//!
//! The bucket table is owned exclusively by the connection task, same as the
//! `Session` it guards, so it needs no lock: nothing else ever reads or
//! writes a given connection's buckets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::gateway::opcode::OpCode;

#[derive(Debug, Clone, Copy)]
struct Window {
    max: u32,
    duration: Duration,
}

fn window_for(op: OpCode) -> Option<Window> {
    Some(match op {
        OpCode::Identify => Window {
            max: 1,
            duration: Duration::from_secs(5),
        },
        OpCode::Heartbeat => Window {
            max: 3,
            duration: Duration::from_secs(41),
        },
        OpCode::PresenceUpdate => Window {
            max: 5,
            duration: Duration::from_secs(60),
        },
        OpCode::VoiceStateUpdate => Window {
            max: 5,
            duration: Duration::from_secs(10),
        },
        OpCode::RequestGuildMembers => Window {
            max: 10,
            duration: Duration::from_secs(120),
        },
        _ => return None,
    })
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

/// Sliding-window counters for one connection, keyed by inbound opcode.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: HashMap<OpCode, Bucket>,
}

impl RateLimiter {
    /// Records one inbound frame of `op` and reports whether it is within
    /// budget. Opcodes with no configured window (none currently) always
    /// pass.
    pub fn check(&mut self, op: OpCode, now: Instant) -> bool {
        let Some(window) = window_for(op) else {
            return true;
        };

        match self.buckets.get_mut(&op) {
            Some(bucket) if now.duration_since(bucket.window_start) < window.duration => {
                bucket.count += 1;
                bucket.count <= window.max
            }
            _ => {
                self.buckets.insert(
                    op,
                    Bucket {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Drops buckets whose window closed more than two window-lengths ago,
    /// keeping the table from growing across a very long-lived connection.
    pub fn prune(&mut self, now: Instant) {
        self.buckets.retain(|op, bucket| {
            let Some(window) = window_for(*op) else {
                return false;
            };
            now.duration_since(bucket.window_start) < window.duration * 2
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_rejects() {
        let mut limiter = RateLimiter::default();
        let now = Instant::now();
        assert!(limiter.check(OpCode::Identify, now));
        assert!(!limiter.check(OpCode::Identify, now));
    }

    #[test]
    fn resets_after_window_elapses() {
        let mut limiter = RateLimiter::default();
        let now = Instant::now();
        assert!(limiter.check(OpCode::Identify, now));
        assert!(!limiter.check(OpCode::Identify, now));
        let later = now + Duration::from_secs(6);
        assert!(limiter.check(OpCode::Identify, later));
    }

    #[test]
    fn unbounded_opcode_always_passes() {
        let mut limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..100 {
            assert!(limiter.check(OpCode::Resume, now));
        }
    }
}
