//! The counter interface the core accepts at its observability boundary:
//! connection count, frames in/out per opcode, rate-limit rejections,
//! resume attempts, and bus lag. Lock-free `AtomicU64` counters behind a
//! small trait so tests can substitute a no-op.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::gateway::opcode::OpCode;

/// The outcome of a `RESUME` attempt, for the `resume_attempts` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Success,
    Failed,
    BufferGap,
}

pub trait Counters: Send + Sync + Debug {
    fn connection_opened(&self);
    fn connection_closed(&self);
    fn frame_in(&self, op: OpCode);
    fn frame_out(&self, op: OpCode);
    fn rate_limit_rejected(&self);
    fn resume_attempt(&self, outcome: ResumeOutcome);
    fn bus_message_received(&self);
}

#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lock-free production implementation. Per-opcode counters are stored in a
/// fixed array indexed by the opcode's wire value rather than a map, since
/// the opcode set is small and closed.
#[derive(Debug, Default)]
pub struct AtomicCounters {
    connections_open: Counter,
    connections_total: Counter,
    frames_in: [Counter; 16],
    frames_out: [Counter; 16],
    rate_limit_rejections: Counter,
    resume_success: Counter,
    resume_failed: Counter,
    resume_buffer_gap: Counter,
    bus_messages: Counter,
}

impl AtomicCounters {
    #[must_use]
    pub fn connections_open(&self) -> u64 {
        self.connections_open.get()
    }

    #[must_use]
    pub fn connections_total(&self) -> u64 {
        self.connections_total.get()
    }

    #[must_use]
    pub fn frame_in_count(&self, op: OpCode) -> u64 {
        self.frames_in[u8::from(op) as usize].get()
    }

    #[must_use]
    pub fn frame_out_count(&self, op: OpCode) -> u64 {
        self.frames_out[u8::from(op) as usize].get()
    }

    #[must_use]
    pub fn rate_limit_rejections(&self) -> u64 {
        self.rate_limit_rejections.get()
    }

    #[must_use]
    pub fn resume_success(&self) -> u64 {
        self.resume_success.get()
    }
}

impl Counters for AtomicCounters {
    fn connection_opened(&self) {
        self.connections_open.increment();
        self.connections_total.increment();
    }

    fn connection_closed(&self) {
        self.connections_open.0.fetch_sub(1, Ordering::Relaxed);
    }

    fn frame_in(&self, op: OpCode) {
        self.frames_in[u8::from(op) as usize].increment();
    }

    fn frame_out(&self, op: OpCode) {
        self.frames_out[u8::from(op) as usize].increment();
    }

    fn rate_limit_rejected(&self) {
        self.rate_limit_rejections.increment();
    }

    fn resume_attempt(&self, outcome: ResumeOutcome) {
        match outcome {
            ResumeOutcome::Success => self.resume_success.increment(),
            ResumeOutcome::Failed => self.resume_failed.increment(),
            ResumeOutcome::BufferGap => self.resume_buffer_gap.increment(),
        }
    }

    fn bus_message_received(&self) {
        self.bus_messages.increment();
    }
}

/// No-op implementation used by tests that don't care about counters.
#[derive(Debug, Default)]
pub struct NoopCounters;

impl Counters for NoopCounters {
    fn connection_opened(&self) {}
    fn connection_closed(&self) {}
    fn frame_in(&self, _op: OpCode) {}
    fn frame_out(&self, _op: OpCode) {}
    fn rate_limit_rejected(&self) {}
    fn resume_attempt(&self, _outcome: ResumeOutcome) {}
    fn bus_message_received(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_open_and_total_connections_independently() {
        let counters = AtomicCounters::default();
        counters.connection_opened();
        counters.connection_opened();
        counters.connection_closed();
        assert_eq!(counters.connections_open(), 1);
        assert_eq!(counters.connections_total(), 2);
    }

    #[test]
    fn frame_counters_are_keyed_by_opcode() {
        let counters = AtomicCounters::default();
        counters.frame_in(OpCode::Identify);
        counters.frame_in(OpCode::Heartbeat);
        counters.frame_in(OpCode::Heartbeat);
        assert_eq!(counters.frame_in_count(OpCode::Identify), 1);
        assert_eq!(counters.frame_in_count(OpCode::Heartbeat), 2);
        assert_eq!(counters.frame_in_count(OpCode::Resume), 0);
    }
}
