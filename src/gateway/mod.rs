//! The realtime gateway core: the long-lived, bidirectional client-to-server
//! protocol that delivers events with ordering, intent filtering, session
//! resumption, and horizontal scale-out across multiple gateway processes.
//!
//! [`acceptor`] is the connection acceptor, [`connection`] is the
//! per-connection opcode state machine, [`room`] is the process-local room
//! index, [`store`] is the session/resume store, [`bus`] is the
//! cross-process pub/sub bus, [`intent_filter`] is the intent filter and
//! redactor, and [`rate_limit`] is the per-opcode rate limiter.

pub mod acceptor;
pub mod bus;
pub mod collaborators;
pub mod connection;
pub mod error;
pub mod fanout;
pub mod intent_filter;
pub mod rate_limit;
pub mod room;
pub mod session;
pub mod state;
pub mod store;
