#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
// TODO: Remove up to missing_docs comment
#![allow(clippy::missing_errors_doc)]
// #![deny(missing_docs)]

//! # chorus-gateway
//!
//! The realtime gateway core for a chat/voice platform: a stateful session
//! protocol with sequence-numbered replay, intent-filtered fan-out, and
//! cross-process event distribution.

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod model;
