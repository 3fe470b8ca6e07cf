//! Wire types for the realtime gateway protocol: opcodes, intents, the
//! client→server and server→client frame shapes, and the event-name/intent
//! table the fan-out path consults.

pub mod events;
pub mod inbound;
pub mod intents;
pub mod opcode;
pub mod outbound;
pub mod ready;
