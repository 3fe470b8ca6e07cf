use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[repr(u8)]
#[serde(into = "u8", from = "u8")]
#[non_exhaustive]
/// Fixed gateway opcode values exchanged over the websocket transport.
pub enum OpCode {
    /// **Send** only. An event was dispatched; the payload is carried in `d`
    /// and the event name in `t`.
    Dispatch = 0,
    /// **Send/Receive**. Client keepalive; server acknowledges with
    /// [`OpCode::HeartbeatAck`].
    Heartbeat = 1,
    /// **Receive** only. Starts a new session.
    Identify = 2,
    /// **Receive** only. Updates the client's presence.
    PresenceUpdate = 3,
    /// **Receive** only. Joins/leaves/moves between voice channels.
    VoiceStateUpdate = 4,
    /// **Receive** only. Resumes a previous session.
    Resume = 6,
    /// **Send** only. Advisory: the client should disconnect and resume
    /// elsewhere.
    Reconnect = 7,
    /// **Receive** only. Requests guild member chunks.
    RequestGuildMembers = 8,
    /// **Send** only. The session is no longer valid; `d` carries a
    /// `resumable` boolean.
    InvalidSession = 9,
    /// **Send** only. Sent immediately after accept; `d` carries the
    /// heartbeat interval in milliseconds.
    Hello = 10,
    /// **Send** only. Acknowledges a heartbeat.
    HeartbeatAck = 11,
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Dispatch,
            1 => OpCode::Heartbeat,
            2 => OpCode::Identify,
            3 => OpCode::PresenceUpdate,
            4 => OpCode::VoiceStateUpdate,
            6 => OpCode::Resume,
            7 => OpCode::Reconnect,
            8 => OpCode::RequestGuildMembers,
            9 => OpCode::InvalidSession,
            10 => OpCode::Hello,
            11 => OpCode::HeartbeatAck,
            other => return Err(other),
        })
    }
}

impl From<u8> for OpCode {
    /// Only used by `serde`'s `from = "u8"` on outbound (server-authored)
    /// frames, where the value is always one of our own constants.
    fn from(value: u8) -> Self {
        Self::try_from(value).unwrap_or(OpCode::Dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_values() {
        for op in [
            OpCode::Dispatch,
            OpCode::Heartbeat,
            OpCode::Identify,
            OpCode::PresenceUpdate,
            OpCode::VoiceStateUpdate,
            OpCode::Resume,
            OpCode::Reconnect,
            OpCode::RequestGuildMembers,
            OpCode::InvalidSession,
            OpCode::Hello,
            OpCode::HeartbeatAck,
        ] {
            let byte: u8 = op.into();
            assert_eq!(OpCode::try_from(byte), Ok(op));
        }
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(OpCode::try_from(31), Err(31));
    }
}
