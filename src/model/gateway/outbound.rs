//! Server→client frame envelopes.

use serde::Serialize;

use super::opcode::OpCode;

/// The one envelope shape every outbound frame is serialized through:
/// `{op, d, s?, t?}`. `s` and `t` are only ever populated for
/// [`OpCode::Dispatch`]; every other opcode leaves them `null`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<T: Serialize> {
    pub op: OpCode,
    pub d: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl<T: Serialize> OutboundFrame<T> {
    pub fn control(op: OpCode, d: T) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Builds the single frame shape [`super::session::Session::dispatch`] is
    /// permitted to emit: a sequence-stamped, event-named `DISPATCH`.
    pub fn dispatch(sequence: u64, event_name: impl Into<String>, d: T) -> Self {
        Self {
            op: OpCode::Dispatch,
            d,
            s: Some(sequence),
            t: Some(event_name.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidSessionPayload {
    pub resumable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frame_omits_sequence_and_event_name() {
        let frame = OutboundFrame::control(
            OpCode::Hello,
            HelloPayload {
                heartbeat_interval: 41_250,
            },
        );
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("s").is_none());
        assert!(json.get("t").is_none());
        assert_eq!(json["op"], 10);
    }

    #[test]
    fn dispatch_frame_carries_sequence_and_event_name() {
        let frame = OutboundFrame::dispatch(7, "MESSAGE_CREATE", serde_json::json!({}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], 0);
        assert_eq!(json["s"], 7);
        assert_eq!(json["t"], "MESSAGE_CREATE");
    }
}
