//! Client→server frame payloads and the envelope decoder.

use serde::Deserialize;

use crate::gateway::error::Error as GatewayError;
use crate::model::gateway::intents::GatewayIntents;
use crate::model::presence::{Activity, PresenceStatus};

use super::opcode::OpCode;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: GatewayIntents,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    #[serde(rename = "seq")]
    pub sequence: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CustomStatusInput {
    Structured { text: String },
    Plain(String),
}

impl CustomStatusInput {
    /// Normalizes a plain-string custom status to `{text}`.
    pub fn into_text(self) -> String {
        match self {
            CustomStatusInput::Structured { text } => text,
            CustomStatusInput::Plain(text) => text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceUpdatePayload {
    pub status: PresenceStatus,
    #[serde(default)]
    pub custom_status: Option<CustomStatusInput>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStateUpdatePayload {
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub presences: bool,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// A decoded, validated inbound frame.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Heartbeat(Option<u64>),
    Identify(IdentifyPayload),
    Resume(ResumePayload),
    PresenceUpdate(PresenceUpdatePayload),
    VoiceStateUpdate(VoiceStateUpdatePayload),
    RequestGuildMembers(RequestGuildMembersPayload),
}

impl ClientFrame {
    /// Decodes one text frame's raw JSON into a typed, opcode-dispatched
    /// value. Unknown opcodes and shape mismatches both surface as
    /// [`GatewayError::MalformedPayload`]; the protocol engine maps any of
    /// those to an `INVALID_SESSION(resumable=false)`.
    pub fn decode(text: &str) -> Result<Self, GatewayError> {
        let mut envelope: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text)?;

        let op_value = envelope
            .remove("op")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| serde_json::Error::custom_missing("op"))?;
        let op = OpCode::try_from(op_value as u8)
            .map_err(|_| serde_json::Error::custom_missing("unknown op"))?;
        let data = envelope.remove("d").unwrap_or(serde_json::Value::Null);

        Ok(match op {
            OpCode::Heartbeat => ClientFrame::Heartbeat(data.as_u64()),
            OpCode::Identify => ClientFrame::Identify(serde_json::from_value(data)?),
            OpCode::Resume => ClientFrame::Resume(serde_json::from_value(data)?),
            OpCode::PresenceUpdate => ClientFrame::PresenceUpdate(serde_json::from_value(data)?),
            OpCode::VoiceStateUpdate => {
                ClientFrame::VoiceStateUpdate(serde_json::from_value(data)?)
            }
            OpCode::RequestGuildMembers => {
                ClientFrame::RequestGuildMembers(serde_json::from_value(data)?)
            }
            OpCode::Dispatch
            | OpCode::Reconnect
            | OpCode::InvalidSession
            | OpCode::Hello
            | OpCode::HeartbeatAck => {
                return Err(GatewayError::OpcodeNotAllowedInState);
            }
        })
    }

    /// The opcode this frame was decoded from, for rate-limiting and logging.
    pub fn opcode(&self) -> OpCode {
        match self {
            ClientFrame::Heartbeat(_) => OpCode::Heartbeat,
            ClientFrame::Identify(_) => OpCode::Identify,
            ClientFrame::Resume(_) => OpCode::Resume,
            ClientFrame::PresenceUpdate(_) => OpCode::PresenceUpdate,
            ClientFrame::VoiceStateUpdate(_) => OpCode::VoiceStateUpdate,
            ClientFrame::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
        }
    }
}

/// Small helper so missing/invalid envelope fields produce a regular
/// `serde_json::Error` we can funnel through the same `From` impl as shape
/// mismatches, instead of a second error type for envelope-level problems.
trait CustomMissing {
    fn custom_missing(field: &str) -> Self;
}

impl CustomMissing for serde_json::Error {
    fn custom_missing(field: &str) -> Self {
        serde::de::Error::custom(format!("missing or invalid field: {field}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_heartbeat_with_null_sequence() {
        let frame = ClientFrame::decode(r#"{"op":1,"d":null}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Heartbeat(None)));
    }

    #[test]
    fn decodes_heartbeat_with_sequence() {
        let frame = ClientFrame::decode(r#"{"op":1,"d":42}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Heartbeat(Some(42))));
    }

    #[test]
    fn decodes_identify() {
        let frame = ClientFrame::decode(
            r#"{"op":2,"d":{"token":"abc","intents":1}}"#,
        )
        .unwrap();
        match frame {
            ClientFrame::Identify(payload) => {
                assert_eq!(payload.token, "abc");
                assert!(payload.intents.contains(GatewayIntents::GUILDS));
            }
            _ => panic!("expected identify"),
        }
    }

    #[test]
    fn rejects_send_only_opcode() {
        let err = ClientFrame::decode(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#)
            .unwrap_err();
        assert!(matches!(err, GatewayError::OpcodeNotAllowedInState));
    }

    #[test]
    fn normalizes_plain_custom_status() {
        let input: CustomStatusInput = serde_json::from_str(r#""brb""#).unwrap();
        assert_eq!(input.into_text(), "brb");
    }
}
