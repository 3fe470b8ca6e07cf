//! Voice-state payloads: the `VOICE_STATE_UPDATE` dispatch body and the
//! `VOICE_SERVER_UPDATE` credentials handed back by the Voice collaborator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceState {
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
}

/// Media-server credentials the Voice collaborator returns on a successful
/// join; relayed to the identifying session alone as `VOICE_SERVER_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceServerUpdate {
    pub token: String,
    pub guild_id: String,
    pub endpoint: String,
}
