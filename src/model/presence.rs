//! Presence: the status and activity a session broadcasts to other members.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

impl Default for PresenceStatus {
    fn default() -> Self {
        PresenceStatus::Online
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomStatus {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Competing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub url: Option<String>,
}

/// The presence record fanned out as part of a `PRESENCE_UPDATE` dispatch.
/// Constructed by the presence handler from a client's `PresenceUpdatePayload`
/// plus the identity of the session that sent it; never deserialized
/// directly off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub guild_id: Option<String>,
    pub status: PresenceStatus,
    #[serde(default)]
    pub custom_status: Option<CustomStatus>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}
