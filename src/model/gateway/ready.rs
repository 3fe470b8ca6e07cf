//! The `READY`/`RESUMED` dispatch payloads and the `REQUEST_GUILD_MEMBERS`
//! response shape, built by the protocol engine rather than deserialized off
//! the wire.

use serde::Serialize;

use crate::model::guild::{DmChannel, ReadState, Relationship, UnavailableGuild};
use crate::model::presence::PresenceRecord;
use crate::model::user::User;

/// Initial snapshot sent as the sole payload of the `READY` dispatch once
/// `IDENTIFY` succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyPayload {
    pub v: u16,
    pub user: User,
    pub session_id: String,
    pub guilds: Vec<UnavailableGuild>,
    pub read_states: Vec<ReadState>,
    pub relationships: Vec<Relationship>,
    pub private_channels: Vec<DmChannel>,
}

/// One page of a `REQUEST_GUILD_MEMBERS` response. Chunks are capped at
/// 1000 members and carry the client's own nonce back so it can correlate
/// out-of-order chunk delivery with its request.
#[derive(Debug, Clone, Serialize)]
pub struct GuildMembersChunkPayload {
    pub guild_id: String,
    pub members: Vec<super::super::guild::MemberRow>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presences: Option<Vec<PresenceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}
