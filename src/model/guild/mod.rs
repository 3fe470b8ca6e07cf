//! The guild module contains all the guild-related structs and enums.

use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A guild the identifying session belongs to but that has not finished
/// loading yet, or has dropped offline. Sent as a placeholder in `READY` and
/// replaced by a full `GUILD_CREATE` once available.
pub struct UnavailableGuild {
    // TODO: guild ids come in as strings but should be u64s
    pub id: String,
    pub unavailable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The minimal guild snapshot the Guild/User snapshot loader collaborator
/// returns for `getUserGuilds`, used to populate `Session.guilds` and the
/// `READY` payload's `guilds` list.
pub struct GuildSnapshot {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Per-channel unread state, as returned by `getReadStates`.
pub struct ReadState {
    pub channel_id: String,
    pub last_message_id: Option<String>,
    #[serde(default)]
    pub mention_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Friend,
    Blocked,
    PendingIncoming,
    PendingOutgoing,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A friend/block/pending-request relationship, as returned by
/// `getRelationships`.
pub struct Relationship {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DmChannelKind {
    Dm,
    GroupDm,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A direct-message channel, as returned by `getUserDMChannels`.
pub struct DmChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DmChannelKind,
    pub recipients: Vec<User>,
    #[serde(default)]
    pub last_message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A member of a guild: the account plus guild-scoped state.
pub struct Member {
    pub user: Option<super::user::User>,
    pub nick: Option<String>,
    pub roles: Vec<String>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub deaf: bool,
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A role granted permissions and a position in a guild's hierarchy.
pub struct Role {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i64,
    pub permissions: String,
    pub mentionable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// One row of a member fetcher's response (`REQUEST_GUILD_MEMBERS`'s
/// by-ids/by-prefix/paginated variants all return this shape).
pub struct MemberRow {
    pub member: Member,
    pub user: User,
    pub roles: Vec<Role>,
}
