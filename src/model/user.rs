//! The user module contains all the user-related structs and enums.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A decorative frame layered over a user's avatar.
pub struct AvatarDecoration {
    pub asset: String,
    pub sku_id: u64,
}

bitflags! {
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    #[non_exhaustive]
    /// Public account flags surfaced alongside a [`User`].
    pub struct UserFlags: u64 {
        const STAFF = 1 << 0;
        const PARTNER = 1 << 1;
        const VERIFIED_BOT = 1 << 16;
        const VERIFIED_DEVELOPER = 1 << 17;
        const CERTIFIED_MODERATOR = 1 << 18;
        const BOT_HTTP_INTERACTIONS = 1 << 19;
        const ACTIVE_DEVELOPER = 1 << 22;
    }
}

impl<'de> Deserialize<'de> for UserFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

impl Serialize for UserFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A user account, as surfaced on dispatches that reference one (message
/// authors, guild members, presence updates).
pub struct User {
    // TODO: ids come in as strings but should be u64s
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    // TODO: consider a dedicated image-hash newtype
    pub avatar: Option<String>,
    pub bot: Option<bool>,
    pub system: Option<bool>,
    pub banner: Option<String>,
    pub accent_color: Option<u32>,
    pub locale: Option<String>,
    pub flags: Option<UserFlags>,
    pub public_flags: Option<UserFlags>,
    pub avatar_decoration_data: Option<AvatarDecoration>,
}
