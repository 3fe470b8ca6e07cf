use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitmask of event families a session has opted into receiving.
    ///
    /// An `IDENTIFY`/`RESUME` carries this mask; the fan-out path consults it
    /// per-event before a dispatch is ever queued for a session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GatewayIntents: u32 {
        /// Guild lifecycle and structure: create/update/delete of the guild
        /// itself, its roles, and its channels.
        const GUILDS = 1 << 0;
        /// Member join/update/leave. Privileged.
        const GUILD_MEMBERS = 1 << 1;
        /// Moderation actions: bans and audit log entries.
        const GUILD_MODERATION = 1 << 2;
        /// Custom emoji, sticker, and soundboard sound changes.
        const GUILD_EXPRESSIONS = 1 << 3;
        /// Third-party integration lifecycle.
        const GUILD_INTEGRATIONS = 1 << 4;
        /// Webhook configuration changes.
        const GUILD_WEBHOOKS = 1 << 5;
        /// Invite creation and deletion.
        const GUILD_INVITES = 1 << 6;
        /// Voice channel join/leave/move and in-call effects.
        const GUILD_VOICE_STATES = 1 << 7;
        /// Presence and status changes. Privileged.
        const GUILD_PRESENCES = 1 << 8;
        /// Message create/update/delete in guild channels.
        const GUILD_MESSAGES = 1 << 9;
        /// Reaction add/remove in guild channels.
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        /// Typing indicators in guild channels.
        const GUILD_MESSAGE_TYPING = 1 << 11;
        /// Message create/update/delete in direct messages.
        const DIRECT_MESSAGES = 1 << 12;
        /// Reaction add/remove in direct messages.
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        /// Typing indicators in direct messages.
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        /// The body of a message (content, embeds, attachments, components).
        /// Privileged; redacted from dispatches for sessions lacking it.
        const MESSAGE_CONTENT = 1 << 15;
        /// Scheduled event lifecycle and RSVP changes.
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
        /// Auto-moderation rule configuration.
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        /// Auto-moderation rule execution.
        const AUTO_MODERATION_EXECUTION = 1 << 21;
        /// Poll vote changes in guild channels.
        const GUILD_MESSAGE_POLLS = 1 << 24;
        /// Poll vote changes in direct messages.
        const DIRECT_MESSAGE_POLLS = 1 << 25;
    }
}

impl Serialize for GatewayIntents {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GatewayIntents {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

impl GatewayIntents {
    /// Intents that require explicit grant on the identifying application,
    /// because the events they unlock expose data beyond a member's own
    /// actions (full member lists, presence, message bodies).
    #[must_use]
    pub fn privileged() -> GatewayIntents {
        Self::GUILD_MEMBERS | Self::GUILD_PRESENCES | Self::MESSAGE_CONTENT
    }

    #[must_use]
    pub fn non_privileged() -> GatewayIntents {
        Self::privileged().complement()
    }
}

impl Default for GatewayIntents {
    fn default() -> Self {
        Self::non_privileged()
    }
}
