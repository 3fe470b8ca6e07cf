//! The fixed event-name → required-intent table consulted by the intent
//! filter, plus the message-family prefix it uses to decide whether a
//! dispatch is subject to content redaction.

use super::intents::GatewayIntents;

/// Event names that carry the message-family prefix. Any dispatch whose `t`
/// starts with one of these is a candidate for content redaction.
pub const MESSAGE_FAMILY_PREFIXES: &[&str] = &["MESSAGE_"];

#[must_use]
pub fn is_message_family(event_name: &str) -> bool {
    MESSAGE_FAMILY_PREFIXES
        .iter()
        .any(|prefix| event_name.starts_with(prefix))
}

/// Looks up the intent bit required to receive `event_name`, if any. Events
/// absent from this table (e.g. `READY`, `RESUMED`, member chunks answering
/// a request the session already gated) have no routing requirement beyond
/// the one already enforced at the call site.
#[must_use]
pub fn required_intent(event_name: &str) -> Option<GatewayIntents> {
    Some(match event_name {
        "GUILD_CREATE" | "GUILD_UPDATE" | "GUILD_DELETE" | "GUILD_ROLE_CREATE"
        | "GUILD_ROLE_UPDATE" | "GUILD_ROLE_DELETE" | "CHANNEL_CREATE" | "CHANNEL_UPDATE"
        | "CHANNEL_DELETE" | "CHANNEL_PINS_UPDATE" | "THREAD_CREATE" | "THREAD_UPDATE"
        | "THREAD_DELETE" => GatewayIntents::GUILDS,
        "GUILD_MEMBER_ADD" | "GUILD_MEMBER_UPDATE" | "GUILD_MEMBER_REMOVE" => {
            GatewayIntents::GUILD_MEMBERS
        }
        "GUILD_BAN_ADD" | "GUILD_BAN_REMOVE" | "GUILD_AUDIT_LOG_ENTRY_CREATE" => {
            GatewayIntents::GUILD_MODERATION
        }
        "GUILD_EMOJIS_UPDATE" | "GUILD_STICKERS_UPDATE" | "GUILD_SOUNDBOARD_SOUND_CREATE" => {
            GatewayIntents::GUILD_EXPRESSIONS
        }
        "GUILD_INTEGRATIONS_UPDATE" | "INTEGRATION_CREATE" | "INTEGRATION_UPDATE"
        | "INTEGRATION_DELETE" => GatewayIntents::GUILD_INTEGRATIONS,
        "WEBHOOKS_UPDATE" => GatewayIntents::GUILD_WEBHOOKS,
        "INVITE_CREATE" | "INVITE_DELETE" => GatewayIntents::GUILD_INVITES,
        "VOICE_STATE_UPDATE" => GatewayIntents::GUILD_VOICE_STATES,
        "PRESENCE_UPDATE" => GatewayIntents::GUILD_PRESENCES,
        "MESSAGE_CREATE" | "MESSAGE_UPDATE" | "MESSAGE_DELETE" | "MESSAGE_DELETE_BULK" => {
            GatewayIntents::GUILD_MESSAGES
        }
        "MESSAGE_REACTION_ADD" | "MESSAGE_REACTION_REMOVE" | "MESSAGE_REACTION_REMOVE_ALL"
        | "MESSAGE_REACTION_REMOVE_EMOJI" => GatewayIntents::GUILD_MESSAGE_REACTIONS,
        "TYPING_START" => GatewayIntents::GUILD_MESSAGE_TYPING,
        "GUILD_SCHEDULED_EVENT_CREATE"
        | "GUILD_SCHEDULED_EVENT_UPDATE"
        | "GUILD_SCHEDULED_EVENT_DELETE"
        | "GUILD_SCHEDULED_EVENT_USER_ADD"
        | "GUILD_SCHEDULED_EVENT_USER_REMOVE" => GatewayIntents::GUILD_SCHEDULED_EVENTS,
        "AUTO_MODERATION_RULE_CREATE" | "AUTO_MODERATION_RULE_UPDATE"
        | "AUTO_MODERATION_RULE_DELETE" => GatewayIntents::AUTO_MODERATION_CONFIGURATION,
        "AUTO_MODERATION_ACTION_EXECUTION" => GatewayIntents::AUTO_MODERATION_EXECUTION,
        "MESSAGE_POLL_VOTE_ADD" | "MESSAGE_POLL_VOTE_REMOVE" => {
            GatewayIntents::GUILD_MESSAGE_POLLS
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_create_requires_guild_messages() {
        assert_eq!(
            required_intent("MESSAGE_CREATE"),
            Some(GatewayIntents::GUILD_MESSAGES)
        );
    }

    #[test]
    fn ready_has_no_required_intent() {
        assert_eq!(required_intent("READY"), None);
    }

    #[test]
    fn recognizes_message_family_prefix() {
        assert!(is_message_family("MESSAGE_CREATE"));
        assert!(is_message_family("MESSAGE_REACTION_ADD"));
        assert!(!is_message_family("GUILD_CREATE"));
    }
}
