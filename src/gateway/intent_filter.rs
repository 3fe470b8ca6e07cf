//! Per-subscriber gate that drops events lacking the declared intent and
//! redacts message content from subscribers who did not opt into
//! `MESSAGE_CONTENT`.

use crate::model::gateway::events::{is_message_family, required_intent};
use crate::model::gateway::intents::GatewayIntents;
use crate::model::message::MessagePayload;

/// The outcome of running one candidate subscriber through the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The event does not reach this subscriber at all.
    Drop,
    /// The event reaches this subscriber unmodified.
    Pass(serde_json::Value),
    /// The event reaches this subscriber with content-bearing fields
    /// emptied.
    Redacted(serde_json::Value),
}

/// Applies the drop/redact/pass decision for one subscriber.
///
/// `payload` is the event as published on the bus; the redactor never
/// mutates it — callers receive a subscriber-local copy via the returned
/// `FilterOutcome`.
#[must_use]
pub fn filter(
    event_name: &str,
    payload: &serde_json::Value,
    subscriber_intents: GatewayIntents,
    subscriber_user_id: &str,
) -> FilterOutcome {
    if let Some(required) = required_intent(event_name) {
        if !subscriber_intents.contains(required) {
            return FilterOutcome::Drop;
        }
    }

    if is_message_family(event_name) && !subscriber_intents.contains(GatewayIntents::MESSAGE_CONTENT)
    {
        if let Ok(message) = serde_json::from_value::<MessagePayload>(payload.clone()) {
            if !message.is_visible_to(subscriber_user_id) {
                let redacted = message.redacted();
                return FilterOutcome::Redacted(
                    serde_json::to_value(redacted).unwrap_or_else(|_| payload.clone()),
                );
            }
        }
    }

    FilterOutcome::Pass(payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "username": "u", "global_name": null, "avatar": null,
            "bot": null, "system": null, "banner": null, "accent_color": null,
            "locale": null, "flags": null, "public_flags": null,
            "avatar_decoration_data": null,
        })
    }

    fn message(author: &str, mentions: Vec<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": "1", "channel_id": "c", "guild_id": "g",
            "author": user(author),
            "content": "hello",
            "mentions": mentions.into_iter().map(user).collect::<Vec<_>>(),
            "embeds": [], "attachments": [], "components": [],
        })
    }

    #[test]
    fn drops_when_required_intent_missing() {
        let outcome = filter(
            "MESSAGE_CREATE",
            &message("U2", vec![]),
            GatewayIntents::GUILDS,
            "U4",
        );
        assert_eq!(outcome, FilterOutcome::Drop);
    }

    #[test]
    fn redacts_for_non_author_non_mentioned_without_message_content() {
        let outcome = filter(
            "MESSAGE_CREATE",
            &message("U2", vec!["U3"]),
            GatewayIntents::GUILD_MESSAGES,
            "U4",
        );
        let FilterOutcome::Redacted(value) = outcome else {
            panic!("expected redaction")
        };
        assert_eq!(value["content"], "");
        assert!(value["embeds"].as_array().unwrap().is_empty());
    }

    #[test]
    fn passes_unredacted_for_author() {
        let outcome = filter(
            "MESSAGE_CREATE",
            &message("U4", vec![]),
            GatewayIntents::GUILD_MESSAGES,
            "U4",
        );
        let FilterOutcome::Pass(value) = outcome else {
            panic!("expected pass")
        };
        assert_eq!(value["content"], "hello");
    }

    #[test]
    fn passes_unredacted_with_message_content_intent() {
        let outcome = filter(
            "MESSAGE_CREATE",
            &message("U2", vec![]),
            GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT,
            "U4",
        );
        assert!(matches!(outcome, FilterOutcome::Pass(_)));
    }

    #[test]
    fn events_without_a_required_intent_always_pass() {
        let outcome = filter(
            "READY",
            &serde_json::json!({}),
            GatewayIntents::empty(),
            "U4",
        );
        assert!(matches!(outcome, FilterOutcome::Pass(_)));
    }
}
