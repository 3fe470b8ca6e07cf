//! The message shape carried by `MESSAGE_CREATE`/`MESSAGE_UPDATE` dispatches.
//!
//! This is the one payload the intent filter's redactor knows how to
//! mutate: `content`, `embeds`, `attachments`, and `components` are
//! the content-bearing fields it empties for subscribers lacking
//! `MESSAGE_CONTENT` who are neither the author nor mentioned.

use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub url: String,
    pub proxy_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub custom_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A message event payload as it travels on the bus and, redacted or not,
/// as a `MESSAGE_CREATE`/`MESSAGE_UPDATE` dispatch.
pub struct MessagePayload {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: User,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl MessagePayload {
    /// True if `user_id` is the author or named in `mentions` — the two
    /// cases the redactor exempts from content redaction.
    #[must_use]
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.author.id == user_id || self.mentions.iter().any(|u| u.id == user_id)
    }

    /// Returns a redacted copy with all content-bearing fields emptied.
    /// The payload on the bus is never mutated; callers clone first.
    #[must_use]
    pub fn redacted(mut self) -> Self {
        self.content.clear();
        self.embeds.clear();
        self.attachments.clear();
        self.components.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            username: "u".to_string(),
            global_name: None,
            avatar: None,
            bot: None,
            system: None,
            banner: None,
            accent_color: None,
            locale: None,
            flags: None,
            public_flags: None,
            avatar_decoration_data: None,
        }
    }

    #[test]
    fn visible_to_author() {
        let msg = MessagePayload {
            id: "1".into(),
            channel_id: "c".into(),
            guild_id: None,
            author: user("U2"),
            content: "hi".into(),
            mentions: vec![],
            embeds: vec![],
            attachments: vec![],
            components: vec![],
        };
        assert!(msg.is_visible_to("U2"));
        assert!(!msg.is_visible_to("U4"));
    }

    #[test]
    fn redacted_clears_content_bearing_fields() {
        let msg = MessagePayload {
            id: "1".into(),
            channel_id: "c".into(),
            guild_id: None,
            author: user("U2"),
            content: "hello".into(),
            mentions: vec![user("U3")],
            embeds: vec![Embed {
                title: Some("t".into()),
                description: None,
                url: None,
            }],
            attachments: vec![],
            components: vec![],
        };
        let redacted = msg.redacted();
        assert_eq!(redacted.content, "");
        assert!(redacted.embeds.is_empty());
        assert_eq!(redacted.mentions.len(), 1, "mentions is not content-bearing");
    }
}
