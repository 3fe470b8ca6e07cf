//! HTTP clients for the external collaborators the core delegates to:
//! auth, guild/user snapshot loading, member fetching, voice, and
//! presence persistence. Each is a trait so tests substitute an
//! in-memory fake; the production implementations share one `reqwest`
//! client and an internal shared-key header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::model::guild::{DmChannel, GuildSnapshot, MemberRow, ReadState, Relationship};
use crate::model::presence::Activity;
use crate::model::voice::VoiceServerUpdate;

/// The authenticated principal behind an opaque bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[async_trait]
pub trait Auth: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser>;
    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<crate::model::user::User>>;
}

#[async_trait]
pub trait GuildLoader: Send + Sync {
    async fn get_user_guilds(&self, user_id: &str) -> Result<Vec<GuildSnapshot>>;
    async fn get_read_states(&self, user_id: &str) -> Result<Vec<ReadState>>;
    async fn get_relationships(&self, user_id: &str) -> Result<Vec<Relationship>>;
    async fn get_user_dm_channels(&self, user_id: &str) -> Result<Vec<DmChannel>>;
}

/// How `REQUEST_GUILD_MEMBERS` selects the rows to fetch.
#[derive(Debug, Clone)]
pub enum MemberQuery {
    ByIds(Vec<String>),
    ByPrefix { query: String, limit: u32 },
    Paginated { limit: u32 },
}

#[async_trait]
pub trait MemberFetcher: Send + Sync {
    async fn fetch_members(&self, guild_id: &str, query: MemberQuery) -> Result<Vec<MemberRow>>;
}

#[async_trait]
pub trait Voice: Send + Sync {
    async fn join(
        &self,
        guild_id: &str,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Option<VoiceServerUpdate>>;
    async fn leave(&self, guild_id: &str, user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn update_presence(
        &self,
        user_id: &str,
        status: crate::model::presence::PresenceStatus,
        custom_status: Option<String>,
    ) -> Result<()>;
    async fn upsert_activities(&self, user_id: &str, activities: Vec<Activity>) -> Result<()>;
    async fn delete_activities(&self, user_id: &str) -> Result<()>;
    /// Batch presence read backing `REQUEST_GUILD_MEMBERS(presences=true)`.
    /// The natural read counterpart of `update_presence`/`upsert_activities`
    /// on the same collaborator, needed to serve the chunk's `presences`
    /// slice.
    async fn get_presences(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<crate::model::presence::PresenceRecord>>;
}

/// Shared plumbing every HTTP collaborator client uses: a base URL, a
/// shared-key header value, and a per-call deadline.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: reqwest::Client,
    base_url: String,
    shared_key: String,
    timeout: Duration,
}

impl HttpCollaborator {
    #[must_use]
    pub fn new(base_url: impl Into<String>, shared_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            shared_key: shared_key.into(),
            timeout,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Internal {}", self.shared_key))
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Auth for HttpCollaborator {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let response = self
            .request(reqwest::Method::POST, "/internal/auth/verify")
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Gateway(super::error::Error::AuthFailed));
        }
        let response = response.error_for_status()?;
        #[derive(serde::Deserialize)]
        struct Body {
            user_id: String,
        }
        let body: Body = response.json().await?;
        Ok(AuthenticatedUser {
            user_id: body.user_id,
        })
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<crate::model::user::User>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/internal/users/{user_id}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }
}

#[async_trait]
impl GuildLoader for HttpCollaborator {
    async fn get_user_guilds(&self, user_id: &str) -> Result<Vec<GuildSnapshot>> {
        Ok(self
            .request(reqwest::Method::GET, &format!("/internal/users/{user_id}/guilds"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn get_read_states(&self, user_id: &str) -> Result<Vec<ReadState>> {
        Ok(self
            .request(
                reqwest::Method::GET,
                &format!("/internal/users/{user_id}/read-states"),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn get_relationships(&self, user_id: &str) -> Result<Vec<Relationship>> {
        Ok(self
            .request(
                reqwest::Method::GET,
                &format!("/internal/users/{user_id}/relationships"),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn get_user_dm_channels(&self, user_id: &str) -> Result<Vec<DmChannel>> {
        Ok(self
            .request(
                reqwest::Method::GET,
                &format!("/internal/users/{user_id}/dm-channels"),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl MemberFetcher for HttpCollaborator {
    async fn fetch_members(&self, guild_id: &str, query: MemberQuery) -> Result<Vec<MemberRow>> {
        let request = self.request(
            reqwest::Method::GET,
            &format!("/internal/guilds/{guild_id}/members"),
        );
        let request = match query {
            MemberQuery::ByIds(ids) => request.query(&[("ids", ids.join(","))]),
            MemberQuery::ByPrefix { query, limit } => {
                request.query(&[("query", query), ("limit", limit.to_string())])
            }
            MemberQuery::Paginated { limit } => request.query(&[("limit", limit.to_string())]),
        };
        Ok(request.send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl Voice for HttpCollaborator {
    async fn join(
        &self,
        guild_id: &str,
        channel_id: &str,
        user_id: &str,
    ) -> Result<Option<VoiceServerUpdate>> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/voice/{guild_id}/{channel_id}/join"),
            )
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await.ok())
    }

    async fn leave(&self, guild_id: &str, user_id: &str) -> Result<()> {
        self.request(reqwest::Method::POST, &format!("/api/voice/{guild_id}/leave"))
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for HttpCollaborator {
    async fn update_presence(
        &self,
        user_id: &str,
        status: crate::model::presence::PresenceStatus,
        custom_status: Option<String>,
    ) -> Result<()> {
        self.request(reqwest::Method::PUT, &format!("/internal/users/{user_id}/presence"))
            .json(&serde_json::json!({ "status": status, "custom_status": custom_status }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn upsert_activities(&self, user_id: &str, activities: Vec<Activity>) -> Result<()> {
        self.request(
            reqwest::Method::PUT,
            &format!("/internal/users/{user_id}/activities"),
        )
        .json(&activities)
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    async fn delete_activities(&self, user_id: &str) -> Result<()> {
        self.request(
            reqwest::Method::DELETE,
            &format!("/internal/users/{user_id}/activities"),
        )
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    async fn get_presences(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<crate::model::presence::PresenceRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .request(reqwest::Method::GET, "/internal/presences")
            .query(&[("ids", user_ids.join(","))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct FakeAuth {
        pub tokens: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl Auth for FakeAuth {
        async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser> {
            self.tokens
                .lock()
                .unwrap()
                .get(token)
                .cloned()
                .map(|user_id| AuthenticatedUser { user_id })
                .ok_or(Error::Gateway(super::super::error::Error::AuthFailed))
        }

        async fn get_user_by_id(&self, user_id: &str) -> Result<Option<crate::model::user::User>> {
            Ok(Some(crate::model::user::User {
                id: user_id.to_string(),
                username: user_id.to_string(),
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
            }))
        }
    }
}
