//! The session/resume store: a shared cache holding session descriptors,
//! the sessionId→connId index used to validate `RESUME`, and each
//! session's bounded, TTL-expiring replay buffer.
//!
//! Backed by Redis in production (list + string keys, `EXPIRE`/`LTRIM`,
//! reached through `redis`'s connection-managed client so a single dropped
//! connection self-heals without tearing down the process) and by an
//! in-memory fake in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use redis::AsyncCommands;

use crate::error::Result;

/// What `RESUME` needs to know about a session's prior owner: which
/// connection id it lived on (informational; this process never dials
/// another process's connection directly) and the intent mask it must be
/// rehydrated with (never the client's freshly supplied one).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionIndexEntry {
    pub conn_id: String,
    /// The session's owning user, checked against the token's principal on
    /// `RESUME` so one user can never hijack another's session id (spec
    /// §4.2: "reject unless ... its stored userId matches the token's
    /// userId").
    pub user_id: String,
    pub intents: u32,
}

/// The durable shape of a `Session`, written on `IDENTIFY`/`RESUME` so
/// another process can answer `lookup_session_index` during this client's
/// next resume even if this process has since exited.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionDescriptor {
    pub user_id: String,
    pub session_id: String,
    pub intents: u32,
    pub guilds: Vec<String>,
}

/// One replayable entry of a session's resume buffer. Stores the event
/// name alongside the payload and sequence because a `RESUME` replay must
/// reproduce the exact `{s, t, d}` the client missed, not just its data.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResumeEntry {
    pub sequence: u64,
    pub event_name: String,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store_session(&self, conn_id: &str, session: &SessionDescriptor) -> Result<()>;
    async fn store_session_index(&self, session_id: &str, entry: &SessionIndexEntry) -> Result<()>;
    async fn lookup_session_index(&self, session_id: &str) -> Result<Option<SessionIndexEntry>>;
    async fn append_resume_event(
        &self,
        session_id: &str,
        sequence: u64,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()>;
    async fn read_resume_after(&self, session_id: &str, seq: u64) -> Result<Vec<ResumeEntry>>;
    async fn earliest_buffered_sequence(&self, session_id: &str) -> Result<Option<u64>>;
    async fn clear_resume_buffer(&self, session_id: &str) -> Result<()>;
    async fn refresh_ttl(&self, conn_id: &str) -> Result<()>;
    async fn refresh_presence_ttl(&self, user_id: &str) -> Result<()>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

/// Number of most-recent dispatches a `ResumeBuffer` retains per session.
pub const RESUME_BUFFER_MAX: usize = 100;

fn session_key(session_id: &str) -> String {
    format!("gw:session:{session_id}")
}

fn session_index_key(session_id: &str) -> String {
    format!("gw:session_index:{session_id}")
}

fn resume_key(session_id: &str) -> String {
    format!("gw:resume:{session_id}")
}

fn presence_key(user_id: &str) -> String {
    format!("gw:presence:{user_id}")
}

/// Redis-backed production implementation. `session_ttl` and
/// `resume_window` govern the `EXPIRE` set on every write so a crashed
/// process's sessions age out rather than leaking forever.
pub struct RedisSessionStore {
    client: redis::aio::ConnectionManager,
    session_ttl: Duration,
    resume_window: Duration,
    resume_buffer_max: usize,
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("session_ttl", &self.session_ttl)
            .field("resume_window", &self.resume_window)
            .field("resume_buffer_max", &self.resume_buffer_max)
            .finish_non_exhaustive()
    }
}

impl RedisSessionStore {
    pub async fn connect(
        redis_url: &str,
        session_ttl: Duration,
        resume_window: Duration,
        resume_buffer_max: usize,
    ) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            client: manager,
            session_ttl,
            resume_window,
            resume_buffer_max,
        })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn store_session(&self, conn_id: &str, session: &SessionDescriptor) -> Result<()> {
        let mut conn = self.client.clone();
        let value = serde_json::to_string(session)?;
        let () = conn.set_ex(session_key(conn_id), value, self.session_ttl.as_secs()).await?;
        Ok(())
    }

    async fn store_session_index(&self, session_id: &str, entry: &SessionIndexEntry) -> Result<()> {
        let mut conn = self.client.clone();
        let value = serde_json::to_string(entry)?;
        let () = conn
            .set_ex(session_index_key(session_id), value, self.resume_window.as_secs())
            .await?;
        Ok(())
    }

    async fn lookup_session_index(&self, session_id: &str) -> Result<Option<SessionIndexEntry>> {
        let mut conn = self.client.clone();
        let raw: Option<String> = conn.get(session_index_key(session_id)).await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    async fn append_resume_event(
        &self,
        session_id: &str,
        sequence: u64,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut conn = self.client.clone();
        let entry = serde_json::to_string(&ResumeEntry {
            sequence,
            event_name: event_name.to_string(),
            payload,
        })?;
        let key = resume_key(session_id);
        let _: i64 = conn.rpush(&key, entry).await?;
        let _: () = conn
            .ltrim(&key, -(self.resume_buffer_max as isize), -1)
            .await?;
        let _: bool = conn.expire(&key, self.resume_window.as_secs() as i64).await?;
        Ok(())
    }

    async fn read_resume_after(&self, session_id: &str, seq: u64) -> Result<Vec<ResumeEntry>> {
        let mut conn = self.client.clone();
        let raw: Vec<String> = conn.lrange(resume_key(session_id), 0, -1).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for item in raw {
            let entry: ResumeEntry = serde_json::from_str(&item)?;
            if entry.sequence > seq {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn earliest_buffered_sequence(&self, session_id: &str) -> Result<Option<u64>> {
        let mut conn = self.client.clone();
        let raw: Option<String> = conn.lindex(resume_key(session_id), 0).await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str::<ResumeEntry>(&raw)?.sequence),
            None => None,
        })
    }

    async fn clear_resume_buffer(&self, session_id: &str) -> Result<()> {
        let mut conn = self.client.clone();
        let _: () = conn.del(resume_key(session_id)).await?;
        Ok(())
    }

    async fn refresh_ttl(&self, conn_id: &str) -> Result<()> {
        let mut conn = self.client.clone();
        let _: bool = conn
            .expire(session_key(conn_id), self.session_ttl.as_secs() as i64)
            .await?;
        Ok(())
    }

    async fn refresh_presence_ttl(&self, user_id: &str) -> Result<()> {
        let mut conn = self.client.clone();
        let _: bool = conn
            .expire(presence_key(user_id), self.session_ttl.as_secs() as i64)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut conn = self.client.clone();
        let _: () = conn.del(session_index_key(session_id)).await?;
        let _: () = conn.del(resume_key(session_id)).await?;
        Ok(())
    }
}

/// In-memory fake used by unit tests and by the `InMemoryBus`-backed dev
/// mode; not a production backend.
#[derive(Debug)]
pub struct InMemorySessionStore {
    indexes: Mutex<HashMap<String, SessionIndexEntry>>,
    resume_buffers: Mutex<HashMap<String, Vec<ResumeEntry>>>,
    resume_buffer_max: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            indexes: Mutex::default(),
            resume_buffers: Mutex::default(),
            resume_buffer_max: RESUME_BUFFER_MAX,
        }
    }
}

impl InMemorySessionStore {
    #[must_use]
    pub fn with_resume_buffer_max(resume_buffer_max: usize) -> Self {
        Self {
            resume_buffer_max,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store_session(&self, _conn_id: &str, _session: &SessionDescriptor) -> Result<()> {
        Ok(())
    }

    async fn store_session_index(&self, session_id: &str, entry: &SessionIndexEntry) -> Result<()> {
        self.indexes
            .lock()
            .unwrap()
            .insert(session_id.to_string(), entry.clone());
        Ok(())
    }

    async fn lookup_session_index(&self, session_id: &str) -> Result<Option<SessionIndexEntry>> {
        Ok(self.indexes.lock().unwrap().get(session_id).cloned())
    }

    async fn append_resume_event(
        &self,
        session_id: &str,
        sequence: u64,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut buffers = self.resume_buffers.lock().unwrap();
        let buffer = buffers.entry(session_id.to_string()).or_default();
        buffer.push(ResumeEntry {
            sequence,
            event_name: event_name.to_string(),
            payload,
        });
        if buffer.len() > self.resume_buffer_max {
            let excess = buffer.len() - self.resume_buffer_max;
            buffer.drain(0..excess);
        }
        Ok(())
    }

    async fn read_resume_after(&self, session_id: &str, seq: u64) -> Result<Vec<ResumeEntry>> {
        Ok(self
            .resume_buffers
            .lock()
            .unwrap()
            .get(session_id)
            .map(|buffer| buffer.iter().filter(|e| e.sequence > seq).cloned().collect())
            .unwrap_or_default())
    }

    async fn earliest_buffered_sequence(&self, session_id: &str) -> Result<Option<u64>> {
        Ok(self
            .resume_buffers
            .lock()
            .unwrap()
            .get(session_id)
            .and_then(|buffer| buffer.first())
            .map(|e| e.sequence))
    }

    async fn clear_resume_buffer(&self, session_id: &str) -> Result<()> {
        self.resume_buffers.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn refresh_ttl(&self, _conn_id: &str) -> Result<()> {
        Ok(())
    }

    async fn refresh_presence_ttl(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.indexes.lock().unwrap().remove(session_id);
        self.resume_buffers.lock().unwrap().remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_read_resume_after() {
        let store = InMemorySessionStore::default();
        for seq in 1..=6u64 {
            store
                .append_resume_event("S1", seq, "MESSAGE_CREATE", serde_json::json!({ "seq": seq }))
                .await
                .unwrap();
        }
        let replay = store.read_resume_after("S1", 4).await.unwrap();
        assert_eq!(replay.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![5, 6]);
    }

    #[tokio::test]
    async fn truncates_to_resume_buffer_max() {
        let store = InMemorySessionStore::default();
        for seq in 1..=(RESUME_BUFFER_MAX as u64 + 7) {
            store
                .append_resume_event("S1", seq, "MESSAGE_CREATE", serde_json::json!({}))
                .await
                .unwrap();
        }
        let earliest = store.earliest_buffered_sequence("S1").await.unwrap();
        assert_eq!(earliest, Some(8));
    }

    /// Exercises the real Redis-backed store against `REDIS_URL`, if set.
    /// Skipped (not failed) when absent, so `cargo test` never needs a live
    /// Redis by default.
    #[tokio::test]
    async fn redis_store_round_trips_against_a_live_instance() {
        let _ = dotenvy::dotenv();
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let store = RedisSessionStore::connect(
            &url,
            Duration::from_secs(60),
            Duration::from_secs(60),
            RESUME_BUFFER_MAX,
        )
        .await
        .unwrap();
        store
            .store_session_index(
                "live-test-session",
                &SessionIndexEntry {
                    conn_id: "c1".to_string(),
                    user_id: "u1".to_string(),
                    intents: 0,
                },
            )
            .await
            .unwrap();
        let entry = store.lookup_session_index("live-test-session").await.unwrap();
        assert_eq!(entry.unwrap().user_id, "u1");
        store.delete_session("live-test-session").await.unwrap();
    }
}
