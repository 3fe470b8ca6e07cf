//! The cross-process bus: fire-and-forget publish/subscribe by which any
//! gateway process injects an event into any other. Backed by Redis
//! `PUBLISH`/`PSUBSCRIBE` in production; an in-memory
//! `tokio::sync::broadcast` fake stands in for tests.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// One message as it travels the bus: `{event, data}`, scoped by the
/// channel it was published on (`gateway:guild:{id}` or
/// `gateway:user:{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub event: String,
    pub data: serde_json::Value,
}

/// The reserved `gateway:user:{id}` event name that disconnects sessions
/// rather than dispatching to them.
pub const SESSION_INVALIDATE: &str = "SESSION_INVALIDATE";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInvalidateData {
    #[serde(default)]
    pub except_session_id: Option<String>,
}

pub fn guild_channel(guild_id: &str) -> String {
    format!("gateway:guild:{guild_id}")
}

pub fn user_channel(user_id: &str) -> String {
    format!("gateway:user:{user_id}")
}

/// One incoming bus delivery, already split into scope/key by channel name.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: String,
    pub message: BusMessage,
}

#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, channel: &str, message: &BusMessage) -> Result<()>;

    /// Subscribes to `gateway:guild:*` and `gateway:user:*` and forwards
    /// every well-formed delivery to `sink`. Runs until the connection
    /// drops or the process shuts down; malformed messages are logged at
    /// debug and dropped, never reaching `sink`.
    async fn subscribe(&self, sink: tokio::sync::mpsc::Sender<Delivery>) -> Result<()>;
}

/// Redis-backed production bus.
pub struct RedisBus {
    client: redis::Client,
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus").finish_non_exhaustive()
    }
}

impl RedisBus {
    pub fn new(redis_url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, channel: &str, message: &BusMessage) -> Result<()> {
        let mut conn = self.client.get_connection_manager().await?;
        let payload = serde_json::to_string(message)?;
        let _: i64 = redis::AsyncCommands::publish(&mut conn, channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, sink: tokio::sync::mpsc::Sender<Delivery>) -> Result<()> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.psubscribe("gateway:guild:*").await?;
        pubsub.psubscribe("gateway:user:*").await?;

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel: String = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    debug!(%err, "dropping bus message with non-utf8 payload");
                    continue;
                }
            };
            match serde_json::from_str::<BusMessage>(&payload) {
                Ok(message) => {
                    if sink.send(Delivery { channel, message }).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!(%err, %channel, "dropping malformed bus message");
                }
            }
        }
        warn!("redis bus subscription ended");
        Ok(())
    }
}

/// In-memory fake for tests: a single broadcast channel shared by every
/// "process" (clone) of the bus, so a test can publish from one handle and
/// assert delivery on another.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    tx: tokio::sync::broadcast::Sender<(String, BusMessage)>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(1024);
        Self { tx }
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, channel: &str, message: &BusMessage) -> Result<()> {
        let _ = self.tx.send((channel.to_string(), message.clone()));
        Ok(())
    }

    async fn subscribe(&self, sink: tokio::sync::mpsc::Sender<Delivery>) -> Result<()> {
        let mut rx = self.tx.subscribe();
        loop {
            match rx.recv().await {
                Ok((channel, message)) => {
                    if !(channel.starts_with("gateway:guild:") || channel.starts_with("gateway:user:")) {
                        continue;
                    }
                    if sink.send(Delivery { channel, message }).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_bus_delivers_published_message() {
        let bus = InMemoryBus::default();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let subscriber = bus.clone();
        tokio::spawn(async move { subscriber.subscribe(tx).await });

        tokio::task::yield_now().await;
        bus.publish(
            &guild_channel("G1"),
            &BusMessage {
                event: "MESSAGE_CREATE".into(),
                data: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.channel, "gateway:guild:G1");
        assert_eq!(delivery.message.event, "MESSAGE_CREATE");
    }
}
