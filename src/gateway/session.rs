//! The application-layer identity tied to a [`crate::gateway::connection::Connection`]
//! once `IDENTIFY`/`RESUME` succeeds.
//!
//! A `Session` is exclusively owned by the connection task that created it;
//! nothing else ever touches its `sequence` counter. `dispatch` is the one
//! function allowed to stamp a sequence number, so a direct local send and a
//! bus-originated fan-out can never race each other into handing out the
//! same `s` twice.

use std::collections::HashSet;

use tracing::warn;

use crate::model::gateway::outbound::OutboundFrame;

use super::store::SessionStore;

/// Everything the protocol engine needs to know about an identified session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    pub sequence: u64,
    pub intents: crate::model::gateway::intents::GatewayIntents,
    pub guilds: HashSet<String>,
}

impl Session {
    #[must_use]
    pub fn new(
        user_id: String,
        session_id: String,
        intents: crate::model::gateway::intents::GatewayIntents,
        guilds: HashSet<String>,
    ) -> Self {
        Self {
            user_id,
            session_id,
            sequence: 0,
            intents,
            guilds,
        }
    }

    /// Stamps the next sequence number, sends the frame to the client, and
    /// best-effort appends it to the session's resume buffer.
    ///
    /// A failing store write never fails the dispatch itself: internal
    /// dispatch errors are logged and do not invalidate the session, since
    /// the client already received the frame and a resume gap, if any, is
    /// caught later by [`super::store::SessionStore::read_resume_after`].
    pub async fn dispatch(
        &mut self,
        store: &dyn SessionStore,
        outbound: &tokio::sync::mpsc::Sender<tokio_tungstenite::tungstenite::Message>,
        event_name: &str,
        payload: serde_json::Value,
    ) {
        self.sequence += 1;
        let frame = OutboundFrame::dispatch(self.sequence, event_name, payload.clone());
        let Ok(text) = serde_json::to_string(&frame) else {
            warn!(session_id = %self.session_id, "failed to serialize dispatch frame");
            return;
        };
        if outbound
            .send(tokio_tungstenite::tungstenite::Message::Text(text))
            .await
            .is_err()
        {
            return;
        }
        if let Err(err) = store
            .append_resume_event(&self.session_id, self.sequence, event_name, payload)
            .await
        {
            warn!(session_id = %self.session_id, error = %err, "resume buffer append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::store::InMemorySessionStore;
    use crate::model::gateway::intents::GatewayIntents;

    #[tokio::test]
    async fn dispatch_stamps_strictly_increasing_sequence() {
        let store = InMemorySessionStore::default();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut session = Session::new(
            "U1".into(),
            "S1".into(),
            GatewayIntents::all(),
            HashSet::new(),
        );

        session
            .dispatch(&store, &tx, "MESSAGE_CREATE", serde_json::json!({"a": 1}))
            .await;
        session
            .dispatch(&store, &tx, "MESSAGE_CREATE", serde_json::json!({"a": 2}))
            .await;

        assert_eq!(session.sequence, 2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let tokio_tungstenite::tungstenite::Message::Text(first) = first else {
            panic!("expected text frame")
        };
        let tokio_tungstenite::tungstenite::Message::Text(second) = second else {
            panic!("expected text frame")
        };
        assert_eq!(serde_json::from_str::<serde_json::Value>(&first).unwrap()["s"], 1);
        assert_eq!(serde_json::from_str::<serde_json::Value>(&second).unwrap()["s"], 2);
    }
}
