//! The room index's fan-out path: one task per process that drains the
//! cross-process bus and, for each delivery, walks the matching local room,
//! running every candidate subscriber through the intent filter before
//! handing a `RoomEvent` to its owning connection task.
//!
//! Iteration within one delivery is sequential, not concurrent: different
//! deliveries (and different processes) carry no ordering guarantee
//! relative to each other, but fan-out to this process's subscribers for a
//! single delivery does.

use tracing::{debug, warn};

use super::bus::{Delivery, SESSION_INVALIDATE};
use super::intent_filter::{self, FilterOutcome};
use super::room::{ConnectionHandle, RoomEvent};
use super::state::GatewayState;

/// Runs until the bus subscription ends (process shutdown or a fatal bus
/// error); spawned once per process.
pub async fn run(state: GatewayState) {
    let (tx, mut rx) = tokio::sync::mpsc::channel(4096);
    let bus = state.bus.clone();
    tokio::spawn(async move {
        if let Err(err) = bus.subscribe(tx).await {
            warn!(%err, "bus subscription ended with an error");
        }
    });

    while let Some(delivery) = rx.recv().await {
        state.counters.bus_message_received();
        dispatch_delivery(&state, delivery).await;
    }
}

async fn dispatch_delivery(state: &GatewayState, delivery: Delivery) {
    if let Some(guild_id) = delivery.channel.strip_prefix("gateway:guild:") {
        let candidates = state.rooms.guild_members(guild_id);
        fan_out(&delivery.message.event, &delivery.message.data, &candidates).await;
        return;
    }

    if let Some(user_id) = delivery.channel.strip_prefix("gateway:user:") {
        if delivery.message.event == SESSION_INVALIDATE {
            invalidate_user_sessions(state, user_id, &delivery.message.data).await;
            return;
        }
        let candidates = state.rooms.user_connections(user_id);
        fan_out(&delivery.message.event, &delivery.message.data, &candidates).await;
        return;
    }

    debug!(channel = %delivery.channel, "dropping bus delivery on unrecognized channel");
}

async fn fan_out(event_name: &str, payload: &serde_json::Value, candidates: &[ConnectionHandle]) {
    for handle in candidates {
        let outcome = intent_filter::filter(event_name, payload, handle.view.intents, &handle.view.user_id);
        let payload = match outcome {
            FilterOutcome::Drop => continue,
            FilterOutcome::Pass(payload) | FilterOutcome::Redacted(payload) => payload,
        };
        let _ = handle
            .events
            .send(RoomEvent::Dispatch {
                event_name: event_name.to_string(),
                payload,
            })
            .await;
    }
}

/// `SESSION_INVALIDATE`: disconnects every matching session of `user_id`
/// except an optionally excluded `sessionId`.
async fn invalidate_user_sessions(state: &GatewayState, user_id: &str, data: &serde_json::Value) {
    #[derive(serde::Deserialize)]
    struct Data {
        #[serde(default)]
        except_session_id: Option<String>,
    }
    let except: Option<String> = serde_json::from_value::<Data>(data.clone())
        .ok()
        .and_then(|d| d.except_session_id);

    for handle in state.rooms.user_connections(user_id) {
        if except.as_deref() == Some(handle.view.session_id.as_str()) {
            continue;
        }
        let _ = handle.events.send(RoomEvent::Invalidate { resumable: false }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::room::{RoomIndex, SessionView};
    use crate::model::gateway::intents::GatewayIntents;
    use uuid::Uuid;

    fn state_with_room() -> (GatewayState, Uuid, tokio::sync::mpsc::Receiver<RoomEvent>) {
        let state = crate::gateway::state::fakes::test_state("t", "u");
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let conn = Uuid::new_v4();
        state.rooms.join(
            conn,
            vec!["G1".to_string()],
            ConnectionHandle {
                view: SessionView {
                    user_id: "U1".to_string(),
                    session_id: "S1".to_string(),
                    intents: GatewayIntents::all(),
                },
                events: tx,
            },
        );
        (state, conn, rx)
    }

    #[tokio::test]
    async fn guild_delivery_fans_out_to_room_members() {
        let (state, _conn, mut rx) = state_with_room();
        dispatch_delivery(
            &state,
            Delivery {
                channel: "gateway:guild:G1".to_string(),
                message: super::super::bus::BusMessage {
                    event: "GUILD_UPDATE".to_string(),
                    data: serde_json::json!({"id": "G1"}),
                },
            },
        )
        .await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RoomEvent::Dispatch { event_name, .. } if event_name == "GUILD_UPDATE"));
    }

    #[tokio::test]
    async fn session_invalidate_excepts_named_session() {
        let state = crate::gateway::state::fakes::test_state("t", "u");
        let (tx1, mut rx1) = tokio::sync::mpsc::channel(8);
        let (tx2, mut rx2) = tokio::sync::mpsc::channel(8);
        state.rooms.join(
            Uuid::new_v4(),
            Vec::<String>::new(),
            ConnectionHandle {
                view: SessionView {
                    user_id: "U1".to_string(),
                    session_id: "keep".to_string(),
                    intents: GatewayIntents::all(),
                },
                events: tx1,
            },
        );
        state.rooms.join(
            Uuid::new_v4(),
            Vec::<String>::new(),
            ConnectionHandle {
                view: SessionView {
                    user_id: "U1".to_string(),
                    session_id: "drop".to_string(),
                    intents: GatewayIntents::all(),
                },
                events: tx2,
            },
        );

        invalidate_user_sessions(&state, "U1", &serde_json::json!({"except_session_id": "keep"})).await;

        assert!(rx1.try_recv().is_err());
        assert!(matches!(
            rx2.recv().await.unwrap(),
            RoomEvent::Invalidate { resumable: false }
        ));
    }
}
