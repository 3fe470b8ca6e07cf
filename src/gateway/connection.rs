//! The protocol engine: the per-connection opcode state machine.
//!
//! A `Connection` owns its `Session` outright and is the only task that ever
//! touches it; the Room Index only ever holds a [`super::room::ConnectionHandle`]
//! (a sender half plus an immutable [`super::room::SessionView`]) so a
//! bus-originated fan-out can reach this task without reaching into its state.

use std::collections::HashSet;

use futures::stream::SplitStream;
use futures::StreamExt;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep_until, Instant as TokioInstant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::ResumeOutcome;
use crate::model::gateway::inbound::{
    ClientFrame, IdentifyPayload, PresenceUpdatePayload, RequestGuildMembersPayload, ResumePayload,
    VoiceStateUpdatePayload,
};
use crate::model::gateway::intents::GatewayIntents;
use crate::model::gateway::opcode::OpCode;
use crate::model::gateway::outbound::{HelloPayload, InvalidSessionPayload, OutboundFrame};
use crate::model::gateway::ready::{GuildMembersChunkPayload, ReadyPayload};
use crate::model::guild::UnavailableGuild;
use crate::model::presence::{Activity, CustomStatus, PresenceRecord};
use crate::model::user::User;
use crate::model::voice::VoiceState;

use super::bus::{guild_channel, user_channel, BusMessage};
use super::collaborators::MemberQuery;
use super::error::Error as GatewayError;
use super::rate_limit::RateLimiter;
use super::room::{ConnectionHandle, RoomEvent, SessionView};
use super::session::Session;
use super::state::GatewayState;
use super::store::{SessionDescriptor, SessionIndexEntry};

/// Inbound text frames larger than this are rejected without decoding.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Members are paged to the client in groups of at most this many rows.
const MEMBER_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    AwaitingIdentify,
    Active,
    Closing,
}

/// One accepted connection's protocol state. Created and driven entirely by
/// [`handle`]; nothing outside this module ever constructs one.
struct Connection {
    id: Uuid,
    gateway: GatewayState,
    outbound: tokio::sync::mpsc::Sender<Message>,
    room_tx: tokio::sync::mpsc::Sender<RoomEvent>,
    room_rx: tokio::sync::mpsc::Receiver<RoomEvent>,
    session: Option<Session>,
    state: ConnectionState,
    limiter: RateLimiter,
    missed_pongs: u8,
}

/// Accepts one already-upgraded websocket: sends HELLO, then drives the
/// connection until it closes, cleaning up the Room Index and connection
/// ceiling on the way out. Called once per accepted socket by
/// [`super::acceptor::run`].
pub async fn handle(ws: WebSocketStream<TcpStream>, state: GatewayState) {
    let (mut sink, mut stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel::<Message>(256);

    let _writer = tokio::spawn(async move {
        use futures::SinkExt;
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let conn_id = Uuid::new_v4();
    let hello = OutboundFrame::control(
        OpCode::Hello,
        HelloPayload {
            heartbeat_interval: state.config.session.heartbeat_interval_ms,
        },
    );
    match serde_json::to_string(&hello) {
        Ok(text) => {
            if outbound_tx.send(Message::Text(text)).await.is_err() {
                return;
            }
            state.counters.frame_out(OpCode::Hello);
        }
        Err(err) => {
            warn!(conn_id = %conn_id, %err, "failed to serialize HELLO");
            return;
        }
    }
    state.counters.connection_opened();

    let (room_tx, room_rx) = tokio::sync::mpsc::channel(256);
    let mut connection = Connection {
        id: conn_id,
        gateway: state,
        outbound: outbound_tx,
        room_tx,
        room_rx,
        session: None,
        state: ConnectionState::AwaitingIdentify,
        limiter: RateLimiter::default(),
        missed_pongs: 0,
    };

    connection.run(&mut stream).await;
    connection.cleanup().await;
}

impl Connection {
    async fn run(&mut self, stream: &mut SplitStream<WebSocketStream<TcpStream>>) {
        let mut heartbeat_deadline =
            TokioInstant::now() + self.gateway.config.session.heartbeat_deadline();
        let mut ping_ticker = interval(self.gateway.config.server.ping_interval());
        ping_ticker.tick().await;

        loop {
            tokio::select! {
                () = sleep_until(heartbeat_deadline) => {
                    info!(conn_id = %self.id, "heartbeat deadline exceeded");
                    break;
                }
                _ = ping_ticker.tick() => {
                    if self.missed_pongs >= 2 {
                        info!(conn_id = %self.id, "missed transport pongs, terminating");
                        break;
                    }
                    self.missed_pongs += 1;
                    if self.outbound.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    self.limiter.prune(std::time::Instant::now());
                }
                event = self.room_rx.recv() => {
                    match event {
                        Some(RoomEvent::Dispatch { event_name, payload }) => {
                            if let Some(session) = &mut self.session {
                                session
                                    .dispatch(self.gateway.store.as_ref(), &self.outbound, &event_name, payload)
                                    .await;
                                self.gateway.counters.frame_out(OpCode::Dispatch);
                            }
                        }
                        Some(RoomEvent::Invalidate { resumable }) => {
                            self.send_invalid_session(resumable).await;
                            if let Some(session) = &self.session {
                                let _ = self.gateway.store.delete_session(&session.session_id).await;
                            }
                            break;
                        }
                        Some(RoomEvent::Shutdown) => {
                            self.send_control(OpCode::Reconnect, serde_json::json!(null)).await;
                            break;
                        }
                        None => break,
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if text.len() > MAX_PAYLOAD_BYTES {
                                self.fail(GatewayError::PayloadTooLarge).await;
                                break;
                            }
                            if let Err(err) = self.handle_text(&text, &mut heartbeat_deadline).await {
                                self.fail(err).await;
                                break;
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.missed_pongs = 0;
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = self.outbound.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(conn_id = %self.id, %err, "websocket read error");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle_text(
        &mut self,
        text: &str,
        heartbeat_deadline: &mut TokioInstant,
    ) -> Result<(), GatewayError> {
        let frame = ClientFrame::decode(text)?;
        let op = frame.opcode();
        self.gateway.counters.frame_in(op);

        if !self.limiter.check(op, std::time::Instant::now()) {
            self.gateway.counters.rate_limit_rejected();
            return Err(GatewayError::RateLimited);
        }

        match (self.state, frame) {
            (ConnectionState::AwaitingIdentify, ClientFrame::Identify(payload)) => {
                self.do_identify(payload).await?;
            }
            (ConnectionState::AwaitingIdentify, ClientFrame::Resume(payload)) => {
                match self.do_resume(payload).await {
                    Ok(()) => self.gateway.counters.resume_attempt(ResumeOutcome::Success),
                    Err(GatewayError::ResumeBufferGap) => {
                        self.gateway.counters.resume_attempt(ResumeOutcome::BufferGap);
                        return Err(GatewayError::ResumeBufferGap);
                    }
                    Err(err) => {
                        self.gateway.counters.resume_attempt(ResumeOutcome::Failed);
                        return Err(err);
                    }
                }
            }
            (ConnectionState::AwaitingIdentify, _) => {
                return Err(GatewayError::OpcodeNotAllowedInState);
            }
            (ConnectionState::Active, ClientFrame::Heartbeat(_)) => {
                *heartbeat_deadline =
                    TokioInstant::now() + self.gateway.config.session.heartbeat_deadline();
                if let Some(session) = &self.session {
                    let _ = self.gateway.store.refresh_ttl(&self.id.to_string()).await;
                    let _ = self.gateway.store.refresh_presence_ttl(&session.user_id).await;
                }
                self.send_control(OpCode::HeartbeatAck, serde_json::json!(null)).await;
            }
            (ConnectionState::Active, ClientFrame::PresenceUpdate(payload)) => {
                self.do_presence_update(payload).await;
            }
            (ConnectionState::Active, ClientFrame::VoiceStateUpdate(payload)) => {
                self.do_voice_state_update(payload).await;
            }
            (ConnectionState::Active, ClientFrame::RequestGuildMembers(payload)) => {
                self.do_request_guild_members(payload).await;
            }
            (ConnectionState::Active, ClientFrame::Identify(_) | ClientFrame::Resume(_)) => {
                return Err(GatewayError::OpcodeNotAllowedInState);
            }
            (ConnectionState::Closing, _) => {}
        }
        Ok(())
    }

    async fn do_identify(&mut self, payload: IdentifyPayload) -> Result<(), GatewayError> {
        let principal = self
            .gateway
            .auth
            .verify_token(&payload.token)
            .await
            .map_err(|_| GatewayError::AuthFailed)?;
        let user_id = principal.user_id;

        let guilds = self
            .gateway
            .guild_loader
            .get_user_guilds(&user_id)
            .await
            .unwrap_or_default();
        let read_states = self
            .gateway
            .guild_loader
            .get_read_states(&user_id)
            .await
            .unwrap_or_default();
        let relationships = self
            .gateway
            .guild_loader
            .get_relationships(&user_id)
            .await
            .unwrap_or_default();
        let dm_channels = self
            .gateway
            .guild_loader
            .get_user_dm_channels(&user_id)
            .await
            .unwrap_or_default();
        let user = self
            .gateway
            .auth
            .get_user_by_id(&user_id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| fallback_user(&user_id));

        let guild_ids: HashSet<String> = guilds.iter().map(|g| g.id.clone()).collect();
        let session_id = Uuid::new_v4().to_string();
        let mut session = Session::new(
            user_id.clone(),
            session_id.clone(),
            payload.intents,
            guild_ids.clone(),
        );
        self.join_rooms(&session);

        let descriptor = SessionDescriptor {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            intents: payload.intents.bits(),
            guilds: guild_ids.iter().cloned().collect(),
        };
        let _ = self.gateway.store.store_session(&self.id.to_string(), &descriptor).await;
        let _ = self
            .gateway
            .store
            .store_session_index(
                &session_id,
                &SessionIndexEntry {
                    conn_id: self.id.to_string(),
                    user_id: user_id.clone(),
                    intents: payload.intents.bits(),
                },
            )
            .await;

        self.broadcast_presence(
            &user_id,
            &guild_ids,
            crate::model::presence::PresenceStatus::Online,
            None,
            Vec::new(),
        )
        .await;

        let ready = ReadyPayload {
            v: 1,
            user,
            session_id: session_id.clone(),
            guilds: guild_ids
                .iter()
                .cloned()
                .map(|id| UnavailableGuild { id, unavailable: true })
                .collect(),
            read_states,
            relationships,
            private_channels: dm_channels,
        };
        session
            .dispatch(
                self.gateway.store.as_ref(),
                &self.outbound,
                "READY",
                serde_json::to_value(ready).unwrap_or(serde_json::Value::Null),
            )
            .await;
        self.gateway.counters.frame_out(OpCode::Dispatch);

        self.session = Some(session);
        self.state = ConnectionState::Active;
        Ok(())
    }

    async fn do_resume(&mut self, payload: ResumePayload) -> Result<(), GatewayError> {
        let principal = self
            .gateway
            .auth
            .verify_token(&payload.token)
            .await
            .map_err(|_| GatewayError::AuthFailed)?;

        let entry = self
            .gateway
            .store
            .lookup_session_index(&payload.session_id)
            .await
            .map_err(|_| GatewayError::UnknownSession)?
            .ok_or(GatewayError::UnknownSession)?;
        if entry.user_id != principal.user_id {
            return Err(GatewayError::UnknownSession);
        }

        let earliest = self
            .gateway
            .store
            .earliest_buffered_sequence(&payload.session_id)
            .await
            .unwrap_or(None);
        if let Some(earliest) = earliest {
            if earliest > payload.sequence + 1 {
                return Err(GatewayError::ResumeBufferGap);
            }
        }

        let intents = GatewayIntents::from_bits_truncate(entry.intents);
        let guilds = self
            .gateway
            .guild_loader
            .get_user_guilds(&principal.user_id)
            .await
            .unwrap_or_default();
        let guild_ids: HashSet<String> = guilds.iter().map(|g| g.id.clone()).collect();

        let mut session = Session::new(
            principal.user_id.clone(),
            payload.session_id.clone(),
            intents,
            guild_ids,
        );
        self.join_rooms(&session);

        let replay = self
            .gateway
            .store
            .read_resume_after(&payload.session_id, payload.sequence)
            .await
            .unwrap_or_default();
        let mut last_sequence = payload.sequence;
        for entry in &replay {
            self.send_raw_dispatch(entry.sequence, &entry.event_name, entry.payload.clone())
                .await;
            last_sequence = entry.sequence;
        }
        session.sequence = last_sequence;

        let _ = self.gateway.store.clear_resume_buffer(&payload.session_id).await;
        session
            .dispatch(
                self.gateway.store.as_ref(),
                &self.outbound,
                "RESUMED",
                serde_json::json!({}),
            )
            .await;
        self.gateway.counters.frame_out(OpCode::Dispatch);

        self.session = Some(session);
        self.state = ConnectionState::Active;
        Ok(())
    }

    /// Replays one buffered entry with its original `s`/`t`, bypassing
    /// [`Session::dispatch`] — the session's own sequence counter must land
    /// exactly on the last replayed value, not one past it.
    async fn send_raw_dispatch(&self, sequence: u64, event_name: &str, payload: serde_json::Value) {
        let frame = OutboundFrame::dispatch(sequence, event_name, payload);
        if let Ok(text) = serde_json::to_string(&frame) {
            if self.outbound.send(Message::Text(text)).await.is_ok() {
                self.gateway.counters.frame_out(OpCode::Dispatch);
            }
        }
    }

    async fn do_presence_update(&mut self, payload: PresenceUpdatePayload) {
        let Some(session) = &self.session else { return };
        let user_id = session.user_id.clone();
        let guilds = session.guilds.clone();
        let custom_status = payload.custom_status.map(|c| CustomStatus { text: c.into_text() });

        self.broadcast_presence(
            &user_id,
            &guilds,
            payload.status,
            custom_status.clone(),
            payload.activities.clone(),
        )
        .await;
        if let Err(err) = self
            .gateway
            .persistence
            .upsert_activities(&user_id, payload.activities.clone())
            .await
        {
            warn!(conn_id = %self.id, %err, "activity upsert failed");
        }
    }

    async fn broadcast_presence(
        &self,
        user_id: &str,
        guild_ids: &HashSet<String>,
        status: crate::model::presence::PresenceStatus,
        custom_status: Option<CustomStatus>,
        activities: Vec<Activity>,
    ) {
        if let Err(err) = self
            .gateway
            .persistence
            .update_presence(user_id, status, custom_status.as_ref().map(|c| c.text.clone()))
            .await
        {
            warn!(conn_id = %self.id, %err, "presence update failed");
        }
        for guild_id in guild_ids {
            let record = PresenceRecord {
                user_id: user_id.to_string(),
                guild_id: Some(guild_id.clone()),
                status,
                custom_status: custom_status.clone(),
                activities: activities.clone(),
            };
            let message = BusMessage {
                event: "PRESENCE_UPDATE".to_string(),
                data: serde_json::to_value(&record).unwrap_or(serde_json::Value::Null),
            };
            let _ = self.gateway.bus.publish(&guild_channel(guild_id), &message).await;
        }
    }

    async fn do_voice_state_update(&mut self, payload: VoiceStateUpdatePayload) {
        let Some(session) = &self.session else { return };
        if !session.guilds.contains(&payload.guild_id) {
            return;
        }
        let user_id = session.user_id.clone();
        let session_id = session.session_id.clone();

        if let Some(channel_id) = &payload.channel_id {
            match self.gateway.voice.join(&payload.guild_id, channel_id, &user_id).await {
                Ok(Some(credentials)) => {
                    let message = BusMessage {
                        event: "VOICE_SERVER_UPDATE".to_string(),
                        data: serde_json::to_value(&credentials).unwrap_or(serde_json::Value::Null),
                    };
                    let _ = self.gateway.bus.publish(&user_channel(&user_id), &message).await;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(conn_id = %self.id, %err, "voice join failed");
                    return;
                }
            }
        } else if let Err(err) = self.gateway.voice.leave(&payload.guild_id, &user_id).await {
            warn!(conn_id = %self.id, %err, "voice leave failed");
        }

        let voice_state = VoiceState {
            guild_id: payload.guild_id.clone(),
            channel_id: payload.channel_id,
            user_id,
            session_id,
            self_mute: payload.self_mute,
            self_deaf: payload.self_deaf,
        };
        let message = BusMessage {
            event: "VOICE_STATE_UPDATE".to_string(),
            data: serde_json::to_value(&voice_state).unwrap_or(serde_json::Value::Null),
        };
        let _ = self.gateway.bus.publish(&guild_channel(&payload.guild_id), &message).await;
    }

    async fn do_request_guild_members(&mut self, payload: RequestGuildMembersPayload) {
        if !self
            .session
            .as_ref()
            .is_some_and(|session| session.intents.contains(GatewayIntents::GUILD_MEMBERS))
        {
            return;
        }

        let query = if let Some(ids) = payload.user_ids.clone() {
            MemberQuery::ByIds(ids)
        } else if let Some(query) = payload.query.clone() {
            MemberQuery::ByPrefix {
                query,
                limit: if payload.limit == 0 { 100 } else { payload.limit },
            }
        } else {
            MemberQuery::Paginated {
                limit: if payload.limit == 0 { 1000 } else { payload.limit },
            }
        };

        let members = match self.gateway.member_fetcher.fetch_members(&payload.guild_id, query).await {
            Ok(members) => members,
            Err(err) => {
                warn!(conn_id = %self.id, %err, "member fetch failed");
                return;
            }
        };

        let presences = if payload.presences {
            let user_ids: Vec<String> = members.iter().map(|m| m.user.id.clone()).collect();
            self.gateway.persistence.get_presences(&user_ids).await.unwrap_or_default()
        } else {
            Vec::new()
        };

        let Some(session) = &mut self.session else { return };
        let chunk_count = members.len().div_ceil(MEMBER_CHUNK_SIZE).max(1) as u32;
        for index in 0..chunk_count {
            let start = index as usize * MEMBER_CHUNK_SIZE;
            let end = (start + MEMBER_CHUNK_SIZE).min(members.len());
            let chunk = &members[start..end];
            let chunk_presences = payload.presences.then(|| {
                let ids: HashSet<&str> = chunk.iter().map(|m| m.user.id.as_str()).collect();
                presences
                    .iter()
                    .filter(|p| ids.contains(p.user_id.as_str()))
                    .cloned()
                    .collect()
            });
            let body = GuildMembersChunkPayload {
                guild_id: payload.guild_id.clone(),
                members: chunk.to_vec(),
                chunk_index: index,
                chunk_count,
                presences: chunk_presences,
                nonce: payload.nonce.clone(),
            };
            session
                .dispatch(
                    self.gateway.store.as_ref(),
                    &self.outbound,
                    "GUILD_MEMBERS_CHUNK",
                    serde_json::to_value(&body).unwrap_or(serde_json::Value::Null),
                )
                .await;
            self.gateway.counters.frame_out(OpCode::Dispatch);
        }
    }

    fn join_rooms(&self, session: &Session) {
        let handle = ConnectionHandle {
            view: SessionView {
                user_id: session.user_id.clone(),
                session_id: session.session_id.clone(),
                intents: session.intents,
            },
            events: self.room_tx.clone(),
        };
        self.gateway.rooms.join(self.id, session.guilds.clone(), handle);
    }

    async fn send_control<T: Serialize>(&self, op: OpCode, payload: T) {
        let frame = OutboundFrame::control(op, payload);
        if let Ok(text) = serde_json::to_string(&frame) {
            if self.outbound.send(Message::Text(text)).await.is_ok() {
                self.gateway.counters.frame_out(op);
            }
        }
    }

    async fn send_invalid_session(&self, resumable: bool) {
        self.send_control(OpCode::InvalidSession, InvalidSessionPayload { resumable })
            .await;
    }

    async fn fail(&mut self, err: GatewayError) {
        warn!(conn_id = %self.id, %err, "protocol error");
        self.send_invalid_session(err.resumable()).await;
        if !err.resumable() {
            if let Some(session) = &self.session {
                let _ = self.gateway.store.delete_session(&session.session_id).await;
            }
        }
        self.state = ConnectionState::Closing;
    }

    async fn cleanup(&mut self) {
        self.state = ConnectionState::Closing;
        if let Some(session) = self.session.take() {
            self.gateway.rooms.leave(self.id, session.guilds);
        }
        self.gateway.release_connection();
        self.gateway.counters.connection_closed();
    }
}

fn fallback_user(user_id: &str) -> User {
    User {
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::state::fakes::test_state;

    #[tokio::test]
    async fn identify_transitions_to_active_and_sends_ready() {
        let state = test_state("tok", "U1");
        let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel(16);
        let (room_tx, room_rx) = tokio::sync::mpsc::channel(16);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            gateway: state,
            outbound: outbound_tx,
            room_tx,
            room_rx,
            session: None,
            state: ConnectionState::AwaitingIdentify,
            limiter: RateLimiter::default(),
            missed_pongs: 0,
        };

        connection
            .do_identify(IdentifyPayload {
                token: "tok".to_string(),
                intents: GatewayIntents::all(),
                properties: None,
            })
            .await
            .unwrap();

        assert_eq!(connection.state, ConnectionState::Active);
        assert!(connection.session.is_some());
        let frame = outbound_rx.recv().await.unwrap();
        let Message::Text(text) = frame else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["t"], "READY");
        assert_eq!(value["s"], 1);
    }

    #[tokio::test]
    async fn identify_with_bad_token_fails() {
        let state = test_state("tok", "U1");
        let (outbound_tx, _outbound_rx) = tokio::sync::mpsc::channel(16);
        let (room_tx, room_rx) = tokio::sync::mpsc::channel(16);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            gateway: state,
            outbound: outbound_tx,
            room_tx,
            room_rx,
            session: None,
            state: ConnectionState::AwaitingIdentify,
            limiter: RateLimiter::default(),
            missed_pongs: 0,
        };

        let err = connection
            .do_identify(IdentifyPayload {
                token: "wrong".to_string(),
                intents: GatewayIntents::all(),
                properties: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthFailed));
    }

    #[tokio::test]
    async fn resume_rejects_mismatched_user() {
        let state = test_state("tok", "U1");
        state
            .store
            .store_session_index(
                "S1",
                &SessionIndexEntry {
                    conn_id: "other-conn".to_string(),
                    user_id: "SOMEONE_ELSE".to_string(),
                    intents: GatewayIntents::all().bits(),
                },
            )
            .await
            .unwrap();

        let (outbound_tx, _outbound_rx) = tokio::sync::mpsc::channel(16);
        let (room_tx, room_rx) = tokio::sync::mpsc::channel(16);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            gateway: state,
            outbound: outbound_tx,
            room_tx,
            room_rx,
            session: None,
            state: ConnectionState::AwaitingIdentify,
            limiter: RateLimiter::default(),
            missed_pongs: 0,
        };

        let err = connection
            .do_resume(ResumePayload {
                token: "tok".to_string(),
                session_id: "S1".to_string(),
                sequence: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSession));
    }

    #[tokio::test]
    async fn resume_replays_buffered_events_and_keeps_original_sequence() {
        let state = test_state("tok", "U1");
        state
            .store
            .store_session_index(
                "S1",
                &SessionIndexEntry {
                    conn_id: "other-conn".to_string(),
                    user_id: "U1".to_string(),
                    intents: GatewayIntents::all().bits(),
                },
            )
            .await
            .unwrap();
        state
            .store
            .append_resume_event("S1", 5, "MESSAGE_CREATE", serde_json::json!({"n": 5}))
            .await
            .unwrap();
        state
            .store
            .append_resume_event("S1", 6, "MESSAGE_CREATE", serde_json::json!({"n": 6}))
            .await
            .unwrap();

        let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel(16);
        let (room_tx, room_rx) = tokio::sync::mpsc::channel(16);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            gateway: state,
            outbound: outbound_tx,
            room_tx,
            room_rx,
            session: None,
            state: ConnectionState::AwaitingIdentify,
            limiter: RateLimiter::default(),
            missed_pongs: 0,
        };

        connection
            .do_resume(ResumePayload {
                token: "tok".to_string(),
                session_id: "S1".to_string(),
                sequence: 4,
            })
            .await
            .unwrap();

        assert_eq!(connection.session.as_ref().unwrap().sequence, 6);

        let first = outbound_rx.recv().await.unwrap();
        let Message::Text(text) = first else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["s"], 5);

        let second = outbound_rx.recv().await.unwrap();
        let Message::Text(text) = second else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["s"], 6);

        let resumed = outbound_rx.recv().await.unwrap();
        let Message::Text(text) = resumed else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["t"], "RESUMED");
        assert_eq!(value["s"], 7);
    }

    #[tokio::test]
    async fn resume_with_buffer_gap_is_reported_as_resumable() {
        let state = test_state("tok", "U1");
        state
            .store
            .store_session_index(
                "S1",
                &SessionIndexEntry {
                    conn_id: "other-conn".to_string(),
                    user_id: "U1".to_string(),
                    intents: GatewayIntents::all().bits(),
                },
            )
            .await
            .unwrap();
        state
            .store
            .append_resume_event("S1", 10, "MESSAGE_CREATE", serde_json::json!({}))
            .await
            .unwrap();

        let (outbound_tx, _outbound_rx) = tokio::sync::mpsc::channel(16);
        let (room_tx, room_rx) = tokio::sync::mpsc::channel(16);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            gateway: state,
            outbound: outbound_tx,
            room_tx,
            room_rx,
            session: None,
            state: ConnectionState::AwaitingIdentify,
            limiter: RateLimiter::default(),
            missed_pongs: 0,
        };

        let err = connection
            .do_resume(ResumePayload {
                token: "tok".to_string(),
                session_id: "S1".to_string(),
                sequence: 2,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ResumeBufferGap));
        assert!(err.resumable());
    }
}
