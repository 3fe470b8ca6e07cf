//! Process-local mapping from guild id / user id to the set of connections
//! subscribed here. Read-dominated, so it is backed by
//! [`dashmap::DashMap`] rather than a single mutex around a `HashMap`.

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::model::gateway::intents::GatewayIntents;

/// The immutable slice of a `Session` the room index needs to run the
/// intent filter without ever touching the session itself. Built once, at
/// `IDENTIFY`/`RESUME` time, and never mutated afterwards — `intents` is
/// immutable after assignment, so sharing it outside the connection's
/// exclusive ownership is safe.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub user_id: String,
    pub session_id: String,
    pub intents: GatewayIntents,
}

/// One entry in the room index's connection registry: enough to reach a
/// connection's task and to run the filter against it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub view: SessionView,
    pub events: tokio::sync::mpsc::Sender<RoomEvent>,
}

/// A bus-originated event handed to a connection's own task, which alone is
/// permitted to stamp its session's next sequence number.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Dispatch {
        event_name: String,
        payload: serde_json::Value,
    },
    Invalidate {
        resumable: bool,
    },
    /// Sent to every local connection on process shutdown: advises the
    /// client to disconnect and resume elsewhere.
    Shutdown,
}

/// Process-local registry of live connections, indexed by guild and by
/// user, plus the connection handles needed to reach them.
#[derive(Debug, Default)]
pub struct RoomIndex {
    guild_rooms: DashMap<String, DashSet<Uuid>>,
    user_rooms: DashMap<String, DashSet<Uuid>>,
    connections: DashMap<Uuid, ConnectionHandle>,
}

impl RoomIndex {
    /// Registers a connection and joins every room named in `guilds` plus
    /// the connection's own user room. Called once on `IDENTIFY`/`RESUME`.
    pub fn join(&self, conn_id: Uuid, guilds: impl IntoIterator<Item = String>, handle: ConnectionHandle) {
        let user_id = handle.view.user_id.clone();
        self.connections.insert(conn_id, handle);

        self.user_rooms
            .entry(user_id)
            .or_default()
            .insert(conn_id);

        for guild_id in guilds {
            self.guild_rooms
                .entry(guild_id)
                .or_default()
                .insert(conn_id);
        }
    }

    /// Removes a connection from every room it belongs to. Called on close.
    pub fn leave(&self, conn_id: Uuid, guilds: impl IntoIterator<Item = String>) {
        if let Some((_, handle)) = self.connections.remove(&conn_id) {
            if let Some(room) = self.user_rooms.get(&handle.view.user_id) {
                room.remove(&conn_id);
            }
        }
        for guild_id in guilds {
            if let Some(room) = self.guild_rooms.get(&guild_id) {
                room.remove(&conn_id);
            }
        }
    }

    /// Connection handles currently joined to `guild:{guild_id}`.
    #[must_use]
    pub fn guild_members(&self, guild_id: &str) -> Vec<ConnectionHandle> {
        self.connections_in(self.guild_rooms.get(guild_id))
    }

    /// Connection handles currently joined to `user:{user_id}` (every live
    /// session of that user, across all of this process's connections).
    #[must_use]
    pub fn user_connections(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.connections_in(self.user_rooms.get(user_id))
    }

    /// Every connection registered on this process, regardless of room
    /// membership. Used only by the shutdown path to broadcast `RECONNECT`
    /// to every local session.
    #[must_use]
    pub fn all_connections(&self) -> Vec<ConnectionHandle> {
        self.connections.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of connections currently registered, for the process-wide
    /// live-connection ceiling the acceptor enforces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn connections_in(&self, room: Option<dashmap::mapref::one::Ref<'_, String, DashSet<Uuid>>>) -> Vec<ConnectionHandle> {
        let Some(room) = room else {
            return Vec::new();
        };
        room.iter()
            .filter_map(|id| self.connections.get(&id).map(|h| h.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(user_id: &str) -> ConnectionHandle {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        ConnectionHandle {
            view: SessionView {
                user_id: user_id.to_string(),
                session_id: "s".to_string(),
                intents: GatewayIntents::all(),
            },
            events: tx,
        }
    }

    #[test]
    fn join_populates_guild_and_user_rooms() {
        let index = RoomIndex::default();
        let conn = Uuid::new_v4();
        index.join(conn, vec!["G1".to_string()], handle("U1"));

        assert_eq!(index.guild_members("G1").len(), 1);
        assert_eq!(index.user_connections("U1").len(), 1);
    }

    #[test]
    fn leave_removes_from_every_room() {
        let index = RoomIndex::default();
        let conn = Uuid::new_v4();
        index.join(conn, vec!["G1".to_string()], handle("U1"));
        index.leave(conn, vec!["G1".to_string()]);

        assert_eq!(index.guild_members("G1").len(), 0);
        assert_eq!(index.user_connections("U1").len(), 0);
    }
}
