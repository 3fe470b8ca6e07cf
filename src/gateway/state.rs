//! Wires every shared collaborator the protocol engine needs into one
//! cloneable, `Arc`-friendly handle passed to every connection task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::metrics::Counters;

use super::bus::Bus;
use super::collaborators::{Auth, GuildLoader, MemberFetcher, Persistence, Voice};
use super::room::RoomIndex;
use super::store::SessionStore;

/// Everything a connection task or the acceptor needs to reach a shared
/// collaborator. Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomIndex>,
    pub bus: Arc<dyn Bus>,
    pub store: Arc<dyn SessionStore>,
    pub auth: Arc<dyn Auth>,
    pub guild_loader: Arc<dyn GuildLoader>,
    pub member_fetcher: Arc<dyn MemberFetcher>,
    pub voice: Arc<dyn Voice>,
    pub persistence: Arc<dyn Persistence>,
    pub counters: Arc<dyn Counters>,
    live_connections: Arc<AtomicUsize>,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("config", &self.config)
            .field("rooms", &self.rooms)
            .field(
                "live_connections",
                &self.live_connections.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        bus: Arc<dyn Bus>,
        store: Arc<dyn SessionStore>,
        auth: Arc<dyn Auth>,
        guild_loader: Arc<dyn GuildLoader>,
        member_fetcher: Arc<dyn MemberFetcher>,
        voice: Arc<dyn Voice>,
        persistence: Arc<dyn Persistence>,
        counters: Arc<dyn Counters>,
    ) -> Self {
        Self {
            config,
            rooms: Arc::new(RoomIndex::default()),
            bus,
            store,
            auth,
            guild_loader,
            member_fetcher,
            voice,
            persistence,
            counters,
            live_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to reserve one connection slot against
    /// `server.max_connections`. Returns `false`, leaving the count
    /// unchanged, once the ceiling is reached.
    pub fn try_reserve_connection(&self) -> bool {
        let max = self.config.server.max_connections;
        let mut current = self.live_connections.load(Ordering::Acquire);
        loop {
            if current >= max {
                return false;
            }
            match self.live_connections.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn release_connection(&self) {
        self.live_connections.fetch_sub(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn live_connection_count(&self) -> usize {
        self.live_connections.load(Ordering::Acquire)
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use crate::gateway::bus::InMemoryBus;
    use crate::gateway::collaborators::fakes::FakeAuth;
    use crate::gateway::collaborators::MemberQuery;
    use crate::gateway::store::InMemorySessionStore;
    use crate::metrics::NoopCounters;
    use crate::model::guild::{DmChannel, GuildSnapshot, MemberRow, ReadState, Relationship};
    use crate::model::presence::Activity;
    use crate::model::voice::VoiceServerUpdate;
    use async_trait::async_trait;

    #[derive(Debug, Default)]
    pub struct EmptyGuildLoader;

    #[async_trait]
    impl GuildLoader for EmptyGuildLoader {
        async fn get_user_guilds(&self, _user_id: &str) -> crate::error::Result<Vec<GuildSnapshot>> {
            Ok(Vec::new())
        }
        async fn get_read_states(&self, _user_id: &str) -> crate::error::Result<Vec<ReadState>> {
            Ok(Vec::new())
        }
        async fn get_relationships(&self, _user_id: &str) -> crate::error::Result<Vec<Relationship>> {
            Ok(Vec::new())
        }
        async fn get_user_dm_channels(&self, _user_id: &str) -> crate::error::Result<Vec<DmChannel>> {
            Ok(Vec::new())
        }
    }

    #[derive(Debug, Default)]
    pub struct EmptyMemberFetcher;

    #[async_trait]
    impl MemberFetcher for EmptyMemberFetcher {
        async fn fetch_members(
            &self,
            _guild_id: &str,
            _query: MemberQuery,
        ) -> crate::error::Result<Vec<MemberRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Debug, Default)]
    pub struct NoopVoice;

    #[async_trait]
    impl Voice for NoopVoice {
        async fn join(
            &self,
            _guild_id: &str,
            _channel_id: &str,
            _user_id: &str,
        ) -> crate::error::Result<Option<VoiceServerUpdate>> {
            Ok(None)
        }
        async fn leave(&self, _guild_id: &str, _user_id: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct NoopPersistence;

    #[async_trait]
    impl Persistence for NoopPersistence {
        async fn update_presence(
            &self,
            _user_id: &str,
            _status: crate::model::presence::PresenceStatus,
            _custom_status: Option<String>,
        ) -> crate::error::Result<()> {
            Ok(())
        }
        async fn upsert_activities(&self, _user_id: &str, _activities: Vec<Activity>) -> crate::error::Result<()> {
            Ok(())
        }
        async fn delete_activities(&self, _user_id: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn get_presences(
            &self,
            _user_ids: &[String],
        ) -> crate::error::Result<Vec<crate::model::presence::PresenceRecord>> {
            Ok(Vec::new())
        }
    }

    /// Builds a fully in-memory `GatewayState` for protocol-engine tests:
    /// no Redis, no HTTP, a single known `("token", "user_id")` pair.
    #[must_use]
    pub fn test_state(token: &str, user_id: &str) -> GatewayState {
        let auth = FakeAuth::default();
        auth.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), user_id.to_string());

        GatewayState::new(
            Arc::new(Config::default()),
            Arc::new(InMemoryBus::default()),
            Arc::new(InMemorySessionStore::default()),
            Arc::new(auth),
            Arc::new(EmptyGuildLoader),
            Arc::new(EmptyMemberFetcher),
            Arc::new(NoopVoice),
            Arc::new(NoopPersistence),
            Arc::new(NoopCounters),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::test_state;
    use std::sync::Arc;

    #[test]
    fn reserve_respects_max_connections() {
        let mut state = test_state("t", "u");
        Arc::get_mut(&mut state.config).unwrap().server.max_connections = 1;
        assert!(state.try_reserve_connection());
        assert!(!state.try_reserve_connection());
        state.release_connection();
        assert!(state.try_reserve_connection());
    }
}
