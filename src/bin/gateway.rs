//! CLI entry point: loads configuration, wires the shared collaborators,
//! and runs the acceptor loop until a termination signal arrives —
//! load config, init logging, build the service, run it.

use std::sync::Arc;
use std::time::Duration;

use chorus_gateway::config::Config;
use chorus_gateway::gateway::acceptor;
use chorus_gateway::gateway::bus::{Bus, RedisBus};
use chorus_gateway::gateway::collaborators::HttpCollaborator;
use chorus_gateway::gateway::fanout;
use chorus_gateway::gateway::room::RoomEvent;
use chorus_gateway::gateway::state::GatewayState;
use chorus_gateway::gateway::store::{RedisSessionStore, SessionStore};
use chorus_gateway::metrics::AtomicCounters;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> chorus_gateway::error::Result<()> {
    let config = Arc::new(Config::load()?);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log.level.as_str()))
        .init();

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::new(&config.redis.url)?);
    let store: Arc<dyn SessionStore> = Arc::new(
        RedisSessionStore::connect(
            &config.redis.url,
            config.session.session_ttl(),
            config.session.resume_window(),
            config.session.resume_buffer_max,
        )
        .await?,
    );

    let collaborators = &config.collaborators;
    let auth = Arc::new(HttpCollaborator::new(
        collaborators.auth_base_url.clone(),
        collaborators.shared_key.clone(),
        collaborators.timeout(),
    ));
    let snapshots = Arc::new(HttpCollaborator::new(
        collaborators.snapshot_base_url.clone(),
        collaborators.shared_key.clone(),
        collaborators.timeout(),
    ));
    let voice = Arc::new(HttpCollaborator::new(
        collaborators.voice_base_url.clone(),
        collaborators.shared_key.clone(),
        collaborators.timeout(),
    ));
    let persistence = Arc::new(HttpCollaborator::new(
        collaborators.persistence_base_url.clone(),
        collaborators.shared_key.clone(),
        collaborators.timeout(),
    ));

    let state = GatewayState::new(
        config,
        bus,
        store,
        auth,
        snapshots.clone(),
        snapshots,
        voice,
        persistence,
        Arc::new(AtomicCounters::default()),
    );

    tokio::spawn(fanout::run(state.clone()));

    let acceptor_state = state.clone();
    let acceptor = tokio::spawn(async move { acceptor::run(acceptor_state).await });

    wait_for_shutdown_signal().await;
    info!("termination signal received, broadcasting RECONNECT to local sessions");

    for handle in state.rooms.all_connections() {
        let _ = handle.events.send(RoomEvent::Shutdown).await;
    }
    // Give connection tasks a moment to flush the RECONNECT frame before the
    // process exits; the acceptor task is aborted rather than joined since
    // it never returns on its own.
    tokio::time::sleep(Duration::from_millis(500)).await;
    acceptor.abort();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!(%err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
