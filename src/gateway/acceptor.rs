//! The Connection Acceptor: accepts upgrade requests on a fixed path,
//! enforces the process-wide live-connection ceiling, and hands each
//! accepted socket to the Protocol Engine.

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{self, StatusCode};
use tracing::{info, warn};

use super::connection;
use super::state::GatewayState;

/// Binds the configured listen address and serves connections until the
/// process is told to stop. Returns only on a listener-level I/O error;
/// per-connection errors are logged and never propagate here.
pub async fn run(state: GatewayState) -> std::io::Result<()> {
    let listener = TcpListener::bind(state.config.server.listen).await?;
    info!(
        addr = %state.config.server.listen,
        path = %state.config.server.path,
        "gateway listening"
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        if !state.try_reserve_connection() {
            warn!(%peer, "rejecting connection: live-connection ceiling reached");
            tokio::spawn(reject(stream));
            continue;
        }

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = accept_and_serve(stream, state.clone()).await {
                warn!(%peer, %err, "connection setup failed");
                state.release_connection();
            }
        });
    }
}

async fn accept_and_serve(
    stream: TcpStream,
    state: GatewayState,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let path = state.config.server.path.clone();
    let callback = move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() != path {
            let rejection = http::Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Some("not found".to_string()))
                .expect("static response is well-formed");
            return Err(rejection);
        }
        Ok(response)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    connection::handle(ws, state).await;
    Ok(())
}

/// A connection turned away before the websocket handshake because the
/// process is already at `server.max_connections`.
async fn reject(mut stream: TcpStream) {
    let _ = stream
        .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
        .await;
    let _ = stream.shutdown().await;
}
