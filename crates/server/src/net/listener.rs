use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use tokio::net::TcpListener;

use crate::metrics::MetricsSnapshot;
use crate::state::ServerState;

/// HTTP routes: the game WebSocket at `/ws`, counters at `/status`.
pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/status", get(status))
        .with_state(state)
}

/// Bind `bind_addr` and serve client connections until the server fails.
pub async fn run(state: Arc<ServerState>, bind_addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on ws://{}/ws", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Upgrade an HTTP request to a game connection.
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| super::connection::handle(socket, state))
}

async fn status(State(state): State<Arc<ServerState>>) -> Json<MetricsSnapshot> {
    Json(state.status())
}
