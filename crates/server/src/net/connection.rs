//! WebSocket pump for one client.
//!
//! Owns the socket and the [`Connection`] for the lifetime of the link:
//! inbound text frames go to [`Connection::handle_text`], router output
//! from [`Connection::next_outbound`] goes back out. However the loop ends,
//! the connection is disconnected exactly once before the task exits.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};

use crate::error::ClientError;
use crate::lifecycle::Connection;
use crate::protocol::{self, ServerMessage};
use crate::state::ServerState;

/// Drive one upgraded socket until either side closes it.
pub async fn handle(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut conn = Connection::open(state);
    let id = conn.id();
    tracing::info!("Connection {} opened", id);

    if let Err(e) = pump(&mut socket, &mut conn).await {
        tracing::warn!("Connection {} closed: {:#}", id, e);
    }

    conn.disconnect();
    tracing::info!("Connection {} closed", id);
}

async fn pump(socket: &mut WebSocket, conn: &mut Connection) -> Result<()> {
    loop {
        tokio::select! {
            outbound = conn.next_outbound() => {
                match outbound {
                    Some(message) => send(socket, &message).await?,
                    None => return Ok(()), // bus gone
                }
            }

            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        for reply in conn.handle_text(&text).await {
                            send(socket, &reply).await?;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = ClientError::Validation("binary frames are not supported".into());
                        send(socket, &err.to_message()).await?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        socket.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<()> {
    let text = protocol::encode(message)?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}
