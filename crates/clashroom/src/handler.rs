//! Per-connection handler: decode inbound events, drain outbound ones.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket handshake (bounded by the transport's
//!      handshake timeout) and derive the participant id from the
//!      connection id
//!   2. Loop: forward decoded events to the gateway, and write every event
//!      queued for this participant back to the socket
//!   3. On close or error, take the participant out of its room

use std::sync::Arc;

use clashroom_protocol::{ClientEvent, Codec, ParticipantId, ServerEvent};
use clashroom_rules::RuleProvider;
use clashroom_transport::{Connection, PendingConnection, PendingWebSocket, WebSocketConnection};
use tokio::sync::mpsc;

use crate::ClashroomError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P, C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<P, C>>,
) -> Result<(), ClashroomError>
where
    P: RuleProvider,
    C: Codec,
{
    let peer = pending.peer_addr();
    let conn = match pending.establish().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "websocket handshake failed");
            return Err(e.into());
        }
    };
    let conn_id = conn.id();
    let participant = ParticipantId(conn_id.into_inner());
    tracing::debug!(%conn_id, %participant, peer = %conn.peer_addr(), "participant connected");

    let result = serve(&conn, participant, &state).await;

    // Every exit path goes through here, errors included.
    state.gateway.disconnect(participant).await;
    if let Err(e) = conn.close().await {
        tracing::trace!(%participant, error = %e, "close after session end failed");
    }
    tracing::debug!(%conn_id, %participant, "participant disconnected");
    result
}

async fn serve<P, C>(
    conn: &WebSocketConnection,
    participant: ParticipantId,
    state: &ServerState<P, C>,
) -> Result<(), ClashroomError>
where
    P: RuleProvider,
    C: Codec,
{
    let (sender, mut outbound) = mpsc::unbounded_channel::<ServerEvent>();

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%participant, "connection closed cleanly");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(%participant, error = %e, "recv error");
                        return Ok(());
                    }
                };

                match state.codec.decode::<ClientEvent>(&data) {
                    Ok(event) => {
                        tracing::trace!(%participant, event = event.name(), "event received");
                        state.gateway.handle_event(participant, event, &sender).await;
                    }
                    Err(e) => {
                        state.gateway.handle_malformed(participant, &e.to_string(), &sender);
                    }
                }
            }
            Some(event) = outbound.recv() => {
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await?;
            }
        }
    }
}
