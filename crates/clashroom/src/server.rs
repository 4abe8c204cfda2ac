//! `ClashroomServer` builder and server loop.
//!
//! This is the entry point for running a Clashroom server. It ties together
//! all the layers: transport → protocol → gateway → registry → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clashroom_protocol::{Codec, JsonCodec};
use clashroom_room::{RoomConfig, RoomRegistry};
use clashroom_rules::RuleProvider;
use clashroom_transport::{DEFAULT_HANDSHAKE_TIMEOUT, Transport, WebSocketTransport};

use crate::gateway::SessionGateway;
use crate::handler::handle_connection;
use crate::{ClashroomError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<P: RuleProvider, C: Codec> {
    pub(crate) gateway: SessionGateway<P>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Clashroom server.
///
/// # Example
///
/// ```rust,ignore
/// use clashroom::prelude::*;
///
/// let server = ClashroomServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(RuleGenerator::Disabled)
///     .await?;
/// server.run().await
/// ```
pub struct ClashroomServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    handshake_timeout: Duration,
}

impl ClashroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: crate::config::DEFAULT_BIND.to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Starts from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind.clone(),
            room_config: config.room.clone(),
            handshake_timeout: config.handshake_timeout,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a new socket gets to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server around `provider`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<P: RuleProvider>(
        self,
        provider: P,
    ) -> Result<ClashroomServer<P, JsonCodec>, ClashroomError> {
        let transport = WebSocketTransport::bind(self.bind_addr.as_str())
            .await?
            .with_handshake_timeout(self.handshake_timeout);

        let registry = RoomRegistry::new(self.room_config, provider);
        let state = Arc::new(ServerState {
            gateway: SessionGateway::new(registry),
            codec: JsonCodec,
        });

        Ok(ClashroomServer { transport, state })
    }
}

impl Default for ClashroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Clashroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ClashroomServer<P: RuleProvider, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, C>>,
}

impl ClashroomServer<clashroom_rules::RuleGenerator, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ClashroomServerBuilder {
        ClashroomServerBuilder::new()
    }
}

impl<P, C> ClashroomServer<P, C>
where
    P: RuleProvider,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ClashroomError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle to the server's rooms.
    pub fn registry(&self) -> RoomRegistry<P> {
        self.state.gateway.registry().clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ClashroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops every
    /// room.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ClashroomError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "clashroom server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    // The handshake runs on the connection's own task.
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("shutting down");
        self.state.gateway.registry().shutdown_all().await;
        self.transport.shutdown().await?;
        Ok(())
    }
}
