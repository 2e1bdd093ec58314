// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the main server struct and implementation for the NFT API server,
//! including server lifecycle management, router configuration, and coordinated graceful
//! shutdown using `CancellationToken`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, http::HeaderName};
use external_apis::{Aggregator, SourceRegistry};
use hyper::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn};

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    routes::create_routes,
    state::ServerState,
};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight connections after shutdown is requested
    pub graceful_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Main server struct
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create new server instance, building every enabled data source
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Sources` if a data source cannot be built from its
    /// configuration.
    pub fn new(config: ServerConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        let registry = SourceRegistry::from_config(&config.sources)?;
        let aggregator = Aggregator::new(Arc::new(registry), config.aggregator.clone());
        Ok(Self::with_aggregator(
            config,
            shutdown_config,
            Arc::new(aggregator),
        ))
    }

    /// Create server with a custom aggregator for dependency injection
    pub fn with_aggregator(
        config: ServerConfig,
        shutdown_config: ShutdownConfig,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        let state = ServerState::new(
            config.clone(),
            aggregator,
            cancellation_token.child_token(),
        );
        let router = Self::create_router(state.clone());

        Self {
            config,
            router,
            state,
            cancellation_token,
            shutdown_config,
        }
    }

    /// Create application router with middleware
    fn create_router(state: ServerState) -> Router {
        let timeout_duration = state.config().timeout_seconds.value();

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                    if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                        info_span!("http_request", ?request_id, path = %req.uri().path())
                    } else {
                        error!("failed to extract id from request");
                        info_span!("http_request", request_id = "unknown")
                    }
                }),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(timeout_duration));

        create_routes().layer(middleware).with_state(state)
    }

    async fn bind(&self) -> ServerResult<(TcpListener, SocketAddr)> {
        let address = self.config.socket_addr();
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let bound = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;
        Ok((listener, bound))
    }

    /// Serve until a shutdown signal arrives or the token is cancelled
    ///
    /// In-flight connections get `graceful_timeout` to finish once shutdown starts.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// `ServerError::Startup` if the bound address cannot be read back, or
    /// `ServerError::Shutdown` if serving fails.
    pub async fn run(self) -> ServerResult<()> {
        let (listener, bound) = self.bind().await?;
        info!(
            address = %bound,
            environment = %self.config.environment,
            sources = ?self.state.aggregator().registry().source_names(),
            "NFT API server starting",
        );

        tokio::spawn(cancel_on_signal(self.cancellation_token.clone()));

        let token = self.cancellation_token;
        let stop_accepting = token.clone();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { stop_accepting.cancelled().await })
            .into_future();

        let drained = async {
            token.cancelled().await;
            tokio::time::sleep(self.shutdown_config.graceful_timeout).await;
        };

        tokio::select! {
            result = serve => {
                result.map_err(|source| {
                    error!(error = %source, "server error");
                    ServerError::Shutdown { source }
                })?;
                info!("NFT API server shut down gracefully");
            }
            () = drained => {
                warn!(
                    timeout_seconds = self.shutdown_config.graceful_timeout.as_secs(),
                    "graceful shutdown timed out, dropping open connections"
                );
            }
        }
        Ok(())
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Serve in the background on the configured address, for tests
    ///
    /// Cancelling the returned token stops the server.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, CancellationToken)> {
        let (listener, bound) = self.bind().await?;
        let token = self.cancellation_token.clone();
        let stop = token.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, self.router)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
            {
                error!(error = %e, "test server failed");
            }
        });
        Ok((bound, token))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        signal = shutdown_signal() => {
            warn!(signal, "shutdown signal received, cancelling all operations");
            token.cancel();
        }
        () = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "failed to register signal handlers");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to register CTRL+C handler");
        std::future::pending::<()>().await;
    }
    "CTRL+C"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[tokio::test]
    async fn server_creation() -> ServerResult<()> {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, ShutdownConfig::default())?;
        assert_eq!(server.config().environment, Environment::Testing);
        assert!(!server.cancellation_token().is_cancelled());
        assert_eq!(server.state().aggregator().registry().source_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn programmatic_shutdown() -> ServerResult<()> {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, ShutdownConfig::default())?;

        assert!(!server.state().cancellation_token.is_cancelled());

        server.shutdown();

        assert!(server.cancellation_token().is_cancelled());
        assert!(server.state().cancellation_token.is_cancelled());
        Ok(())
    }

    #[test]
    fn invalid_source_config_fails_startup() {
        let mut config = ServerConfig::for_testing();
        config.sources.ipfs_gateway = "not a url".to_string();

        let error = Server::new(config, ShutdownConfig::default()).unwrap_err();
        assert!(matches!(error, ServerError::Sources { .. }));
    }

    #[test]
    fn shutdown_config_default() {
        assert_eq!(
            ShutdownConfig::default().graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }
}
