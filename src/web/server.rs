//! Web server for megagate.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::storage::SharedStorage;
use crate::{GateError, Result};

use super::handlers::AppState;
use super::middleware::{JwtState, RateLimitState};
use super::router::{create_health_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// Login rate limiting state.
    rate_limit: Arc<RateLimitState>,
    /// Full configuration.
    config: Config,
}

impl WebServer {
    /// Create a new web server around a remote storage client.
    pub fn new(config: &Config, storage: SharedStorage) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| GateError::Config(format!("invalid listen address: {e}")))?;

        let app_state = AppState::new(storage, &config.auth, &config.upload.staging_path);
        let jwt_state = Arc::new(JwtState::new(&config.auth.jwt_secret));
        let rate_limit = Arc::new(RateLimitState::new(
            config.auth.login_rate_limit,
            config.server.trust_forwarded_headers,
        ));

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state,
            rate_limit,
            config: config.clone(),
        })
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn bind(self) -> Result<(TcpListener, Router)> {
        std::fs::create_dir_all(&self.app_state.staging_dir)?;

        self.rate_limit.clone().start_cleanup_task();

        let router = create_router(
            self.app_state,
            self.jwt_state,
            self.rate_limit,
            &self.config,
        )
        .merge(create_health_router())
        .layer(CompressionLayer::new());

        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        Ok((listener, router))
    }

    /// Run the web server until Ctrl-C is received.
    pub async fn run(self) -> Result<()> {
        let (listener, router) = self.bind().await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

