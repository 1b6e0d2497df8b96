//! The web UI: a single page plus the JSON API it drives.

pub mod handlers;
pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    runtime::Runtime,
};

use session::SessionStore;

// Traits.

/// Builds the services a session runs against when it is initialized.
#[async_trait]
pub trait RuntimeProvider: Send + Sync + 'static {
    async fn create(&self) -> Res<Runtime>;
}

/// Builds a fresh [`Runtime`] from the configuration on every initialization.
pub struct ConfigRuntimeProvider {
    config: Config,
}

impl ConfigRuntimeProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RuntimeProvider for ConfigRuntimeProvider {
    async fn create(&self) -> Res<Runtime> {
        Runtime::new(self.config.clone()).await
    }
}

// Structs.

/// Shared state for the web handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub provider: Arc<dyn RuntimeProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn RuntimeProvider>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::default()),
            provider,
        }
    }
}

/// All routes of the UI and its API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/session", post(handlers::create_session))
        .route("/api/session/{id}", get(handlers::get_session))
        .route("/api/session/{id}/initialize", post(handlers::initialize))
        .route("/api/session/{id}/reset", post(handlers::reset))
        .route("/api/session/{id}/query", post(handlers::query))
        .route("/api/session/{id}/followup", post(handlers::followup))
        .with_state(state)
}

/// Serve the UI until Ctrl-C.
#[instrument(skip_all)]
pub async fn serve(config: Config) -> Void {
    let state = AppState::new(Arc::new(ConfigRuntimeProvider::new(config.clone())));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Helios listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Helios stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
