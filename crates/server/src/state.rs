//! Server state shared by every handler.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info_span, Instrument};

use pgshim_configuration::{ConfigurationError, ServerOptions};
use query_engine_execution::metrics;

use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub struct ServerState {
    /// The shared pool for the request/response path.
    pub pool: PgPool,
    pub sessions: Arc<SessionManager>,
    pub metrics: metrics::Metrics,
    pub metrics_registry: prometheus::Registry,
}

impl ServerState {
    /// Build the state around an existing pool. Session connections use the
    /// pool's connect options.
    pub fn new(pool: PgPool) -> Result<ServerState, InitializationError> {
        let mut metrics_registry = prometheus::Registry::new();
        let metrics = metrics::initialise_metrics(&mut metrics_registry)
            .map_err(InitializationError::MetricsError)?;
        let sessions = Arc::new(SessionManager::new(pool.connect_options(), metrics.clone()));
        Ok(ServerState {
            pool,
            sessions,
            metrics,
            metrics_registry,
        })
    }
}

/// Connect to the database and set up the server state.
pub async fn create_state(options: &ServerOptions) -> Result<ServerState, InitializationError> {
    let uri = options
        .connection_uri()
        .map_err(InitializationError::ConfigurationError)?;
    tracing::info!(database = %uri, "connecting to database");

    let pool = async {
        options
            .pool_settings()
            .pool_options()
            .connect(uri.as_str())
            .await
            .map_err(InitializationError::UnableToCreatePool)
    }
    .instrument(info_span!("Create connection pool"))
    .await?;

    async { ServerState::new(pool) }
        .instrument(info_span!("Setup metrics"))
        .await
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(sqlx::Error),
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
    #[error("{0}")]
    ConfigurationError(ConfigurationError),
}
