//! # Initialization
//!
//! Controller startup: rustls, tracing, metrics, health server, Kubernetes
//! client and the settings bootstrap.

use crate::config::{ControllerConfig, SettingsStore};
use crate::controller::server::{start_server, wait_for_server_ready, ServerState};
use crate::controller::{settings, Reconciler};
use crate::observability;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "capsule_argo_addon=info";

/// Everything the watch loops need
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler<KubeStore>>,
    pub server_state: Arc<ServerState>,
    /// Cancelled on shutdown; parent of every pass token
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if config.json_logs() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialize the controller runtime
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Must run before the first TLS connection; a provider installed earlier
    // in the process is kept
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_tracing(&config)?;

    info!("Starting Capsule Argo CD addon");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn({
        let state = Arc::clone(&server_state);
        async move {
            if let Err(e) = start_server(server_port, state).await {
                error!("HTTP server error: {}", e);
            }
        }
    });
    wait_for_server_ready(
        &server_state,
        &server_handle,
        Duration::from_secs(config.server_startup_timeout_secs),
        Duration::from_millis(config.server_poll_interval_ms),
    )
    .await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let shutdown = CancellationToken::new();
    let setting_name = config.setting_name.clone();
    let reconciler = Arc::new(
        Reconciler::new(KubeStore::new(client.clone()), SettingsStore::new(), config)
            .with_shutdown(shutdown.clone()),
    );

    // Tenants are only reconciled once valid settings are published
    settings::initialize(&reconciler)
        .await
        .with_context(|| format!("Failed to load ArgoAddon settings '{setting_name}'"))?;

    info!("Controller initialized, starting watch loops...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        shutdown,
    })
}
