//! # Watch Loop
//!
//! Runs the settings and tenant controllers side by side and restarts them
//! when their streams end, until shutdown is requested.

use crate::controller::server::ServerState;
use crate::controller::{settings, tenant, Reconciler};
use crate::crd::{ArgoAddon, Tenant};
use crate::runtime::error_policy::{
    handle_watch_stream_error, settings_error_policy, tenant_error_policy,
};
use crate::runtime::initialization::InitializationResult;
use crate::store::KubeStore;
use futures::StreamExt;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Run both controllers until shutdown
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        reconciler,
        server_state,
        shutdown,
    } = init;

    spawn_shutdown_handler(Arc::clone(&server_state), shutdown.clone());
    let restart_delay = reconciler.config.watch_restart_delay_duration();

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting controller watch loops...");
        futures::future::join(
            run_settings_controller(client.clone(), Arc::clone(&reconciler), restart_delay),
            run_tenant_controller(client.clone(), Arc::clone(&reconciler), restart_delay),
        )
        .instrument(tracing::info_span!("controller.watch", operation = "watch_loop"))
        .await;

        tokio::select! {
            () = shutdown.cancelled() => {
                info!("Shutdown requested, exiting watch loop");
                break;
            }
            () = tokio::time::sleep(restart_delay) => {
                warn!(
                    "Controller watch streams ended, restarted after {} seconds",
                    restart_delay.as_secs()
                );
            }
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

async fn run_settings_controller(
    client: Client,
    reconciler: Arc<Reconciler<KubeStore>>,
    restart_delay: Duration,
) {
    let addons: Api<ArgoAddon> = Api::all(client);
    let selector = format!("metadata.name={}", reconciler.config.setting_name);

    Controller::new(addons, watcher::Config::default().fields(&selector))
        .shutdown_on_signal()
        .run(settings::reconcile, settings_error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(setting = %obj.name, "settings.event.reconciled"),
                Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
            }
        })
        .await;
}

async fn run_tenant_controller(
    client: Client,
    reconciler: Arc<Reconciler<KubeStore>>,
    restart_delay: Duration,
) {
    let tenants: Api<Tenant> = Api::all(client);
    let concurrency = reconciler.config.max_concurrent_reconciliations;

    Controller::new(tenants, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(tenant::reconcile, tenant_error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(resource.name = %obj.name, action = ?action, "watch.event.reconciled");
                }
                Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
            }
        })
        .await;
}

/// Mark the server not ready and cancel in-flight passes on SIGINT/SIGTERM
fn spawn_shutdown_handler(server_state: Arc<ServerState>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
        info!("Marked server as not ready, cancelling in-flight reconciliations");
    });
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
