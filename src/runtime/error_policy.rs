//! # Error Policy
//!
//! Requeue decisions after failed reconciliations and classification of
//! watch stream errors.

use crate::controller::{Reconciler, ReconcilerError};
use crate::crd::{ArgoAddon, Tenant};
use crate::observability::metrics;
use crate::store::ObjectStore;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed tenant with its Fibonacci backoff
///
/// Backoff is tracked per tenant so one failing tenant does not slow down
/// the others. A successful pass resets it. Ownership conflicts are reported
/// and not requeued.
pub fn tenant_error_policy<S: ObjectStore>(
    tenant: Arc<Tenant>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<S>>,
) -> Action {
    let name = tenant.name_any();
    let _guard = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.kind = "Tenant",
        resource.name = %name,
        error = %error
    )
    .entered();

    metrics::increment_reconciliation_errors(error.reason());
    match error {
        ReconcilerError::ObjectAlreadyExists { .. } => {
            // Needs the object removed or the force policy set; neither is
            // resolved by retrying, so wait for the tenant to change
            warn!(
                "Tenant {} blocked by an existing object, waiting for a change: {}",
                name, error
            );
            return Action::await_change();
        }
        ReconcilerError::Cancelled => info!("Reconciliation of tenant {} cancelled", name),
        _ => error!("Reconciliation error for tenant {}: {:?}", name, error),
    }

    let (delay, error_count) = ctx.record_error(&name);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::minutes(1));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        delay.as_secs(),
        error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s, trigger source: error-backoff)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Requeue a failed settings reconciliation after a fixed interval
pub fn settings_error_policy<S: ObjectStore>(
    addon: Arc<ArgoAddon>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<S>>,
) -> Action {
    let delay = ctx.config.reconciliation_error_requeue_duration();
    error!(
        setting = %addon.name_any(),
        error = %error,
        "settings reconciliation failed, retrying in {}s",
        delay.as_secs()
    );
    metrics::increment_requeues_total("settings-error");
    Action::requeue(delay)
}

/// What to do with a failed watch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// Credentials rejected; RBAC may have been revoked
    Unauthorized,
    /// Resource version too old, the watcher relists on its own
    Expired,
    /// API server busy or storage reinitializing
    Throttled,
    /// Watched resource or CRD missing
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify a controller stream error by its rendered form
    pub fn classify(error: &str) -> Self {
        // 404s rendered as plain text surface as WatchFailed, so check them first
        let not_found =
            error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
        if (error.contains("401") || error.contains("Unauthorized")) && !not_found {
            Self::Unauthorized
        } else if error.contains("410")
            || error.contains("too old resource version")
            || error.contains("Expired")
            || error.contains("Gone")
        {
            Self::Expired
        } else if error.contains("429")
            || error.contains("storage is (re)initializing")
            || error.contains("TooManyRequests")
        {
            Self::Throttled
        } else if not_found {
            Self::NotFound
        } else {
            Self::Other
        }
    }
}

/// Log a watch stream error and wait before the stream continues
pub async fn handle_watch_stream_error(error: &str, restart_delay: Duration) {
    let kind = WatchErrorKind::classify(error);
    let _guard = tracing::warn_span!("controller.watch.error", error = %error, kind = ?kind).entered();

    match kind {
        WatchErrorKind::Unauthorized => {
            error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("   Verify the controller ClusterRole still grants access to tenants, service accounts, secrets and services");
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410) - watch will relist");
            return;
        }
        WatchErrorKind::Throttled => {
            warn!("API server throttling or reinitializing storage (429), backing off");
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - is the Capsule Tenant or ArgoAddon CRD installed? Error: {}",
                error
            );
            return;
        }
        WatchErrorKind::Other => error!("Controller stream error: {}", error),
    }

    warn!("⏳ Waiting {}s before continuing the watch...", restart_delay.as_secs());
    tokio::time::sleep(restart_delay).await;
}
