//! # Settings Reconciler
//!
//! Publishes the spec of the single, name-pinned `ArgoAddon` object into the
//! shared [`SettingsStore`](crate::config::SettingsStore).
//!
//! Two entry points share the fetch-validate-publish path:
//!
//! - [`initialize`] runs once before the tenant controller starts; a missing
//!   settings object is an error there
//! - [`reconcile`] is driven by the `ArgoAddon` watch; a missing object is
//!   not an error and leaves the published snapshot untouched
//!
//! A candidate that fails validation is never published, so the previous
//! snapshot stays authoritative.

mod validation;

pub use validation::{SettingsValidator, StructuralValidator};

use crate::controller::types::{Reconciler, ReconcilerError};
use crate::crd::{ArgoAddon, ArgoAddonSpec};
use crate::diff::Subtract;
use crate::observability::metrics;
use crate::store::{ObjectKey, ObjectStore, StoreError};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether an `ArgoAddon` named `name` is the configured settings object
pub fn matches_setting_name(configured: &str, name: &str) -> bool {
    configured == name
}

/// Watch entry point
pub async fn reconcile<S: ObjectStore>(
    addon: Arc<ArgoAddon>,
    ctx: Arc<Reconciler<S>>,
) -> Result<Action, ReconcilerError> {
    let name = addon.name_any();
    if !matches_setting_name(&ctx.config.setting_name, &name) {
        debug!(setting = %name, "ignoring unrelated ArgoAddon");
        return Ok(Action::await_change());
    }

    reconcile_setting(&ctx, &name).await?;
    Ok(Action::await_change())
}

/// Fetch, validate and publish the settings object `name`
///
/// Returns whether a snapshot was published.
pub async fn reconcile_setting<S: ObjectStore>(
    ctx: &Reconciler<S>,
    name: &str,
) -> Result<bool, ReconcilerError> {
    let pass = ctx.pass();
    let Some(addon) = pass
        .run(ctx.store.get::<ArgoAddon>(&ObjectKey::cluster(name)))
        .await?
    else {
        info!(setting = name, "settings object not found, keeping current settings");
        return Ok(false);
    };

    publish(ctx, addon.spec)?;
    Ok(true)
}

/// Load the settings once before tenant reconciliation starts
pub async fn initialize<S: ObjectStore>(ctx: &Reconciler<S>) -> Result<(), ReconcilerError> {
    let name = ctx.config.setting_name.as_str();
    let pass = ctx.pass();
    let addon = pass
        .run(ctx.store.get::<ArgoAddon>(&ObjectKey::cluster(name)))
        .await?
        .ok_or(StoreError::NotFound)?;

    info!(setting = name, "bootstrapping settings");
    publish(ctx, addon.spec)
}

fn publish<S: ObjectStore>(ctx: &Reconciler<S>, spec: ArgoAddonSpec) -> Result<(), ReconcilerError> {
    if let Err(e) = ctx.validator.validate(&spec) {
        warn!(error = %e, "settings rejected, keeping previous snapshot");
        metrics::increment_settings_reloads("rejected");
        return Err(e);
    }

    let mut delta = spec.clone();
    match ctx.settings.update(spec) {
        Some(previous) if *previous == delta => {
            debug!("settings unchanged");
        }
        Some(previous) => {
            delta.subtract(&previous);
            match changed_fields(&delta) {
                Ok(changed) => info!(changed = %changed, "settings updated"),
                Err(e) => {
                    warn!(error = %e, "settings updated, changed fields could not be rendered");
                }
            }
        }
        None => info!("settings loaded"),
    }
    metrics::increment_settings_reloads("published");
    Ok(())
}

/// Render a subtracted spec for the update log
fn changed_fields(delta: &ArgoAddonSpec) -> Result<String, serde_json::Error> {
    serde_json::to_string(delta)
}
