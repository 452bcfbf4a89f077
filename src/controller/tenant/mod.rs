//! # Tenant Reconciler
//!
//! Converges the dependents Argo CD needs to deploy into a Capsule tenant:
//!
//! 1. service account and its token secret, plus the owner principal entry
//! 2. proxy service mirroring capsule-proxy
//! 3. Argo CD cluster secret carrying the token
//!
//! Every dependent goes through [`decide`](decision::decide): decouple on
//! deletion, refuse foreign objects unless forced, remove when disabled,
//! otherwise converge. Steps 2 and 3 embed the token, so they wait for a
//! pass in which the token has been issued.

pub mod cluster;
pub mod decision;
pub mod finalizer;
pub mod objects;
pub mod owners;
pub mod service_account;

use crate::controller::retry::PassContext;
use crate::controller::types::{Reconciler, ReconcilerError};
use crate::crd::{ArgoAddonSpec, Tenant};
use crate::meta::{add_tenant_owner_reference, is_deleting, TenantPolicy};
use crate::observability::metrics;
use crate::store::{ObjectKey, ObjectStore};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Everything one pass over one tenant works with
#[derive(Debug)]
pub struct TenantScope<'a, S> {
    pub store: &'a S,
    pub pass: &'a PassContext,
    pub tenant: &'a Tenant,
    pub tenant_name: String,
    pub settings: &'a ArgoAddonSpec,
    pub policy: TenantPolicy,
}

impl<'a, S> TenantScope<'a, S> {
    pub fn new(
        store: &'a S,
        pass: &'a PassContext,
        tenant: &'a Tenant,
        settings: &'a ArgoAddonSpec,
    ) -> Self {
        Self {
            store,
            pass,
            tenant,
            tenant_name: tenant.name_any(),
            settings,
            policy: TenantPolicy::resolve(tenant, settings),
        }
    }

    /// Service account and token secret share this key
    pub fn service_account_key(&self) -> ObjectKey {
        ObjectKey::namespaced(&self.policy.service_account_namespace, &self.tenant_name)
    }

    pub fn proxy_service_key(&self) -> ObjectKey {
        ObjectKey::namespaced(
            &self.settings.proxy.capsule_proxy_service_namespace,
            &self.tenant_name,
        )
    }

    pub fn cluster_secret_key(&self) -> ObjectKey {
        ObjectKey::namespaced(&self.settings.argo.namespace, &self.tenant_name)
    }

    /// Point `meta` at the tenant as its owner
    pub fn own(&self, meta: &mut ObjectMeta) -> Result<(), ReconcilerError> {
        if add_tenant_owner_reference(meta, self.tenant) {
            Ok(())
        } else {
            Err(ReconcilerError::MissingUid(format!(
                "tenant {}",
                self.tenant_name
            )))
        }
    }
}

/// Watch entry point
pub async fn reconcile<S: ObjectStore>(
    tenant: Arc<Tenant>,
    ctx: Arc<Reconciler<S>>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = tenant.name_any();
    let span = tracing::info_span!("reconcile", resource.kind = "Tenant", resource.name = %name);

    metrics::increment_reconciliations();
    let result = reconcile_tenant(&tenant, &ctx).instrument(span).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    result?;
    ctx.reset_backoff(&name);
    metrics::increment_requeues_total("resync");
    Ok(Action::requeue(ctx.config.resync_interval()))
}

async fn reconcile_tenant<S: ObjectStore>(
    tenant: &Tenant,
    ctx: &Reconciler<S>,
) -> Result<(), ReconcilerError> {
    let settings = ctx.settings.get().ok_or(ReconcilerError::SettingsNotLoaded)?;
    let name = tenant.name_any();
    let pass = ctx.pass();

    let deleting = is_deleting(&tenant.metadata);
    let current = if deleting {
        if !finalizer::has_finalizer(tenant) {
            debug!("tenant is being deleted and already released");
            return Ok(());
        }
        tenant.clone()
    } else {
        let Some(current) = finalizer::ensure_finalizer(&ctx.store, &pass, &name).await? else {
            debug!("tenant no longer exists");
            return Ok(());
        };
        current
    };

    let scope = TenantScope::new(&ctx.store, &pass, &current, &settings);
    info!(
        "🔄 Reconciling tenant {} (proxy: {}, decouple: {}, force: {})",
        name, scope.policy.proxy, scope.policy.decouple, scope.policy.force
    );

    let token = service_account::reconcile_service_account(&scope).await?;
    let server = cluster::reconcile_proxy_service(&scope, token.as_deref()).await?;
    cluster::reconcile_cluster_secret(&scope, token.as_deref(), server.as_deref()).await?;

    if deleting {
        finalizer::remove_finalizer(&ctx.store, &pass, &name).await?;
        info!("✅ Released tenant {}", name);
    } else {
        debug!("tenant reconciled");
    }
    Ok(())
}
