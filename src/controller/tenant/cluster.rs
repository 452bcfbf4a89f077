//! # Argo CD Cluster Registration
//!
//! The per-tenant proxy service in front of capsule-proxy and the Argo CD
//! cluster secret pointing at it. Both embed the service account token and
//! are only converged once a token has been issued.

use super::decision::{decide, Decision};
use super::objects::{create_or_update, decouple, delete, fetch, ownership_conflict};
use super::TenantScope;
use crate::constants::{ARGO_SECRET_TYPE_CLUSTER, ARGO_SECRET_TYPE_LABEL, OPAQUE_SECRET_TYPE};
use crate::controller::types::ReconcilerError;
use crate::meta::{tracking_labels, with_tracking_labels};
use crate::store::{ObjectKey, ObjectStore};
use k8s_openapi::api::core::v1::{Secret, Service, ServicePort, ServiceSpec};
use k8s_openapi::ByteString;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Reconcile the tenant proxy service
///
/// Returns the URL Argo CD reaches the tenant through, when the service was
/// converged this pass.
pub async fn reconcile_proxy_service<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
    token: Option<&str>,
) -> Result<Option<String>, ReconcilerError> {
    let key = scope.proxy_service_key();
    debug!(service = %key, "reconciling proxy service");

    let existing = fetch::<S, Service>(scope, &key).await?;
    match decide(
        existing.as_ref().map(|o| &o.metadata),
        scope.tenant,
        &scope.policy,
        scope.policy.proxy,
    ) {
        Decision::Skip => Ok(None),
        Decision::Decouple => {
            if decouple::<S, Service>(scope, &key).await? {
                info!(service = %key, "decoupled proxy service");
            }
            Ok(None)
        }
        Decision::Conflict => Err(ownership_conflict::<S, Service>(scope, &key)),
        Decision::Remove => {
            if delete::<S, Service>(scope, &key).await? {
                info!(service = %key, "removed proxy service");
            }
            Ok(None)
        }
        Decision::Converge if token.is_none() => {
            debug!(service = %key, "no token yet, deferring proxy service");
            Ok(None)
        }
        Decision::Converge => {
            let upstream = resolve_upstream(scope).await?;
            let tenant = scope.tenant;
            create_or_update::<S, Service, _>(scope, &key, |service: &mut Service| {
                service.metadata.labels = Some(tracking_labels(tenant));
                mirror_upstream(service.spec.get_or_insert_with(ServiceSpec::default), &upstream);
                scope.own(&mut service.metadata)
            })
            .await?;
            Ok(Some(scope.settings.proxy_service_url(&scope.tenant_name)))
        }
    }
}

async fn resolve_upstream<S: ObjectStore>(scope: &TenantScope<'_, S>) -> Result<ServiceSpec, ReconcilerError> {
    let proxy = &scope.settings.proxy;
    let key = ObjectKey::namespaced(
        &proxy.capsule_proxy_service_namespace,
        &proxy.capsule_proxy_service_name,
    );
    fetch::<S, Service>(scope, &key)
        .await?
        .map(|service| service.spec.unwrap_or_default())
        .ok_or_else(|| ReconcilerError::ProxyServiceUnresolved {
            namespace: proxy.capsule_proxy_service_namespace.clone(),
            name: proxy.capsule_proxy_service_name.clone(),
        })
}

/// Copy ports and selector of the capsule-proxy service
///
/// Node ports are allocated per service and cannot be shared.
fn mirror_upstream(spec: &mut ServiceSpec, upstream: &ServiceSpec) {
    spec.ports = upstream.ports.as_ref().map(|ports| {
        ports
            .iter()
            .map(|port| ServicePort {
                node_port: None,
                ..port.clone()
            })
            .collect()
    });
    spec.selector.clone_from(&upstream.selector);
}

/// Reconcile the Argo CD cluster secret
pub async fn reconcile_cluster_secret<S: ObjectStore>(
    scope: &TenantScope<'_, S>,
    token: Option<&str>,
    server: Option<&str>,
) -> Result<(), ReconcilerError> {
    let key = scope.cluster_secret_key();
    debug!(secret = %key, "reconciling cluster secret");

    let existing = fetch::<S, Secret>(scope, &key).await?;
    match decide(
        existing.as_ref().map(|o| &o.metadata),
        scope.tenant,
        &scope.policy,
        scope.policy.proxy,
    ) {
        Decision::Skip => Ok(()),
        Decision::Decouple => {
            if decouple::<S, Secret>(scope, &key).await? {
                info!(secret = %key, "decoupled cluster secret");
            }
            Ok(())
        }
        Decision::Conflict => Err(ownership_conflict::<S, Secret>(scope, &key)),
        Decision::Remove => {
            if delete::<S, Secret>(scope, &key).await? {
                info!(secret = %key, "removed cluster secret");
            }
            Ok(())
        }
        Decision::Converge => {
            let (Some(token), Some(server)) = (token, server) else {
                debug!(secret = %key, "no token yet, deferring cluster secret");
                return Ok(());
            };

            let data = cluster_secret_data(&scope.tenant_name, server, token)?;
            let tenant = scope.tenant;
            let result = create_or_update::<S, Secret, _>(scope, &key, |secret: &mut Secret| {
                let mut labels = with_tracking_labels(&secret.metadata, tenant);
                labels.insert(
                    ARGO_SECRET_TYPE_LABEL.to_string(),
                    ARGO_SECRET_TYPE_CLUSTER.to_string(),
                );
                secret.metadata.labels = Some(labels);
                if secret.type_.is_none() {
                    secret.type_ = Some(OPAQUE_SECRET_TYPE.to_string());
                }
                secret
                    .data
                    .get_or_insert_with(BTreeMap::new)
                    .extend(data.clone());
                scope.own(&mut secret.metadata)
            })
            .await?;
            info!(secret = %key, result = ?result, "🚀 Argo CD cluster reconciled");
            Ok(())
        }
    }
}

/// Payload of the cluster secret as understood by Argo CD
pub fn cluster_secret_data(
    tenant: &str,
    server: &str,
    token: &str,
) -> Result<BTreeMap<String, ByteString>, ReconcilerError> {
    let config = serde_json::to_string(&json!({
        "bearerToken": token,
        "tlsClientConfig": {
            "insecure": true,
        },
    }))?;

    Ok([
        ("name", tenant.to_string()),
        ("project", tenant.to_string()),
        ("server", server.to_string()),
        ("config", config),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), ByteString(v.into_bytes())))
    .collect())
}
