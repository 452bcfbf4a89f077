//! # Object Metadata
//!
//! Tracking labels, tenant owner references and per-tenant policy resolution.

use crate::constants::{
    DECOUPLE_ANNOTATION, FORCE_ANNOTATION, MANAGED_BY_LABEL, MANAGED_BY_VALUE, PROXY_ANNOTATION,
    SERVICE_ACCOUNT_NAMESPACE_ANNOTATION, SERVICE_ACCOUNT_OWNER_KIND, TENANT_LABEL,
};
use crate::crd::{ArgoAddonSpec, OwnerSpec, Tenant};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Labels identifying a dependent object as managed for `tenant`
pub fn tracking_labels(tenant: &Tenant) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (TENANT_LABEL.to_string(), tenant.name_any()),
    ])
}

/// Existing labels merged with the tracking labels (tracking labels win)
pub fn with_tracking_labels(meta: &ObjectMeta, tenant: &Tenant) -> BTreeMap<String, String> {
    let mut labels = meta.labels.clone().unwrap_or_default();
    labels.extend(tracking_labels(tenant));
    labels
}

/// Owner reference pointing at `tenant`, if the tenant has a uid
pub fn tenant_owner_reference(tenant: &Tenant) -> Option<OwnerReference> {
    let uid = tenant.meta().uid.clone()?;
    Some(OwnerReference {
        api_version: Tenant::api_version(&()).to_string(),
        kind: Tenant::kind(&()).to_string(),
        name: tenant.name_any(),
        uid,
        controller: Some(false),
        block_owner_deletion: Some(true),
    })
}

/// Whether `meta` carries an owner reference to `tenant` (matched by uid)
pub fn has_tenant_owner_reference(meta: &ObjectMeta, tenant: &Tenant) -> bool {
    let Some(uid) = tenant.meta().uid.as_deref() else {
        return false;
    };
    meta.owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == uid))
}

/// Add or refresh the owner reference to `tenant`
///
/// Returns `false` when the tenant has no uid yet.
pub fn add_tenant_owner_reference(meta: &mut ObjectMeta, tenant: &Tenant) -> bool {
    let Some(reference) = tenant_owner_reference(tenant) else {
        return false;
    };
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    match refs.iter_mut().find(|r| r.uid == reference.uid) {
        Some(existing) => *existing = reference,
        None => refs.push(reference),
    }
    true
}

/// Strip the tenant owner reference and the tracking labels from `meta`
pub fn decouple_tenant(meta: &mut ObjectMeta, tenant: &Tenant) {
    if let (Some(refs), Some(uid)) = (meta.owner_references.as_mut(), tenant.meta().uid.as_deref())
    {
        refs.retain(|r| r.uid != uid);
        if refs.is_empty() {
            meta.owner_references = None;
        }
    }

    if let Some(labels) = meta.labels.as_mut() {
        labels.remove(MANAGED_BY_LABEL);
        labels.remove(TENANT_LABEL);
        if labels.is_empty() {
            meta.labels = None;
        }
    }
}

/// Whether the object has been marked for deletion
pub fn is_deleting(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

/// Owner principal granting the tenant service account access
pub fn service_account_owner(namespace: &str, name: &str) -> OwnerSpec {
    OwnerSpec::new(
        SERVICE_ACCOUNT_OWNER_KIND,
        &format!("system:serviceaccount:{namespace}:{name}"),
    )
}

/// Effective per-tenant policy: tenant annotations over addon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPolicy {
    /// Register the tenant through capsule-proxy
    pub proxy: bool,
    /// Keep dependents when the tenant is deleted
    pub decouple: bool,
    /// Adopt pre-existing objects
    pub force: bool,
    /// Namespace of the tenant service account and token
    pub service_account_namespace: String,
}

impl TenantPolicy {
    pub fn resolve(tenant: &Tenant, settings: &ArgoAddonSpec) -> Self {
        let annotations = tenant.annotations();
        let flag = |key: &str, default: bool| {
            annotations
                .get(key)
                .map_or(default, |value| parse_bool(value))
        };

        let service_account_namespace = annotations
            .get(SERVICE_ACCOUNT_NAMESPACE_ANNOTATION)
            .map(|ns| ns.trim())
            .filter(|ns| !ns.is_empty())
            .map_or_else(
                || settings.proxy.service_account_namespace.clone(),
                str::to_string,
            );

        Self {
            proxy: flag(PROXY_ANNOTATION, settings.proxy.enabled),
            decouple: flag(DECOUPLE_ANNOTATION, settings.decouple),
            force: flag(FORCE_ANNOTATION, settings.force),
            service_account_namespace,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
