//! # ArgoAddon Spec
//!
//! Controller settings. Exactly one object, selected by name, is authoritative.

use crate::constants::{
    DEFAULT_ARGO_NAMESPACE, DEFAULT_CAPSULE_PROXY_SERVICE_NAME,
    DEFAULT_CAPSULE_PROXY_SERVICE_NAMESPACE, DEFAULT_CAPSULE_PROXY_SERVICE_PORT,
    DEFAULT_SERVICE_ACCOUNT_NAMESPACE,
};
use crate::impl_subtract;
use serde::{Deserialize, Serialize};

/// ArgoAddon Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: addons.projectcapsule.dev/v1alpha1
/// kind: ArgoAddon
/// metadata:
///   name: default
/// spec:
///   force: false
///   decouple: false
///   argo:
///     namespace: argocd
///   proxy:
///     enabled: true
///     serviceAccountNamespace: capsule-argo-addon
///     capsuleProxyServiceName: capsule-proxy
///     capsuleProxyServiceNamespace: capsule-system
///     capsuleProxyServicePort: 9001
///     capsuleProxyTls: true
/// ```
#[derive(
    kube::CustomResource,
    Debug,
    Clone,
    Default,
    PartialEq,
    Deserialize,
    Serialize,
    schemars::JsonSchema,
)]
#[kube(
    kind = "ArgoAddon",
    group = "addons.projectcapsule.dev",
    version = "v1alpha1",
    shortname = "aa",
    printcolumn = r#"{"name":"Argo", "type":"string", "jsonPath":".spec.argo.namespace"}, {"name":"Proxy", "type":"boolean", "jsonPath":".spec.proxy.enabled"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ArgoAddonSpec {
    /// Adopt pre-existing objects that collide with a tenant's dependents
    /// Tenants may override this with the `force` annotation
    #[serde(default)]
    pub force: bool,
    /// Keep dependents (minus ownership markers) when a tenant is deleted
    /// Tenants may override this with the `decouple` annotation
    #[serde(default)]
    pub decouple: bool,
    /// Argo CD installation
    #[serde(default)]
    pub argo: ArgoConfig,
    /// capsule-proxy registration
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Argo CD installation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoConfig {
    /// Namespace Argo CD reads cluster secrets from
    #[serde(default = "default_argo_namespace")]
    pub namespace: String,
}

/// capsule-proxy settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Register tenants through capsule-proxy
    /// Tenants may override this with the `proxy` annotation
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Namespace of the per-tenant service accounts and their tokens
    #[serde(default = "default_service_account_namespace")]
    pub service_account_namespace: String,
    /// Name of the capsule-proxy service mirrored per tenant
    #[serde(default = "default_capsule_proxy_service_name")]
    pub capsule_proxy_service_name: String,
    /// Namespace of the capsule-proxy service
    #[serde(default = "default_capsule_proxy_service_namespace")]
    pub capsule_proxy_service_namespace: String,
    /// Port capsule-proxy listens on
    #[serde(default = "default_capsule_proxy_service_port")]
    pub capsule_proxy_service_port: u16,
    /// Whether capsule-proxy serves TLS
    #[serde(default = "default_true")]
    pub capsule_proxy_tls: bool,
}

impl Default for ArgoConfig {
    fn default() -> Self {
        Self {
            namespace: default_argo_namespace(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_account_namespace: default_service_account_namespace(),
            capsule_proxy_service_name: default_capsule_proxy_service_name(),
            capsule_proxy_service_namespace: default_capsule_proxy_service_namespace(),
            capsule_proxy_service_port: default_capsule_proxy_service_port(),
            capsule_proxy_tls: true,
        }
    }
}

impl ArgoAddonSpec {
    /// URL Argo CD uses to reach a tenant through its proxy service
    #[must_use]
    pub fn proxy_service_url(&self, tenant: &str) -> String {
        let scheme = if self.proxy.capsule_proxy_tls {
            "https"
        } else {
            "http"
        };
        format!(
            "{scheme}://{tenant}.{}.svc:{}",
            self.proxy.capsule_proxy_service_namespace, self.proxy.capsule_proxy_service_port
        )
    }
}

impl_subtract!(ArgoAddonSpec {
    force,
    decouple,
    argo,
    proxy,
});
impl_subtract!(ArgoConfig { namespace });
impl_subtract!(ProxyConfig {
    enabled,
    service_account_namespace,
    capsule_proxy_service_name,
    capsule_proxy_service_namespace,
    capsule_proxy_service_port,
    capsule_proxy_tls,
});

/// Default value for boolean true
pub fn default_true() -> bool {
    true
}

/// Default Argo CD namespace
pub fn default_argo_namespace() -> String {
    DEFAULT_ARGO_NAMESPACE.to_string()
}

/// Default service account namespace
pub fn default_service_account_namespace() -> String {
    DEFAULT_SERVICE_ACCOUNT_NAMESPACE.to_string()
}

/// Default capsule-proxy service name
pub fn default_capsule_proxy_service_name() -> String {
    DEFAULT_CAPSULE_PROXY_SERVICE_NAME.to_string()
}

/// Default capsule-proxy service namespace
pub fn default_capsule_proxy_service_namespace() -> String {
    DEFAULT_CAPSULE_PROXY_SERVICE_NAMESPACE.to_string()
}

/// Default capsule-proxy service port
pub fn default_capsule_proxy_service_port() -> u16 {
    DEFAULT_CAPSULE_PROXY_SERVICE_PORT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Subtract;

    #[test]
    fn test_empty_spec_deserializes_to_defaults() {
        let spec: ArgoAddonSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, ArgoAddonSpec::default());
        assert_eq!(spec.argo.namespace, "argocd");
        assert!(spec.proxy.enabled);
        assert_eq!(spec.proxy.capsule_proxy_service_port, 9001);
    }

    #[test]
    fn test_partial_proxy_keeps_remaining_defaults() {
        let spec: ArgoAddonSpec =
            serde_json::from_str(r#"{"proxy":{"enabled":false,"capsuleProxyTls":false}}"#).unwrap();
        assert!(!spec.proxy.enabled);
        assert!(!spec.proxy.capsule_proxy_tls);
        assert_eq!(spec.proxy.service_account_namespace, "capsule-argo-addon");
    }

    #[test]
    fn test_proxy_service_url() {
        let mut spec = ArgoAddonSpec::default();
        assert_eq!(
            spec.proxy_service_url("acme"),
            "https://acme.capsule-system.svc:9001"
        );

        spec.proxy.capsule_proxy_tls = false;
        spec.proxy.capsule_proxy_service_port = 8080;
        assert_eq!(
            spec.proxy_service_url("acme"),
            "http://acme.capsule-system.svc:8080"
        );
    }

    #[test]
    fn test_subtract_leaves_only_changed_settings() {
        let previous = ArgoAddonSpec::default();
        let mut current = ArgoAddonSpec::default();
        current.argo.namespace = "gitops".to_string();
        current.proxy.capsule_proxy_service_port = 9443;

        current.subtract(&previous);

        assert_eq!(current.argo.namespace, "gitops");
        assert_eq!(current.proxy.capsule_proxy_service_port, 9443);
        assert_eq!(current.proxy.capsule_proxy_service_name, "");
        assert!(!current.proxy.enabled);
    }
}
