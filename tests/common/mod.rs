//! Shared fixtures for the reconciler integration tests
//!
//! Every test runs against its own [`MemoryStore`] seeded with the
//! capsule-proxy service and published default settings.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use capsule_argo_addon::controller::tenant;
use capsule_argo_addon::prelude::*;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TENANT: &str = "acme";
pub const SA_NAMESPACE: &str = "capsule-argo-addon";
pub const PROXY_NAMESPACE: &str = "capsule-system";
pub const ARGO_NAMESPACE: &str = "argocd";

/// Controller config with millisecond retry delays
pub fn config() -> ControllerConfig {
    ControllerConfig {
        retry_initial_ms: 1,
        retry_max_ms: 5,
        ..ControllerConfig::default()
    }
}

pub fn reconciler(store: &MemoryStore) -> Arc<Reconciler<MemoryStore>> {
    reconciler_with(store, config())
}

/// Reconciler over `store` with default settings already published
pub fn reconciler_with(store: &MemoryStore, config: ControllerConfig) -> Arc<Reconciler<MemoryStore>> {
    let settings = SettingsStore::new();
    settings.update(ArgoAddonSpec::default());
    Arc::new(Reconciler::new(store.clone(), settings, config))
}

pub fn proxy_selector() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "app.kubernetes.io/name".to_string(),
        "capsule-proxy".to_string(),
    )])
}

/// The capsule-proxy service every tenant proxy service mirrors
pub async fn seed_capsule_proxy(store: &MemoryStore) {
    let service = Service {
        metadata: ObjectMeta {
            name: Some("capsule-proxy".to_string()),
            namespace: Some(PROXY_NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("proxy".to_string()),
                port: 9001,
                node_port: Some(30901),
                target_port: Some(IntOrString::Int(9001)),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            selector: Some(proxy_selector()),
            type_: Some("NodePort".to_string()),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    };
    store.create(&service).await.unwrap();
}

/// Store with capsule-proxy and tenant `acme` owned by user `alice`
pub async fn seeded_store(annotations: &[(&str, &str)]) -> MemoryStore {
    let store = MemoryStore::new();
    seed_capsule_proxy(&store).await;
    create_tenant(&store, annotations).await;
    store
}

pub async fn create_tenant(store: &MemoryStore, annotations: &[(&str, &str)]) -> Tenant {
    let mut tenant = Tenant::new(
        TENANT,
        TenantSpec {
            owners: vec![OwnerSpec::new("User", "alice")],
            ..TenantSpec::default()
        },
    );
    if !annotations.is_empty() {
        tenant.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
    }
    store.create(&tenant).await.unwrap()
}

pub async fn stored_tenant(store: &MemoryStore) -> Option<Tenant> {
    store.get(&ObjectKey::cluster(TENANT)).await.unwrap()
}

/// Set one annotation on the stored tenant
pub async fn annotate_tenant(store: &MemoryStore, key: &str, value: &str) {
    let mut tenant = stored_tenant(store).await.unwrap();
    tenant
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    store.replace(&tenant).await.unwrap();
}

/// Run one pass over the tenant as currently stored
pub async fn reconcile_stored(
    store: &MemoryStore,
    ctx: &Arc<Reconciler<MemoryStore>>,
) -> Result<Action, ReconcilerError> {
    let tenant = stored_tenant(store).await.unwrap();
    tenant::reconcile(Arc::new(tenant), Arc::clone(ctx)).await
}

pub async fn get<K: StoreObject>(store: &MemoryStore, namespace: &str, name: &str) -> Option<K> {
    store
        .get(&ObjectKey::namespaced(namespace, name))
        .await
        .unwrap()
}

/// Decoded value of a data key
pub fn data_text(data: &BTreeMap<String, k8s_openapi::ByteString>, key: &str) -> String {
    String::from_utf8(data[key].0.clone()).unwrap()
}
