//! # Controller Lifecycle Tests
//!
//! Settings publication, owner list races, finalizer handling, conflict
//! retries, cancellation and the error requeue policy.

mod common;

use capsule_argo_addon::constants::TENANT_FINALIZER;
use capsule_argo_addon::controller::settings;
use capsule_argo_addon::controller::tenant::owners::{add_owner, remove_owner};
use capsule_argo_addon::prelude::*;
use capsule_argo_addon::runtime::error_policy::tenant_error_policy;
use common::*;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_pass_without_settings_fails() {
    let store = seeded_store(&[]).await;
    let ctx = Arc::new(Reconciler::new(store.clone(), SettingsStore::new(), config()));

    let result = reconcile_stored(&store, &ctx).await;
    assert!(matches!(result, Err(ReconcilerError::SettingsNotLoaded)));
    assert!(stored_tenant(&store).await.unwrap().finalizers().is_empty());
}

#[tokio::test]
async fn test_settings_are_bootstrapped_and_updated() {
    let store = MemoryStore::new();
    let ctx = Arc::new(Reconciler::new(store.clone(), SettingsStore::new(), config()));

    assert!(settings::initialize(&ctx).await.is_err());
    assert!(!ctx.settings.is_loaded());

    let created = store
        .create(&ArgoAddon::new("default", ArgoAddonSpec::default()))
        .await
        .unwrap();
    settings::initialize(&ctx).await.unwrap();
    assert_eq!(ctx.settings.get().unwrap().argo.namespace, "argocd");

    let mut updated = created;
    updated.spec.argo.namespace = "gitops".to_string();
    store.replace(&updated).await.unwrap();

    let action = settings::reconcile(Arc::new(updated), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(ctx.settings.get().unwrap().argo.namespace, "gitops");
}

#[tokio::test]
async fn test_invalid_settings_keep_previous_snapshot() {
    let store = MemoryStore::new();
    let ctx = Arc::new(Reconciler::new(store.clone(), SettingsStore::new(), config()));
    let created = store
        .create(&ArgoAddon::new("default", ArgoAddonSpec::default()))
        .await
        .unwrap();
    settings::initialize(&ctx).await.unwrap();

    let mut broken = created;
    broken.spec.proxy.capsule_proxy_service_name = String::new();
    store.replace(&broken).await.unwrap();

    let result = settings::reconcile_setting(&ctx, "default").await;
    assert!(matches!(result, Err(ReconcilerError::InvalidSettings(_))));
    assert_eq!(
        ctx.settings.get().unwrap().proxy.capsule_proxy_service_name,
        "capsule-proxy"
    );
}

#[tokio::test]
async fn test_other_settings_objects_are_ignored() {
    let store = MemoryStore::new();
    let ctx = Arc::new(Reconciler::new(store.clone(), SettingsStore::new(), config()));
    let other = store
        .create(&ArgoAddon::new("staging", ArgoAddonSpec::default()))
        .await
        .unwrap();

    assert!(settings::matches_setting_name("default", "default"));
    assert!(!settings::matches_setting_name("default", "staging"));

    let action = settings::reconcile(Arc::new(other), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(action, Action::await_change());
    assert!(!ctx.settings.is_loaded());
}

#[tokio::test]
async fn test_deleted_settings_object_keeps_snapshot() {
    let store = MemoryStore::new();
    let ctx = Arc::new(Reconciler::new(store.clone(), SettingsStore::new(), config()));
    store
        .create(&ArgoAddon::new("default", ArgoAddonSpec::default()))
        .await
        .unwrap();
    settings::initialize(&ctx).await.unwrap();

    store
        .delete::<ArgoAddon>(&ObjectKey::cluster("default"))
        .await
        .unwrap();

    assert!(!settings::reconcile_setting(&ctx, "default").await.unwrap());
    assert!(ctx.settings.is_loaded());
}

#[tokio::test]
async fn test_concurrent_owner_updates_keep_one_entry() {
    let store = seeded_store(&[]).await;
    let ctx = reconciler_with(
        &store,
        ControllerConfig {
            retry_steps: 10,
            ..config()
        },
    );
    let pass = ctx.pass();
    let principal = OwnerSpec::new("ServiceAccount", "system:serviceaccount:capsule-argo-addon:acme");

    let (a, b, c, d) = tokio::join!(
        add_owner(&store, &pass, TENANT, &principal),
        add_owner(&store, &pass, TENANT, &principal),
        remove_owner(&store, &pass, TENANT, &principal),
        add_owner(&store, &pass, TENANT, &principal),
    );
    for result in [a, b, c, d] {
        result.unwrap();
    }

    let tenant = stored_tenant(&store).await.unwrap();
    let entries = tenant
        .spec
        .owners
        .iter()
        .filter(|o| o.same_principal(&principal))
        .count();
    assert!(entries <= 1);
    assert!(tenant.spec.owners.iter().any(|o| o.name == "alice"));

    // Whatever the race left behind, a later remove and add settle it
    let entries_of = |tenant: &Tenant| {
        tenant
            .spec
            .owners
            .iter()
            .filter(|o| o.same_principal(&principal))
            .count()
    };

    remove_owner(&store, &pass, TENANT, &principal).await.unwrap();
    assert_eq!(entries_of(&stored_tenant(&store).await.unwrap()), 0);

    add_owner(&store, &pass, TENANT, &principal).await.unwrap();
    let tenant = stored_tenant(&store).await.unwrap();
    assert_eq!(entries_of(&tenant), 1);
    assert_eq!(tenant.spec.owners.len(), 2);
}

#[tokio::test]
async fn test_finalizer_lifecycle() {
    let store = seeded_store(&[]).await;
    let ctx = reconciler(&store);

    reconcile_stored(&store, &ctx).await.unwrap();
    let tenant = stored_tenant(&store).await.unwrap();
    assert_eq!(tenant.finalizers(), &[TENANT_FINALIZER.to_string()]);

    store
        .delete::<Tenant>(&ObjectKey::cluster(TENANT))
        .await
        .unwrap();
    let deleting = stored_tenant(&store).await.unwrap();
    assert!(deleting.metadata.deletion_timestamp.is_some());

    reconcile_stored(&store, &ctx).await.unwrap();
    assert!(stored_tenant(&store).await.is_none());
}

#[tokio::test]
async fn test_injected_conflicts_are_absorbed() {
    let store = seeded_store(&[]).await;
    let ctx = reconciler(&store);
    store.fail_next_replaces("Tenant", 2);

    reconcile_stored(&store, &ctx).await.unwrap();

    let tenant = stored_tenant(&store).await.unwrap();
    assert!(tenant.finalizers().iter().any(|f| f == TENANT_FINALIZER));
    assert_eq!(tenant.spec.owners.len(), 2);
}

#[tokio::test]
async fn test_persistent_conflicts_exhaust_retries() {
    let store = seeded_store(&[]).await;
    let ctx = reconciler(&store);
    store.fail_next_replaces("Tenant", 100);

    let result = reconcile_stored(&store, &ctx).await;
    assert!(matches!(
        result,
        Err(ReconcilerError::RetryExhausted { attempts: 4, .. })
    ));
}

#[tokio::test]
async fn test_shutdown_cancels_the_pass() {
    let store = seeded_store(&[]).await;
    let shutdown = CancellationToken::new();
    let settings = SettingsStore::new();
    settings.update(ArgoAddonSpec::default());
    let ctx = Arc::new(
        Reconciler::new(store.clone(), settings, config()).with_shutdown(shutdown.clone()),
    );
    shutdown.cancel();

    let writes = store.writes();
    let result = reconcile_stored(&store, &ctx).await;

    assert!(matches!(result, Err(ReconcilerError::Cancelled)));
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn test_error_policy_backs_off_per_tenant() {
    let store = seeded_store(&[]).await;
    let ctx = reconciler(&store);
    let tenant = Arc::new(stored_tenant(&store).await.unwrap());
    let error = ReconcilerError::SettingsNotLoaded;

    let delays: Vec<Action> = (0..3)
        .map(|_| tenant_error_policy(Arc::clone(&tenant), &error, Arc::clone(&ctx)))
        .collect();
    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(60)),
            Action::requeue(Duration::from_secs(60)),
            Action::requeue(Duration::from_secs(120)),
        ]
    );

    // A successful pass forgets the failures
    reconcile_stored(&store, &ctx).await.unwrap();
    let after_success = tenant_error_policy(tenant, &error, Arc::clone(&ctx));
    assert_eq!(after_success, Action::requeue(Duration::from_secs(60)));
}
