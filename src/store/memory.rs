//! # In-Memory Store
//!
//! [`ObjectStore`] holding objects as JSON in a shared map. It mimics the
//! API server behaviour the reconcilers rely on:
//!
//! - uid and `resourceVersion` assignment, stale versions rejected on replace
//! - deletion of objects with finalizers only sets `deletionTimestamp`;
//!   the object disappears once the last finalizer is removed
//! - owner reference cascade on deletion
//! - the token controller: `kubernetes.io/service-account-token` secrets get
//!   `data.token` populated once their service account exists
//!
//! Every operation yields to the scheduler before touching state so that
//! concurrent passes interleave the way they would against a real cluster.

use super::{ObjectKey, ObjectStore, StoreError, StoreObject};
use crate::constants::{
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_SECRET_TYPE, TOKEN_DATA_KEY,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde::de::Error as _;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// `(apiVersion, kind, namespace, name)`
type StoredKey = (String, String, Option<String>, String);

#[derive(Debug)]
struct State {
    objects: BTreeMap<StoredKey, Value>,
    next_uid: u64,
    next_version: u64,
    writes: usize,
    injected_conflicts: HashMap<String, u32>,
    populate_tokens: bool,
}

/// Shared in-memory object store; clones share state
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                objects: BTreeMap::new(),
                next_uid: 1,
                next_version: 1,
                writes: 0,
                injected_conflicts: HashMap::new(),
                populate_tokens: true,
            })),
        }
    }

    /// Never populate service account tokens
    #[must_use]
    pub fn without_token_population(self) -> Self {
        self.lock().populate_tokens = false;
        self
    }

    /// Number of successful create, replace and delete calls so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Reject the next `count` replaces of `kind` with a conflict
    pub fn fail_next_replaces(&self, kind: &str, count: u32) {
        self.lock()
            .injected_conflicts
            .insert(kind.to_string(), count);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn stored_key<K: StoreObject>(namespace: Option<&str>, name: &str) -> StoredKey {
    (
        K::api_version(&()).into_owned(),
        K::kind(&()).into_owned(),
        namespace.map(str::to_string),
        name.to_string(),
    )
}

fn key_of<K: StoreObject>(obj: &K) -> Result<StoredKey, StoreError> {
    let meta = obj.meta();
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| serde_json::Error::custom("metadata.name is required"))?;
    Ok(stored_key::<K>(meta.namespace.as_deref(), name))
}

fn meta_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata")?.get(field)?.as_str()
}

fn set_meta(value: &mut Value, field: &str, content: Value) -> Result<(), StoreError> {
    let meta = value
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| serde_json::Error::custom("object has no metadata"))?;
    meta.insert(field.to_string(), content);
    Ok(())
}

fn has_finalizers(value: &Value) -> bool {
    value
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

fn owned_by(value: &Value, uid: &str) -> bool {
    value
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .is_some_and(|refs| {
            refs.iter()
                .any(|r| r.get("uid").and_then(Value::as_str) == Some(uid))
        })
}

impl State {
    fn bump_version(&mut self, value: &mut Value) -> Result<(), StoreError> {
        let version = self.next_version;
        self.next_version += 1;
        set_meta(value, "resourceVersion", Value::String(version.to_string()))
    }

    fn populate_token(&self, key: &StoredKey, value: &mut Value) -> Result<(), StoreError> {
        if !self.populate_tokens || key.0 != "v1" || key.1 != "Secret" {
            return Ok(());
        }
        let mut secret: Secret = serde_json::from_value(value.clone())?;
        if secret.type_.as_deref() != Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE) {
            return Ok(());
        }
        let Some(account) = secret
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(SERVICE_ACCOUNT_NAME_ANNOTATION))
            .cloned()
        else {
            return Ok(());
        };
        let namespace = key.2.clone().unwrap_or_default();
        let account_key = (
            "v1".to_string(),
            "ServiceAccount".to_string(),
            key.2.clone(),
            account.clone(),
        );
        if !self.objects.contains_key(&account_key) {
            return Ok(());
        }

        let data = secret.data.get_or_insert_with(BTreeMap::new);
        if data.contains_key(TOKEN_DATA_KEY) {
            return Ok(());
        }
        data.insert(
            TOKEN_DATA_KEY.to_string(),
            ByteString(format!("token-{namespace}-{account}").into_bytes()),
        );
        *value = serde_json::to_value(&secret)?;
        Ok(())
    }

    /// Delete honouring finalizers, then cascade to dependents
    fn remove(&mut self, key: &StoredKey) -> Result<bool, StoreError> {
        let Some(mut value) = self.objects.get(key).cloned() else {
            return Ok(false);
        };

        if has_finalizers(&value) {
            if meta_str(&value, "deletionTimestamp").is_none() {
                let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
                set_meta(&mut value, "deletionTimestamp", Value::String(now))?;
                self.bump_version(&mut value)?;
                self.objects.insert(key.clone(), value);
            }
            return Ok(true);
        }

        self.objects.remove(key);
        if let Some(uid) = meta_str(&value, "uid") {
            let dependents: Vec<StoredKey> = self
                .objects
                .iter()
                .filter(|(_, v)| owned_by(v, uid))
                .map(|(k, _)| k.clone())
                .collect();
            for dependent in dependents {
                self.remove(&dependent)?;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        state
            .objects
            .get(&stored_key::<K>(key.namespace.as_deref(), &key.name))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        tokio::task::yield_now().await;
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        let state = self.lock();
        state
            .objects
            .iter()
            .filter(|((av, k, ns, _), _)| {
                *av == api_version && *k == kind && (namespace.is_none() || ns.as_deref() == namespace)
            })
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        tokio::task::yield_now().await;
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;

        let mut state = self.lock();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        let uid = format!("uid-{}", state.next_uid);
        state.next_uid += 1;
        set_meta(&mut value, "uid", Value::String(uid))?;
        state.bump_version(&mut value)?;
        state.populate_token(&key, &mut value)?;

        let created = serde_json::from_value(value.clone())?;
        state.objects.insert(key, value);
        state.writes += 1;
        Ok(created)
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        tokio::task::yield_now().await;
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;

        let mut state = self.lock();
        if let Some(remaining) = state.injected_conflicts.get_mut(&key.1) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Conflict);
            }
        }

        let current = state.objects.get(&key).ok_or(StoreError::NotFound)?;
        let requested = meta_str(&value, "resourceVersion");
        if requested.is_some() && requested != meta_str(current, "resourceVersion") {
            return Err(StoreError::Conflict);
        }

        // Server-owned fields cannot be changed by a replace
        for field in ["uid", "deletionTimestamp"] {
            match current.get("metadata").and_then(|m| m.get(field)).cloned() {
                Some(v) => set_meta(&mut value, field, v)?,
                None => {
                    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
                        meta.remove(field);
                    }
                }
            }
        }

        state.bump_version(&mut value)?;
        state.populate_token(&key, &mut value)?;

        let replaced = serde_json::from_value(value.clone())?;
        let finalized = meta_str(&value, "deletionTimestamp").is_some() && !has_finalizers(&value);
        state.objects.insert(key.clone(), value);
        if finalized {
            state.remove(&key)?;
        }
        state.writes += 1;
        Ok(replaced)
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        let existed = state.remove(&stored_key::<K>(key.namespace.as_deref(), &key.name))?;
        if existed {
            state.writes += 1;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Tenant, TenantSpec};
    use k8s_openapi::api::core::v1::ServiceAccount;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn secret(namespace: &str, name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create(&secret("argocd", "acme")).await.unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());
        assert!(matches!(
            store.create(&secret("argocd", "acme")).await,
            Err(StoreError::AlreadyExists)
        ));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_replace_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let created = store.create(&secret("argocd", "acme")).await.unwrap();

        let mut first = created.clone();
        first.metadata.labels = Some(BTreeMap::from([("a".to_string(), "1".to_string())]));
        store.replace(&first).await.unwrap();

        assert!(matches!(
            store.replace(&created).await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = MemoryStore::new();
        let created = store.create(&secret("argocd", "acme")).await.unwrap();
        store.fail_next_replaces("Secret", 1);

        assert!(matches!(
            store.replace(&created).await,
            Err(StoreError::Conflict)
        ));
        store.replace(&created).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_object_succeeds() {
        let store = MemoryStore::new();
        let deleted = store
            .delete::<Secret>(&ObjectKey::namespaced("argocd", "ghost"))
            .await
            .unwrap();
        assert!(!deleted);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_owner_deletion_cascades() {
        let store = MemoryStore::new();
        let tenant = store
            .create(&Tenant::new("acme", TenantSpec::default()))
            .await
            .unwrap();

        let mut owned = secret("argocd", "acme");
        owned.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "capsule.clastix.io/v1beta2".to_string(),
            kind: "Tenant".to_string(),
            name: "acme".to_string(),
            uid: tenant.metadata.uid.clone().unwrap(),
            ..OwnerReference::default()
        }]);
        store.create(&owned).await.unwrap();
        store.create(&secret("argocd", "unrelated")).await.unwrap();

        store
            .delete::<Tenant>(&ObjectKey::cluster("acme"))
            .await
            .unwrap();

        let remaining: Vec<Secret> = store.list(Some("argocd")).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metadata.name.as_deref(), Some("unrelated"));
    }

    #[tokio::test]
    async fn test_finalizers_defer_removal() {
        let store = MemoryStore::new();
        let mut tenant = Tenant::new("acme", TenantSpec::default());
        tenant.metadata.finalizers = Some(vec!["example.com/hold".to_string()]);
        store.create(&tenant).await.unwrap();

        store
            .delete::<Tenant>(&ObjectKey::cluster("acme"))
            .await
            .unwrap();
        let mut marked: Tenant = store
            .get(&ObjectKey::cluster("acme"))
            .await
            .unwrap()
            .unwrap();
        assert!(marked.metadata.deletion_timestamp.is_some());

        marked.metadata.finalizers = None;
        store.replace(&marked).await.unwrap();
        let gone: Option<Tenant> = store.get(&ObjectKey::cluster("acme")).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_token_populated_when_account_exists() {
        let store = MemoryStore::new();
        let mut token = secret("capsule-argo-addon", "acme");
        token.type_ = Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE.to_string());
        token.metadata.annotations = Some(BTreeMap::from([(
            SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
            "acme".to_string(),
        )]));

        let without_account = store.create(&token).await.unwrap();
        assert!(without_account.data.is_none());

        store
            .create(&ServiceAccount {
                metadata: ObjectMeta {
                    name: Some("acme".to_string()),
                    namespace: Some("capsule-argo-addon".to_string()),
                    ..ObjectMeta::default()
                },
                ..ServiceAccount::default()
            })
            .await
            .unwrap();
        let populated = store.replace(&without_account).await.unwrap();

        assert_eq!(
            populated.data.unwrap().get(TOKEN_DATA_KEY),
            Some(&ByteString(b"token-capsule-argo-addon-acme".to_vec()))
        );
    }
}
