//! # Object Store
//!
//! The reconcilers talk to Kubernetes through [`ObjectStore`] so that every
//! pass can be exercised against [`MemoryStore`] in tests.
//!
//! Contract shared by both implementations:
//!
//! - `get` returns `None` for a missing object
//! - `replace` is optimistic: a stale `resourceVersion` yields [`StoreError::Conflict`]
//! - `delete` of a missing object succeeds and returns `false`
//! - deleting an owner cascades to objects carrying its uid in `ownerReferences`

mod api;
mod memory;

pub use api::KubeStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, Service, ServiceAccount};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::crd::{ArgoAddon, Tenant};

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("object was modified concurrently")]
    Conflict,
    #[error("object already exists")]
    AlreadyExists,
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Resource types the reconcilers read and write
pub trait StoreObject:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// API handle for this type, namespaced when `namespace` is given
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_store_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StoreObject for $ty {
                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client, ns),
                        None => Api::all(client),
                    }
                }
            }
        )*
    };
}

macro_rules! cluster_store_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StoreObject for $ty {
                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )*
    };
}

namespaced_store_object!(ServiceAccount, Secret, Service);
cluster_store_object!(Tenant, ArgoAddon);

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Key of an existing object
    pub fn of<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Typed CRUD access with optimistic concurrency
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an object, `None` when it does not exist
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// List objects, across all namespaces when `namespace` is `None`
    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Create an object; [`StoreError::AlreadyExists`] when the name is taken
    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace an object guarded by its `resourceVersion`
    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Delete an object; returns whether it existed
    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<bool, StoreError>;
}
