//! # Kubernetes API Store
//!
//! [`ObjectStore`] backed by the API server. Owner cascades are performed by
//! the Kubernetes garbage collector.

use super::{ObjectKey, ObjectStore, StoreError, StoreObject};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

/// Store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map API status codes onto the store error taxonomy
fn classify(error: kube::Error) -> StoreError {
    match &error {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound,
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            StoreError::AlreadyExists
        }
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict,
        _ => StoreError::Api(error),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        K::api(self.client.clone(), key.namespace.as_deref())
            .get_opt(&key.name)
            .await
            .map_err(classify)
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let list = K::api(self.client.clone(), namespace)
            .list(&ListParams::default())
            .await
            .map_err(classify)?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        K::api(self.client.clone(), obj.namespace().as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(classify)
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K, StoreError> {
        K::api(self.client.clone(), obj.namespace().as_deref())
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(classify)
    }

    async fn delete<K: StoreObject>(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        match K::api(self.client.clone(), key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::background())
            .await
            .map_err(classify)
        {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => {
                debug!(object = %key, "delete skipped, object already gone");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
