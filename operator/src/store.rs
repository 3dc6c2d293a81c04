use crate::{Error, Result};
use async_trait::async_trait;
use common::context::get_short_name;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Client, Resource, ResourceExt,
    api::{Api, ListParams, Patch, PatchParams},
    runtime::reflector::ObjectRef,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::fmt::Debug;
use tracing::*;

/// Number of status writes attempted before a conflict is surfaced
pub const STATUS_WRITE_ATTEMPTS: usize = 3;

/// Bounds of the resources the reconcilers manage
pub trait StoredResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}
impl<K> StoredResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Read and write access to the declared resources
#[async_trait]
pub trait ResourceStore<K: StoredResource>: Send + Sync {
    /// Current version of the object, `None` once it is gone
    async fn get(&self, obj: &ObjectRef<K>) -> Result<Option<K>>;
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>>;
    /// Persist the finalizers of `obj`, fails with `StoreConflict` when `obj` is stale
    async fn update(&self, obj: &K) -> Result<K>;
    /// Persist the status of `obj`, fails with `StoreConflict` when `obj` is stale
    async fn update_status(&self, obj: &K) -> Result<K>;
}

/// ResourceStore backed by the kubernetes API
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoredResource>(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn map_write_error(e: kube::Error, name: &str) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 409 => Error::StoreConflict(name.to_string()),
        e => Error::KubeError(e),
    }
}

#[async_trait]
impl<K: StoredResource> ResourceStore<K> for KubeStore {
    async fn get(&self, obj: &ObjectRef<K>) -> Result<Option<K>> {
        self.api::<K>(obj.namespace.as_deref())
            .get_opt(&obj.name)
            .await
            .map_err(Error::KubeError)
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(Error::KubeError)?;
        Ok(list.items)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let patch: Patch<serde_json::Value> = Patch::Merge(json!({
            "metadata": {
                "finalizers": obj.finalizers(),
                "resourceVersion": obj.resource_version(),
            }
        }));
        self.api::<K>(obj.namespace().as_deref())
            .patch(&name, &PatchParams::default(), &patch)
            .await
            .map_err(|e| map_write_error(e, &name))
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let patch: Patch<serde_json::Value> = Patch::Merge(json!({
            "metadata": {
                "resourceVersion": obj.resource_version(),
            },
            "status": status_of(obj)?,
        }));
        let ps = PatchParams {
            field_manager: Some(get_short_name()),
            ..PatchParams::default()
        };
        self.api::<K>(obj.namespace().as_deref())
            .patch_status(&name, &ps, &patch)
            .await
            .map_err(|e| map_write_error(e, &name))
    }
}

fn status_of<K: Serialize>(obj: &K) -> Result<serde_json::Value> {
    let value = serde_json::to_value(obj).map_err(Error::SerializationError)?;
    Ok(value.get("status").cloned().unwrap_or_default())
}

/// Apply `change` to the status of `obj` and persist it.
///
/// Nothing is written when the status is left unchanged. On conflict the object is read
/// again and `change` is applied to the fresh copy.
pub async fn update_status_with<K, F>(store: &dyn ResourceStore<K>, obj: &K, change: F) -> Result<K>
where
    K: StoredResource,
    F: Fn(&mut K) + Send + Sync,
{
    let mut current = obj.clone();
    change(&mut current);
    if status_of(&current)? == status_of(obj)? {
        return Ok(current);
    }
    let mut attempt = 1;
    loop {
        match store.update_status(&current).await {
            Err(Error::StoreConflict(name)) if attempt < STATUS_WRITE_ATTEMPTS => {
                debug!("status write of {name} conflicted, retrying ({attempt}/{STATUS_WRITE_ATTEMPTS})");
                attempt += 1;
                current = store
                    .get(&ObjectRef::from_obj(obj))
                    .await?
                    .ok_or(Error::StoreConflict(name))?;
                change(&mut current);
            }
            other => return other,
        }
    }
}
