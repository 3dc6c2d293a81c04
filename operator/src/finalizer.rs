use crate::{
    Result,
    store::{ResourceStore, StoredResource},
};
use kube::ResourceExt;
use tracing::*;

pub static PROJECT_FINALIZER: &str = "jiraservicedesk.stakater.com/project";
pub static CUSTOMER_FINALIZER: &str = "jiraservicedesk.stakater.com/customer";

/// Where an object stands regarding our finalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// Not deleting, finalizer in place
    Guarded,
    /// Not deleting, finalizer still to be added
    Unguarded,
    /// Deleting, remote cleanup still to be done
    Cleanup,
    /// Deleting, cleanup already ran
    Released,
}

pub fn has_finalizer<K: ResourceExt>(obj: &K, name: &str) -> bool {
    obj.finalizers().iter().any(|f| f == name)
}

pub fn is_deleting<K: ResourceExt>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

pub fn finalizer_state<K: ResourceExt>(obj: &K, name: &str) -> FinalizerState {
    match (is_deleting(obj), has_finalizer(obj, name)) {
        (false, true) => FinalizerState::Guarded,
        (false, false) => FinalizerState::Unguarded,
        (true, true) => FinalizerState::Cleanup,
        (true, false) => FinalizerState::Released,
    }
}

/// Add the finalizer and persist the object, nothing else is written along
pub async fn add<K: StoredResource>(store: &dyn ResourceStore<K>, obj: &K, name: &str) -> Result<K> {
    if has_finalizer(obj, name) {
        return Ok(obj.clone());
    }
    let mut updated = obj.clone();
    updated.finalizers_mut().push(name.to_string());
    debug!("adding finalizer {name} to {}", obj.name_any());
    store.update(&updated).await
}

/// Drop the finalizer and persist the object, letting its deletion complete
pub async fn remove<K: StoredResource>(store: &dyn ResourceStore<K>, obj: &K, name: &str) -> Result<K> {
    if !has_finalizer(obj, name) {
        return Ok(obj.clone());
    }
    let mut updated = obj.clone();
    updated.finalizers_mut().retain(|f| f != name);
    debug!("removing finalizer {name} from {}", obj.name_any());
    store.update(&updated).await
}
