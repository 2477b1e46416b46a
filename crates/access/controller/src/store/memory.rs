//! In-memory store implementation

use super::traits::*;
use crate::error::StoreError;
use access_types::{AccessRequest, ObjectKey, ObjectMeta, RoleBinding, ACCESS_REQUEST_KIND};
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const WATCH_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Objects {
    requests: HashMap<ObjectKey, AccessRequest>,
    bindings: HashMap<ObjectKey, RoleBinding>,
    /// owner uid -> keys of the bindings it controls
    owned: HashMap<String, BTreeSet<ObjectKey>>,
    revision: u64,
}

impl Objects {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// In-memory store for development and testing
#[derive(Debug)]
pub struct InMemoryStore {
    objects: RwLock<Objects>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            objects: RwLock::new(Objects::default()),
            watch_tx,
        }
    }

    fn notify(&self, event: WatchEvent) {
        // no subscribers is fine
        let _ = self.watch_tx.send(event);
    }

    fn stamp_new(objects: &mut Objects, metadata: &mut ObjectMeta) {
        metadata.uid = Uuid::new_v4().to_string();
        metadata.resource_version = objects.next_revision();
        metadata.creation_timestamp = Some(Utc::now().trunc_subsecs(0));
    }
}

fn require_namespace(metadata: &ObjectMeta) -> StoreResult<()> {
    if metadata.namespace.is_empty() {
        return Err(StoreError::Invalid(format!(
            "{}: metadata.namespace is required",
            metadata.name
        )));
    }
    Ok(())
}

fn check_version(current: &ObjectMeta, incoming: &ObjectMeta) -> StoreResult<()> {
    if !incoming.resource_version.is_empty()
        && incoming.resource_version != current.resource_version
    {
        return Err(StoreError::Conflict(format!(
            "{} was modified: resourceVersion {} is stale (current {})",
            current.key(),
            incoming.resource_version,
            current.resource_version
        )));
    }
    Ok(())
}

/// Access request controlling `binding`, resolved in the binding's namespace
fn owner_key(binding: &RoleBinding) -> Option<ObjectKey> {
    binding
        .metadata
        .controller_ref()
        .filter(|owner| owner.kind == ACCESS_REQUEST_KIND)
        .map(|owner| ObjectKey::new(&binding.metadata.namespace, &owner.name))
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn get_request(&self, key: &ObjectKey) -> StoreResult<Option<AccessRequest>> {
        let objects = self.objects.read().await;
        Ok(objects.requests.get(key).cloned())
    }

    async fn list_requests(&self, namespace: Option<&str>) -> StoreResult<Vec<AccessRequest>> {
        let objects = self.objects.read().await;
        let mut requests: Vec<_> = objects
            .requests
            .values()
            .filter(|r| namespace.map_or(true, |ns| r.metadata.namespace == ns))
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(requests)
    }

    async fn create_request(&self, mut request: AccessRequest) -> StoreResult<AccessRequest> {
        request.validate()?;
        require_namespace(&request.metadata)?;

        let key = request.key();
        let mut objects = self.objects.write().await;
        if objects.requests.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("AccessRequest {}", key)));
        }

        Self::stamp_new(&mut objects, &mut request.metadata);
        request.status = Default::default();
        objects.requests.insert(key.clone(), request.clone());
        drop(objects);

        tracing::debug!(request = %key, "Created access request");
        self.notify(WatchEvent::RequestChanged(key));
        Ok(request)
    }

    async fn update_request(&self, mut request: AccessRequest) -> StoreResult<AccessRequest> {
        request.validate()?;
        let key = request.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .requests
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("AccessRequest {}", key)))?;
        check_version(&current.metadata, &request.metadata)?;

        request.metadata.uid = current.metadata.uid.clone();
        request.metadata.creation_timestamp = current.metadata.creation_timestamp;
        request.metadata.resource_version = current.metadata.resource_version.clone();
        request.status = current.status.clone();
        if request == *current {
            return Ok(request);
        }

        request.metadata.resource_version = objects.next_revision();
        objects.requests.insert(key.clone(), request.clone());
        drop(objects);

        self.notify(WatchEvent::RequestChanged(key));
        Ok(request)
    }

    async fn update_request_status(&self, request: AccessRequest) -> StoreResult<AccessRequest> {
        let key = request.key();
        let mut objects = self.objects.write().await;
        let current = objects
            .requests
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("AccessRequest {}", key)))?;
        check_version(&current.metadata, &request.metadata)?;

        if request.status == current.status {
            return Ok(current.clone());
        }
        let mut updated = current.clone();
        updated.status = request.status;
        updated.metadata.resource_version = objects.next_revision();
        objects.requests.insert(key.clone(), updated.clone());
        drop(objects);

        self.notify(WatchEvent::RequestChanged(key));
        Ok(updated)
    }

    async fn delete_request(&self, key: &ObjectKey) -> StoreResult<bool> {
        let mut objects = self.objects.write().await;
        let Some(request) = objects.requests.remove(key) else {
            return Ok(false);
        };

        // cascade through the owner index
        let owned = objects
            .owned
            .remove(&request.metadata.uid)
            .unwrap_or_default();
        let mut removed = Vec::new();
        for binding_key in owned {
            if let Some(binding) = objects.bindings.remove(&binding_key) {
                removed.push(binding);
            }
        }
        drop(objects);

        tracing::debug!(
            request = %key,
            bindings = removed.len(),
            "Deleted access request"
        );
        self.notify(WatchEvent::RequestDeleted(key.clone()));
        for binding in removed {
            self.notify(WatchEvent::BindingDeleted {
                binding: binding.key(),
                owner: owner_key(&binding),
            });
        }
        Ok(true)
    }
}

#[async_trait]
impl BindingStore for InMemoryStore {
    async fn get_binding(&self, key: &ObjectKey) -> StoreResult<Option<RoleBinding>> {
        let objects = self.objects.read().await;
        Ok(objects.bindings.get(key).cloned())
    }

    async fn list_bindings(&self, namespace: Option<&str>) -> StoreResult<Vec<RoleBinding>> {
        let objects = self.objects.read().await;
        let mut bindings: Vec<_> = objects
            .bindings
            .values()
            .filter(|b| namespace.map_or(true, |ns| b.metadata.namespace == ns))
            .cloned()
            .collect();
        bindings.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(bindings)
    }

    async fn list_owned_bindings(&self, owner_uid: &str) -> StoreResult<Vec<RoleBinding>> {
        let objects = self.objects.read().await;
        Ok(objects
            .owned
            .get(owner_uid)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| objects.bindings.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_binding(&self, mut binding: RoleBinding) -> StoreResult<RoleBinding> {
        require_namespace(&binding.metadata)?;
        if binding.metadata.name.is_empty() {
            return Err(StoreError::Invalid("metadata.name is required".to_string()));
        }

        let key = binding.key();
        let mut objects = self.objects.write().await;
        if objects.bindings.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("RoleBinding {}", key)));
        }

        Self::stamp_new(&mut objects, &mut binding.metadata);
        if let Some(owner) = binding.metadata.controller_ref() {
            objects
                .owned
                .entry(owner.uid.clone())
                .or_default()
                .insert(key.clone());
        }
        objects.bindings.insert(key.clone(), binding.clone());
        drop(objects);

        self.notify(WatchEvent::BindingChanged {
            binding: key,
            owner: owner_key(&binding),
        });
        Ok(binding)
    }
}

impl Store for InMemoryStore {
    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.watch_tx.subscribe()
    }
}
