//! Storage trait definitions

use crate::error::StoreError;
use access_types::{AccessRequest, ObjectKey, RoleBinding};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Change notification, keyed by object identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    RequestChanged(ObjectKey),
    RequestDeleted(ObjectKey),
    BindingChanged {
        binding: ObjectKey,
        owner: Option<ObjectKey>,
    },
    BindingDeleted {
        binding: ObjectKey,
        owner: Option<ObjectKey>,
    },
}

impl WatchEvent {
    /// The access request this event should re-trigger, if any.
    /// Binding events map to their controlling owner.
    pub fn request_key(&self) -> Option<&ObjectKey> {
        match self {
            Self::RequestChanged(key) | Self::RequestDeleted(key) => Some(key),
            Self::BindingChanged { owner, .. } | Self::BindingDeleted { owner, .. } => {
                owner.as_ref()
            }
        }
    }
}

/// Combined storage trait
pub trait Store: RequestStore + BindingStore + Send + Sync {
    /// Subscribe to changes committed after this call
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}

/// Storage for access requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(&self, key: &ObjectKey) -> StoreResult<Option<AccessRequest>>;

    /// All requests, optionally restricted to one namespace
    async fn list_requests(&self, namespace: Option<&str>) -> StoreResult<Vec<AccessRequest>>;

    /// Assigns `uid`, `resourceVersion` and `creationTimestamp`; drops any status
    async fn create_request(&self, request: AccessRequest) -> StoreResult<AccessRequest>;

    /// Replace metadata and spec. Conditional when `resourceVersion` is set;
    /// the stored status is kept.
    async fn update_request(&self, request: AccessRequest) -> StoreResult<AccessRequest>;

    /// Replace only the status. Conditional when `resourceVersion` is set.
    async fn update_request_status(&self, request: AccessRequest) -> StoreResult<AccessRequest>;

    /// Delete a request and every binding it controls
    async fn delete_request(&self, key: &ObjectKey) -> StoreResult<bool>;
}

/// Storage for role bindings
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn get_binding(&self, key: &ObjectKey) -> StoreResult<Option<RoleBinding>>;

    async fn list_bindings(&self, namespace: Option<&str>) -> StoreResult<Vec<RoleBinding>>;

    /// Bindings whose controller reference points at `owner_uid`
    async fn list_owned_bindings(&self, owner_uid: &str) -> StoreResult<Vec<RoleBinding>>;

    /// Fails with `AlreadyExists` when the name is taken
    async fn create_binding(&self, binding: RoleBinding) -> StoreResult<RoleBinding>;
}
