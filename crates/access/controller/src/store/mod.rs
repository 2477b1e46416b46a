//! Object store consumed by the reconciler and the resource API
//!
//! Mirrors the API server contract: `resourceVersion` optimistic concurrency,
//! store-assigned `uid`, an owner index for role bindings and a watch stream.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{BindingStore, RequestStore, Store, StoreResult, WatchEvent};
