//! Access Controller - level-triggered reconciliation of access requests
//!
//! Every change to an access request, or to a role binding it owns, enqueues
//! the request's key. Workers pop keys one at a time per key, re-read the
//! request from the store and drive it toward `Approved=True, Complete=True`
//! by provisioning one role binding per subject.
//!
//! The store is reached through the [`Store`] trait; [`InMemoryStore`] is the
//! implementation the daemon and tests run against.

#![deny(unsafe_code)]

pub mod controller;
pub mod error;
pub mod events;
pub mod queue;
pub mod reconciler;
pub mod store;

pub use controller::{Controller, ControllerConfig};
pub use error::{ReconcileError, Result, StoreError};
pub use events::{AccessEvent, AccessEventEnvelope};
pub use queue::WorkQueue;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use store::{BindingStore, InMemoryStore, RequestStore, Store, StoreResult, WatchEvent};
