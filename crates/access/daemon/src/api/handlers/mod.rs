//! API request handlers

pub mod admission;
pub mod bindings;
pub mod health;
pub mod requests;

pub use admission::{mutate, validate};
pub use bindings::{get_binding, list_bindings};
pub use health::{healthz, readyz, status};
pub use requests::{
    create_request, delete_request, get_request, list_requests, update_request, RemoteUser,
};
