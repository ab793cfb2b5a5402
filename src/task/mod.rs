//! Task module - generation task records and their persisted store.
//!
//! A task is created once when the remote API accepts a generation request,
//! is updated only by status reconciliation, and is removed only by an
//! explicit delete.

mod store;
mod types;

pub use store::{SharedTaskStore, TaskStore};
pub use types::{TaskStatus, TaskUpdate, VeoTask};
