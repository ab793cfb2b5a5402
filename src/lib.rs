//! # veo-studio
//!
//! Client-side core for an asynchronous video-generation API.
//!
//! A user submits a prompt (optionally with reference images), the remote API
//! hands back a task id, and this crate keeps a persisted list of those tasks
//! in step with the remote side by polling until each one finishes.
//!
//! ## Architecture
//!
//! ```text
//!   HTTP API (axum) ──submit──▶ Generator ──create──▶ ┌───────────┐
//!        │                                            │ TaskStore │◀── Storage
//!        └──delete / select─────────────────────────▶ └───────────┘    (file / memory)
//!                                                          ▲
//!                                              apply_updates (one batch per pass)
//!                                                          │
//!   SettingsStore ──changes──▶ Poller ──drives──▶ Reconciler ──feed──▶ VeoApi
//! ```
//!
//! ## Modules
//! - `task`: task records and the persisted task store
//! - `reconcile`: one status reconciliation pass
//! - `poller`: the interval loop around the reconciler
//! - `generate`: generation request flow
//! - `veo`: remote API client
//! - `settings`: persisted connection settings
//! - `storage`: durable key/value backends

pub mod api;
pub mod config;
pub mod generate;
pub mod poller;
pub mod reconcile;
pub mod settings;
pub mod storage;
pub mod task;
pub mod veo;

pub use config::Config;
pub use generate::{Generator, SubmitError, SubmitRequest};
pub use poller::{Poller, PollerHandle};
pub use reconcile::{PassReport, Reconciler};
pub use settings::{Connection, Settings, SettingsStore};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use task::{TaskStatus, TaskStore, TaskUpdate, VeoTask};
pub use veo::{VeoApi, VeoClient, VeoError};
