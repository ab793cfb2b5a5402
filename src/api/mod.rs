//! Local HTTP API.
//!
//! Exposes the task store, generation flow, connection settings and the
//! polling toggle to a browser front end.

mod routes;
mod settings;

pub use routes::{app, serve, AppState};
