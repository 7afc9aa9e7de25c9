// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod archive;
pub mod bootstrap;
pub mod classify;
pub mod config;
pub mod conversation;
pub mod error;
pub mod metrics;
pub mod store;
pub mod submit;
pub mod telemetry;
pub mod whatsapp;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::bootstrap::{build_intake, build_router};
pub use crate::config::AppConfig;
pub use crate::conversation::{Intake, Outcome};
pub use crate::error::{IntakeError, IntakeResult};
