//! Hosting runtime for a mnemon store.
//!
//! This crate turns a [`MnemonConfig`](mnemon_config::MnemonConfig) into a
//! running [`MemoryService`]: store construction, snapshot restore, text
//! embedding through an [`Embedder`], and background maintenance.

pub mod embedder;
pub mod error;
pub mod options;
pub mod scheduler;
pub mod service;

pub use embedder::Embedder;
pub use error::RuntimeError;
/// Background maintenance loop and its settings.
pub use scheduler::{MaintenanceScheduler, SchedulerSettings};
pub use service::MemoryService;
