//! Core use-case services.
//!
//! # Responsibility
//! - Own task state and business rules above the repository layer.
//! - Keep FFI/CLI callers decoupled from storage details.

pub mod task_store;
