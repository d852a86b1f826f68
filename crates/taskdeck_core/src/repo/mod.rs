//! Persistence port and its implementations.
//!
//! # Responsibility
//! - Define the `TaskRepository` contract the store writes through.
//! - Isolate SQLite details from store/business orchestration.
//!
//! # Invariants
//! - Repositories never validate business rules; `TaskStore` does that
//!   before every write.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod memory_repo;
pub mod task_repo;
