//! Domain model for scheduled tasks.
//!
//! # Responsibility
//! - Define canonical task data structures used by the store and adapters.
//! - Own field-level validation rules for task names and icons.
//!
//! # Invariants
//! - Every stored task is identified by a store-assigned `TaskId`.
//! - Deletion is a hard removal; there are no tombstones.
//! - Icons are stored as catalog indexes, never as UI objects.

pub mod icon;
pub mod task;
